use std::sync::atomic::{AtomicU64, Ordering};

use shaku::Component;

use crate::domain::peer_connection::repository::IdentityAllocator;
use crate::domain::peer_connection::value_object::PeerConnectionId;

// one counter per container, ids start at 0
#[derive(Component)]
#[shaku(interface = IdentityAllocator)]
pub(crate) struct AtomicIdentityAllocator {
    #[shaku(default)]
    next: AtomicU64,
}

impl IdentityAllocator for AtomicIdentityAllocator {
    fn next(&self) -> PeerConnectionId {
        PeerConnectionId::new(self.next.fetch_add(1, Ordering::SeqCst))
    }
}

#[cfg(test)]
mod test_identity {
    use std::collections::HashSet;
    use std::sync::Arc;

    use shaku::HasComponent;

    use super::*;
    use crate::di::PeerConnectionContainer;

    fn allocator() -> Arc<dyn IdentityAllocator> {
        let module = PeerConnectionContainer::builder().build();
        module.resolve()
    }

    #[test]
    fn starts_at_zero_and_increases() {
        let allocator = allocator();

        let ids: Vec<u64> = (0..5).map(|_| allocator.next().as_u64()).collect();

        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn containers_do_not_share_counters() {
        let first = allocator();
        let second = allocator();
        first.next();

        assert_eq!(second.next().as_u64(), 0);
    }

    #[test]
    fn concurrent_ids_are_unique() {
        let allocator = allocator();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let allocator = allocator.clone();
                std::thread::spawn(move || {
                    (0..1000)
                        .map(|_| allocator.next())
                        .collect::<Vec<PeerConnectionId>>()
                })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            let per_thread = handle.join().unwrap();
            // strictly increasing as seen from each thread
            assert!(per_thread.windows(2).all(|pair| pair[0] < pair[1]));
            ids.extend(per_thread);
        }
        assert_eq!(ids.len(), 8000);
    }
}
