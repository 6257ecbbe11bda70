use shaku::*;

use crate::application::router::NotificationRouterImpl;
use crate::infra::engine::ChannelEngineApi;
use crate::infra::identity::AtomicIdentityAllocator;

// ChannelEngineApi has no engine attached by default, run() overrides it with a connected one
module! {
    pub(crate) PeerConnectionContainer {
        components = [AtomicIdentityAllocator, NotificationRouterImpl, ChannelEngineApi],
        providers = []
    }
}

#[cfg(test)]
mod test_container {
    use std::sync::Arc;

    use shaku::HasComponent;

    use super::*;
    use crate::application::router::NotificationRouter;
    use crate::domain::peer_connection::repository::{IdentityAllocator, PeerConnectionApi};
    use crate::domain::peer_connection::value_object::{
        EngineNotification, NotificationEnum, PeerConnectionId, RtcConfiguration,
    };
    use crate::error;

    #[tokio::test]
    async fn default_components_are_usable() {
        // execute
        let module = PeerConnectionContainer::builder().build();
        let allocator: Arc<dyn IdentityAllocator> = module.resolve();
        let router: Arc<dyn NotificationRouter> = module.resolve();
        let api: Arc<dyn PeerConnectionApi> = module.resolve();

        // evaluate
        assert_eq!(allocator.next().as_u64(), 0);
        assert_eq!(allocator.next().as_u64(), 1);

        let id = PeerConnectionId::new(0);
        assert!(!router.route(EngineNotification::new(
            id,
            NotificationEnum::RenegotiationNeeded
        )));
        let _queue = router.register(id);
        assert!(router.route(EngineNotification::new(
            id,
            NotificationEnum::RenegotiationNeeded
        )));

        // no engine is attached to the default bridge
        let result = api.init(RtcConfiguration::default(), id).await;
        if let Err(error::Error::EngineUnavailable) = result {
        } else {
            assert!(false);
        }
    }
}
