use std::collections::BTreeSet;

use crate::error;

/// Ids 0..MAX_DATA_CHANNEL_ID are usable.
/// 65535 itself is reserved because SCTP INIT and INIT-ACK chunks negotiate at most 65535 streams.
pub const MAX_DATA_CHANNEL_ID: u16 = 65535;

/// DataChannel id space of one peer connection.
/// Ids are reused after release, so allocation scans from 0 instead of keeping a cursor.
#[derive(Debug, Default)]
pub struct DataChannelIdAllocator {
    ids: BTreeSet<u16>,
}

impl DataChannelIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, requested: Option<i64>) -> Result<u16, error::Error> {
        match requested {
            Some(id) => {
                if id < 0 || id >= MAX_DATA_CHANNEL_ID as i64 {
                    return Err(error::Error::InvalidId(id));
                }
                let id = id as u16;
                if !self.ids.insert(id) {
                    return Err(error::Error::ResourceInUse(id));
                }
                Ok(id)
            }
            None => {
                let id = (0..MAX_DATA_CHANNEL_ID)
                    .find(|id| !self.ids.contains(id))
                    .ok_or(error::Error::IdSpaceExhausted)?;
                self.ids.insert(id);
                Ok(id)
            }
        }
    }

    /// Records an id the engine has already allocated on its side
    pub fn register(&mut self, id: u16) {
        self.ids.insert(id);
    }

    pub fn release(&mut self, id: u16) {
        self.ids.remove(&id);
    }

    #[cfg(test)]
    pub fn contains(&self, id: u16) -> bool {
        self.ids.contains(&id)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}
