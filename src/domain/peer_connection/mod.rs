/// DataChannel id allocation scoped to one connection
pub(crate) mod channel_id;
/// Local view of streams, tracks, senders and transceivers
pub(crate) mod bookkeeper;
pub(crate) mod entity;
/// Interfaces of the native engine and of the identity allocator
pub(crate) mod repository;
pub(crate) mod service;
/// Signaling and ICE states reported by the engine
pub(crate) mod state;
pub(crate) mod value_object;
