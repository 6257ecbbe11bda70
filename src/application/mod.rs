// Application layer.
// Wraps the domain objects of one connection into a handle the application drives,
// and feeds the engine's notifications into it.

pub(crate) mod dispatch;
pub(crate) mod event;
pub(crate) mod factory;
pub(crate) mod peer_connection;
pub(crate) mod router;
