// Domain layer.
// Everything a peer connection knows about itself lives here: ids, states,
// the streams / tracks / senders it tracks and the interfaces of the engine it talks to.
// Nothing in this layer spawns tasks or owns channels.

/// Peer connection state and the engine interface
pub(crate) mod peer_connection;
