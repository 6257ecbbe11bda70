/// Values exchanged with the engine: states, descriptions, candidates and configuration
pub mod value_object {
    pub use crate::domain::peer_connection::value_object::*;
}

/// Objects owned by a peer connection
pub mod entity {
    pub use crate::domain::peer_connection::entity::*;
}

/// Channel bridge types for whoever drives the native engine
pub mod engine {
    pub use crate::infra::engine::{EngineCommand, EngineRequest, EngineResponse};
    pub use crate::presentation::format_notification_json;
}

pub use crate::application::event::PeerConnectionEvent;
pub use crate::application::factory::PeerConnectionFactory;
pub use crate::application::peer_connection::PeerConnection;
pub use crate::error::Error;
