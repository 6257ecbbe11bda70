use serde_json::Value;
use thiserror::Error;

use crate::domain::peer_connection::value_object::PeerConnectionId;

/// Errors returned by this crate
///
/// Validation and resource errors are returned synchronously before anything is sent to the engine.
/// EngineError carries the engine's diagnostic payload untouched.
/// DanglingSenderReference, MissingField and TooManyTracksInStream mean the local bookkeeping
/// has diverged from the engine; they come out of notification dispatch.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    LocalError(String),
    #[error("DataChannel id must be an integer in 0..65535: {0}")]
    InvalidId(i64),
    #[error("DataChannel id already in use: {0}")]
    ResourceInUse(u16),
    #[error("no DataChannel id is available")]
    IdSpaceExhausted,
    #[error("stream {0} cannot have more than 1 track")]
    TooManyTracksInStream(String),
    #[error("sender track is unknown: sender_id={sender_id:?}, sender_track_id={sender_track_id:?}")]
    DanglingSenderReference {
        sender_id: Option<String>,
        sender_track_id: Option<String>,
    },
    #[error("{0} is missing in the notification")]
    MissingField(&'static str),
    #[error("peer connection {0} is closed")]
    InvalidState(PeerConnectionId),
    #[error("engine reported a failure: {0}")]
    EngineError(Value),
    #[error("engine is not reachable")]
    EngineUnavailable,
    #[error("serde error: {error}")]
    SerdeError { error: serde_json::Error },
}

impl Error {
    pub fn create_local_error(message: &str) -> Error {
        Error::LocalError(message.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::SerdeError { error }
    }
}
