use crate::domain::peer_connection::value_object::EngineNotification;
use crate::error;

/// Parses a notification written by the engine as JSON.
/// Engines that talk JSON use it to feed the channel returned by `run`.
pub fn format_notification_json(json_str: &str) -> Result<EngineNotification, error::Error> {
    serde_json::from_str::<EngineNotification>(json_str).map_err(|e| {
        let message = format!("Presentation layer received invalid json {:?}", e);
        error::Error::create_local_error(&message)
    })
}
