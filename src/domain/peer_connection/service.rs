use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::domain::peer_connection::repository::PeerConnectionApi;
use crate::domain::peer_connection::value_object::PeerConnectionId;

/// Stats are diagnostic only.
/// An engine failure or a payload that is not JSON yields None instead of an error.
pub(crate) async fn fetch_stats(
    api: Arc<dyn PeerConnectionApi>,
    id: PeerConnectionId,
    track_id: Option<String>,
) -> Option<Value> {
    let raw = match api.get_stats(id, track_id.unwrap_or_default()).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!("peer connection {}: getStats failed: {}", id, e);
            return None;
        }
    };

    match serde_json::from_str::<Value>(&raw) {
        Ok(stats) => Some(stats),
        Err(e) => {
            warn!("peer connection {}: stats report is not JSON: {}", id, e);
            None
        }
    }
}
