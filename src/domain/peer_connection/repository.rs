use async_trait::async_trait;
use shaku::Interface;

use crate::domain::peer_connection::value_object::{
    DataChannelInit, IceCandidate, MediaConstraints, PeerConnectionId, RtcConfiguration,
    SessionDescription,
};
use crate::error;

#[cfg(test)]
use mockall::automock;

/// Commands accepted by the native engine.
/// Each call resolves exactly once with the engine's result.
/// The engine never times out a command and none of them can be cancelled.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PeerConnectionApi: Interface {
    async fn init(
        &self,
        configuration: RtcConfiguration,
        id: PeerConnectionId,
    ) -> Result<(), error::Error>;
    async fn set_configuration(
        &self,
        id: PeerConnectionId,
        configuration: RtcConfiguration,
    ) -> Result<(), error::Error>;
    async fn create_offer(
        &self,
        id: PeerConnectionId,
        constraints: MediaConstraints,
    ) -> Result<SessionDescription, error::Error>;
    async fn create_answer(
        &self,
        id: PeerConnectionId,
        constraints: MediaConstraints,
    ) -> Result<SessionDescription, error::Error>;
    async fn set_local_description(
        &self,
        id: PeerConnectionId,
        description: SessionDescription,
    ) -> Result<(), error::Error>;
    async fn set_remote_description(
        &self,
        id: PeerConnectionId,
        description: SessionDescription,
    ) -> Result<(), error::Error>;
    async fn add_ice_candidate(
        &self,
        id: PeerConnectionId,
        candidate: IceCandidate,
    ) -> Result<(), error::Error>;
    /// Returns the stats report as the raw JSON string produced by the engine.
    /// An empty track_id asks for the stats of the whole connection.
    async fn get_stats(&self, id: PeerConnectionId, track_id: String)
        -> Result<String, error::Error>;
    async fn add_track(
        &self,
        id: PeerConnectionId,
        track_id: String,
        stream_tag: String,
    ) -> Result<(), error::Error>;
    async fn remove_track(
        &self,
        id: PeerConnectionId,
        track_id: String,
        stream_tag: String,
    ) -> Result<(), error::Error>;
    async fn add_stream(&self, id: PeerConnectionId, stream_tag: String)
        -> Result<(), error::Error>;
    async fn remove_stream(
        &self,
        id: PeerConnectionId,
        stream_tag: String,
    ) -> Result<(), error::Error>;
    async fn replace_sender_track(
        &self,
        id: PeerConnectionId,
        sender_track_id: String,
        track_id: Option<String>,
    ) -> Result<(), error::Error>;
    async fn create_data_channel(
        &self,
        id: PeerConnectionId,
        label: String,
        init: DataChannelInit,
    ) -> Result<(), error::Error>;
    async fn close(&self, id: PeerConnectionId) -> Result<(), error::Error>;
}

/// Hands out PeerConnectionIds.
/// Every id is strictly greater than all the ids returned before it, even under concurrent calls.
#[cfg_attr(test, automock)]
pub trait IdentityAllocator: Interface {
    fn next(&self) -> PeerConnectionId;
}
