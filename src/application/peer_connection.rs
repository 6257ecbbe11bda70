use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::application::dispatch::{ConnectionCore, ConnectionInner};
use crate::application::event::PeerConnectionEvent;
use crate::domain::peer_connection::entity::{
    DataChannel, MediaStream, MediaStreamTrack, RtpSender, Transceiver,
};
use crate::domain::peer_connection::service::fetch_stats;
use crate::domain::peer_connection::value_object::{
    DataChannelInit, IceCandidate, IceConnectionState, IceGatheringState, OfferAnswerOptions,
    PeerConnectionId, PeerConnectionState, RtcConfiguration, SessionDescription, SignalingState,
};
use crate::error;

/// Application handle of one peer connection.
///
/// Commands are forwarded to the engine and awaited. State reported by the engine is
/// applied in the background and observed through the getters and `subscribe`.
/// Dropping the handle stops notification delivery but does not close the engine side;
/// call `close` for that.
pub struct PeerConnection {
    core: Arc<ConnectionCore>,
}

impl PeerConnection {
    pub(crate) fn new(core: Arc<ConnectionCore>) -> Self {
        PeerConnection { core }
    }

    pub fn id(&self) -> PeerConnectionId {
        self.core.id
    }

    /// Every subscriber gets every event raised after it subscribed, in order
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<PeerConnectionEvent> {
        self.core.emitter.subscribe()
    }

    pub fn signaling_state(&self) -> SignalingState {
        self.core.inner.lock().state.signaling_state()
    }

    pub fn ice_gathering_state(&self) -> IceGatheringState {
        self.core.inner.lock().state.ice_gathering_state()
    }

    pub fn ice_connection_state(&self) -> IceConnectionState {
        self.core.inner.lock().state.ice_connection_state()
    }

    pub fn connection_state(&self) -> PeerConnectionState {
        self.core.inner.lock().state.connection_state()
    }

    pub fn local_description(&self) -> Option<SessionDescription> {
        self.core.inner.lock().local_description.clone()
    }

    pub fn remote_description(&self) -> Option<SessionDescription> {
        self.core.inner.lock().remote_description.clone()
    }

    pub fn get_local_streams(&self) -> Vec<Arc<MediaStream>> {
        self.core.inner.lock().bookkeeper.local_streams()
    }

    pub fn get_remote_streams(&self) -> Vec<Arc<MediaStream>> {
        self.core.inner.lock().bookkeeper.remote_streams()
    }

    pub fn get_transceivers(&self) -> Arc<[Transceiver]> {
        self.core.inner.lock().bookkeeper.transceivers()
    }

    pub fn get_senders(&self) -> Vec<Arc<RtpSender>> {
        self.core.inner.lock().bookkeeper.senders()
    }

    /// The sender shows up later with a SenderAdded event.
    /// Adding a track that was already added is a no-op.
    pub async fn add_track(
        &self,
        track: Arc<MediaStreamTrack>,
        stream: Arc<MediaStream>,
    ) -> Result<(), error::Error> {
        let added = self.with_open(|inner| {
            Ok(inner
                .bookkeeper
                .add_local_track(track.clone(), stream.clone()))
        })?;
        if !added {
            debug!(
                "peer connection {}: track {} was already added",
                self.core.id,
                track.id()
            );
            return Ok(());
        }

        let result = self
            .core
            .api
            .add_track(self.core.id, track.id().to_string(), stream.tag().to_string())
            .await;
        if result.is_err() {
            self.core.inner.lock().bookkeeper.forget_local_track(&track);
        }
        result
    }

    /// Removing a track that is not part of the connection is a no-op
    pub async fn remove_track(&self, sender: &RtpSender) -> Result<(), error::Error> {
        let track = match sender.track() {
            Some(track) => track,
            None => return Ok(()),
        };
        let removed = self.with_open(|inner| Ok(inner.bookkeeper.remove_track(&track)))?;
        let (stream, track) = match removed {
            Some(removed) => removed,
            None => return Ok(()),
        };

        self.core
            .api
            .remove_track(self.core.id, track.id().to_string(), stream.tag().to_string())
            .await
    }

    #[deprecated(note = "use add_track")]
    pub async fn add_stream(&self, stream: Arc<MediaStream>) -> Result<(), error::Error> {
        let added = self.with_open(|inner| Ok(inner.bookkeeper.add_local_stream(stream.clone())))?;
        if !added {
            return Ok(());
        }

        let result = self
            .core
            .api
            .add_stream(self.core.id, stream.tag().to_string())
            .await;
        if result.is_err() {
            self.core.inner.lock().bookkeeper.remove_local_stream(&stream);
        }
        result
    }

    #[deprecated(note = "use remove_track")]
    pub async fn remove_stream(&self, stream: &Arc<MediaStream>) -> Result<(), error::Error> {
        let removed = self.with_open(|inner| Ok(inner.bookkeeper.remove_local_stream(stream)))?;
        if !removed {
            return Ok(());
        }

        self.core
            .api
            .remove_stream(self.core.id, stream.tag().to_string())
            .await
    }

    pub async fn create_offer(
        &self,
        options: Option<OfferAnswerOptions>,
    ) -> Result<SessionDescription, error::Error> {
        self.with_open(|_| Ok(()))?;
        let constraints = options.unwrap_or_default().normalize();
        self.core.api.create_offer(self.core.id, constraints).await
    }

    pub async fn create_answer(
        &self,
        options: Option<OfferAnswerOptions>,
    ) -> Result<SessionDescription, error::Error> {
        self.with_open(|_| Ok(()))?;
        let constraints = options.unwrap_or_default().normalize();
        self.core.api.create_answer(self.core.id, constraints).await
    }

    /// The description is recorded once the engine accepted it
    pub async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), error::Error> {
        self.with_open(|_| Ok(()))?;
        self.core
            .api
            .set_local_description(self.core.id, description.clone())
            .await?;
        self.core.inner.lock().local_description = Some(description);
        Ok(())
    }

    pub async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), error::Error> {
        self.with_open(|_| Ok(()))?;
        self.core
            .api
            .set_remote_description(self.core.id, description.clone())
            .await?;
        self.core.inner.lock().remote_description = Some(description);
        Ok(())
    }

    pub async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), error::Error> {
        self.with_open(|_| Ok(()))?;
        self.core.api.add_ice_candidate(self.core.id, candidate).await
    }

    /// Stats of the whole connection, or of one track.
    /// None when the engine fails or returns something that is not JSON.
    pub async fn get_stats(&self, track: Option<&MediaStreamTrack>) -> Option<Value> {
        fetch_stats(
            self.core.api.clone(),
            self.core.id,
            track.map(|t| t.id().to_string()),
        )
        .await
    }

    /// Allocates the channel id here (the requested one, or the lowest free one)
    /// and asks the engine to open a channel with it.
    pub async fn create_data_channel(
        &self,
        label: &str,
        init: Option<DataChannelInit>,
    ) -> Result<DataChannel, error::Error> {
        let mut init = init.unwrap_or_default();
        let channel_id = self.with_open(|inner| inner.channel_ids.allocate(init.id))?;
        init.id = Some(channel_id as i64);

        if let Err(e) = self
            .core
            .api
            .create_data_channel(self.core.id, label.to_string(), init.clone())
            .await
        {
            self.core.inner.lock().channel_ids.release(channel_id);
            return Err(e);
        }

        Ok(DataChannel {
            connection_id: self.core.id,
            label: label.to_string(),
            id: channel_id,
            init,
        })
    }

    pub async fn set_configuration(
        &self,
        configuration: RtcConfiguration,
    ) -> Result<(), error::Error> {
        self.with_open(|_| Ok(()))?;
        self.core
            .api
            .set_configuration(self.core.id, configuration.with_unified_plan())
            .await
    }

    /// Stops notification delivery, then closes the engine side.
    /// Raises no events. A second call does nothing.
    pub async fn close(&self) -> Result<(), error::Error> {
        {
            let mut inner = self.core.inner.lock();
            if inner.closed {
                return Ok(());
            }
            inner.closed = true;
            inner.state.close();
            inner.release_resources();
        }

        self.core.router.unregister(self.core.id);
        info!("peer connection {}: closed", self.core.id);
        self.core.api.close(self.core.id).await
    }

    fn with_open<T, F>(&self, f: F) -> Result<T, error::Error>
    where
        F: FnOnce(&mut ConnectionInner) -> Result<T, error::Error>,
    {
        let mut inner = self.core.inner.lock();
        if !inner.is_open() {
            return Err(error::Error::InvalidState(self.core.id));
        }
        f(&mut inner)
    }
}

impl Drop for PeerConnection {
    fn drop(&mut self) {
        if !self.core.inner.lock().closed {
            debug!(
                "peer connection {}: dropped without close, the engine side stays open",
                self.core.id
            );
        }
        self.core.router.unregister(self.core.id);
    }
}
