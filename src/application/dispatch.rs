use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::application::event::{EventEmitter, PeerConnectionEvent};
use crate::application::router::NotificationRouter;
use crate::domain::peer_connection::bookkeeper::EntityBookkeeper;
use crate::domain::peer_connection::channel_id::{DataChannelIdAllocator, MAX_DATA_CHANNEL_ID};
use crate::domain::peer_connection::entity::{DataChannel, MediaStream, RtpSender, Transceiver};
use crate::domain::peer_connection::repository::PeerConnectionApi;
use crate::domain::peer_connection::state::ConnectionStateMachine;
use crate::domain::peer_connection::value_object::{
    EngineNotification, IceGatheringState, NotificationEnum, PeerConnectionId,
    SessionDescription,
};
use crate::error;

/// Everything of a connection that commands and notifications both mutate.
/// Always accessed through ConnectionCore::inner.
#[derive(Debug)]
pub(crate) struct ConnectionInner {
    pub state: ConnectionStateMachine,
    pub bookkeeper: EntityBookkeeper,
    pub channel_ids: DataChannelIdAllocator,
    pub local_description: Option<SessionDescription>,
    pub remote_description: Option<SessionDescription>,
    // set by an explicit close only, ICE closed keeps it false
    pub closed: bool,
}

impl ConnectionInner {
    fn new(id: PeerConnectionId) -> Self {
        ConnectionInner {
            state: ConnectionStateMachine::new(id),
            bookkeeper: EntityBookkeeper::new(),
            channel_ids: DataChannelIdAllocator::new(),
            local_description: None,
            remote_description: None,
            closed: false,
        }
    }

    /// Commands are refused once the connection was closed locally or by the engine
    pub fn is_open(&self) -> bool {
        !self.closed && self.state.is_subscribed()
    }

    /// Cleanup once the connection reached closed, by local close or by the engine
    pub fn release_resources(&mut self) {
        self.channel_ids.clear();
        self.bookkeeper.clear_negotiated();
    }
}

/// Shared between the application handle and the dispatch loop of one connection
pub(crate) struct ConnectionCore {
    pub id: PeerConnectionId,
    pub api: Arc<dyn PeerConnectionApi>,
    pub router: Arc<dyn NotificationRouter>,
    // the lock is never held across an await
    pub inner: Mutex<ConnectionInner>,
    pub emitter: EventEmitter,
}

impl ConnectionCore {
    pub fn new(
        id: PeerConnectionId,
        api: Arc<dyn PeerConnectionApi>,
        router: Arc<dyn NotificationRouter>,
    ) -> Self {
        ConnectionCore {
            id,
            api,
            router,
            inner: Mutex::new(ConnectionInner::new(id)),
            emitter: EventEmitter::default(),
        }
    }

    /// Dispatch loop. Ends when the router drops the connection's queue.
    pub async fn listen(
        self: Arc<Self>,
        mut notification_rx: mpsc::UnboundedReceiver<EngineNotification>,
    ) {
        while let Some(notification) = notification_rx.recv().await {
            if let Err(e) = self.dispatch(notification) {
                // the engine knows something this side does not, keep going with the next one
                error!(
                    "peer connection {}: local state diverged from the engine: {}",
                    self.id, e
                );
            }
        }
        debug!("peer connection {}: dispatch loop finished", self.id);
    }

    /// Applies one notification to the connection state, then raises the resulting events.
    /// Events are emitted before the lock is released: once close() has taken the lock,
    /// nothing more reaches the listeners. Listeners only receive on unbounded queues,
    /// so emitting never waits on them.
    pub fn dispatch(&self, notification: EngineNotification) -> Result<(), error::Error> {
        let mut inner = self.inner.lock();
        if !inner.state.accepts(notification.id) {
            debug!(
                "peer connection {}: ignored {:?}",
                self.id, notification.notification
            );
            return Ok(());
        }

        for event in self.apply(&mut inner, notification.notification)? {
            self.emitter.emit(event);
        }
        Ok(())
    }

    fn apply(
        &self,
        inner: &mut ConnectionInner,
        notification: NotificationEnum,
    ) -> Result<Vec<PeerConnectionEvent>, error::Error> {
        let mut events = vec![];

        match notification {
            NotificationEnum::RenegotiationNeeded => {
                events.push(PeerConnectionEvent::NegotiationNeeded);
            }
            NotificationEnum::IceConnectionStateChanged {
                ice_connection_state,
            } => {
                if let Some(transition) = inner
                    .state
                    .accept_ice_connection_state(ice_connection_state)
                {
                    events.push(PeerConnectionEvent::IceConnectionStateChange(
                        transition.state,
                    ));
                    if let Some(connection_state) = transition.connection_state {
                        events.push(PeerConnectionEvent::ConnectionStateChange(
                            connection_state,
                        ));
                    }
                    if transition.terminal {
                        inner.release_resources();
                        self.router.unregister(self.id);
                        info!("peer connection {}: ICE connection closed", self.id);
                    }
                }
            }
            NotificationEnum::SignalingStateChanged { signaling_state } => {
                if inner.state.accept_signaling_state(signaling_state) {
                    events.push(PeerConnectionEvent::SignalingStateChange(signaling_state));
                }
            }
            NotificationEnum::TransceiversUpdated { transceivers } => {
                if !transceivers.is_empty() {
                    inner
                        .bookkeeper
                        .replace_transceivers(transceivers.iter().map(Transceiver::from).collect());
                    events.push(PeerConnectionEvent::TransceiversChanged(
                        inner.bookkeeper.transceivers(),
                    ));
                }
            }
            NotificationEnum::TrackAdded {
                streams,
                transceiver_mid,
                transceivers,
            } => {
                let mid = transceiver_mid.ok_or(error::Error::MissingField("transceiver_mid"))?;
                // reject the whole notification before anything is registered
                if let Some(descriptor) = streams.iter().find(|s| s.tracks.len() > 1) {
                    return Err(error::Error::TooManyTracksInStream(
                        descriptor.stream_tag.clone(),
                    ));
                }

                for descriptor in streams.iter() {
                    if inner.bookkeeper.has_remote_stream(&descriptor.stream_tag) {
                        debug!(
                            "peer connection {}: stream {} was already announced",
                            self.id, descriptor.stream_tag
                        );
                        continue;
                    }
                    let stream = inner.bookkeeper.add_remote_stream(descriptor)?;
                    events.push(PeerConnectionEvent::Track {
                        mid: mid.clone(),
                        track: stream.get_tracks().into_iter().next(),
                        streams: vec![stream],
                    });
                }

                // the snapshot follows silently, only Track is raised
                if !transceivers.is_empty() {
                    inner
                        .bookkeeper
                        .replace_transceivers(transceivers.iter().map(Transceiver::from).collect());
                }
            }
            NotificationEnum::SenderAdded {
                sender_id,
                sender_track_id,
            } => {
                let id = self.id;
                let api = self.api.clone();
                let sender = inner.bookkeeper.add_sender(
                    sender_id.as_deref(),
                    sender_track_id.as_deref(),
                    |track| RtpSender::new(id, api, track),
                )?;
                if let Some(sender) = sender {
                    events.push(PeerConnectionEvent::SenderAdded(sender));
                }
            }
            NotificationEnum::SenderRemoved {
                sender_id,
                sender_track_id,
            } => {
                match inner
                    .bookkeeper
                    .remove_sender(sender_id.as_deref(), sender_track_id.as_deref())
                {
                    Some(sender) => events.push(PeerConnectionEvent::SenderRemoved(sender)),
                    None => debug!(
                        "peer connection {}: no sender for {:?} / {:?}",
                        self.id, sender_id, sender_track_id
                    ),
                }
            }
            NotificationEnum::RemoteStreamAdded { stream } => {
                // legacy event, the stream is registered by TRACK_ADDED
                let stream = inner
                    .bookkeeper
                    .remote_streams()
                    .into_iter()
                    .find(|s| s.tag() == stream.stream_tag)
                    .unwrap_or_else(|| MediaStream::from_descriptor(&stream));
                events.push(PeerConnectionEvent::AddStream(stream));
            }
            NotificationEnum::RemoteStreamRemoved { stream_tag } => {
                let stream = inner.bookkeeper.remove_remote_stream(&stream_tag);
                events.push(PeerConnectionEvent::RemoveStream(stream));
            }
            NotificationEnum::TrackMuteChanged {
                stream_tag,
                track_id,
                muted,
            } => match inner.bookkeeper.find_track(&stream_tag, &track_id) {
                Some(track) if track.muted() != muted => {
                    track.set_muted(muted);
                    if muted {
                        events.push(PeerConnectionEvent::Mute(track));
                    } else {
                        events.push(PeerConnectionEvent::Unmute(track));
                    }
                }
                Some(_) => {}
                None => debug!(
                    "peer connection {}: no remote track {} in stream {}",
                    self.id, track_id, stream_tag
                ),
            },
            NotificationEnum::IceCandidateGathered { candidate } => {
                events.push(PeerConnectionEvent::IceCandidate(Some(candidate)));
            }
            NotificationEnum::IceCandidateError { error } => {
                events.push(PeerConnectionEvent::IceCandidateError(error));
            }
            NotificationEnum::IceGatheringStateChanged {
                ice_gathering_state,
            } => {
                if inner.state.accept_ice_gathering_state(ice_gathering_state) {
                    events.push(PeerConnectionEvent::IceGatheringStateChange(
                        ice_gathering_state,
                    ));
                    if ice_gathering_state == IceGatheringState::Complete {
                        // end of candidates
                        events.push(PeerConnectionEvent::IceCandidate(None));
                    }
                }
            }
            NotificationEnum::DataChannelOpened { data_channel } => match data_channel.init.id {
                Some(id) if id >= 0 && id < MAX_DATA_CHANNEL_ID as i64 => {
                    // the engine checked the id against its own allocator before opening the channel
                    inner.channel_ids.register(id as u16);
                    events.push(PeerConnectionEvent::DataChannel(DataChannel {
                        connection_id: self.id,
                        label: data_channel.label,
                        id: id as u16,
                        init: data_channel.init,
                    }));
                }
                _ => debug!(
                    "peer connection {}: ignored data channel {} without a usable id",
                    self.id, data_channel.label
                ),
            },
        }

        Ok(events)
    }
}
