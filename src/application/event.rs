use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::domain::peer_connection::entity::{
    DataChannel, MediaStream, MediaStreamTrack, RtpSender, Transceiver,
};
use crate::domain::peer_connection::value_object::{
    IceCandidate, IceCandidateErrorInfo, IceConnectionState, IceGatheringState,
    PeerConnectionState, SignalingState,
};

/// Events observed by the application.
/// Each one is raised after the connection state it describes has been recorded.
#[derive(Debug, Clone)]
pub enum PeerConnectionEvent {
    ConnectionStateChange(PeerConnectionState),
    /// None marks the end of candidates
    IceCandidate(Option<IceCandidate>),
    IceCandidateError(IceCandidateErrorInfo),
    IceConnectionStateChange(IceConnectionState),
    IceGatheringStateChange(IceGatheringState),
    NegotiationNeeded,
    SignalingStateChange(SignalingState),
    DataChannel(DataChannel),
    AddStream(Arc<MediaStream>),
    /// None when the engine removed a stream this side never registered
    RemoveStream(Option<Arc<MediaStream>>),
    Track {
        mid: String,
        track: Option<Arc<MediaStreamTrack>>,
        streams: Vec<Arc<MediaStream>>,
    },
    SenderAdded(Arc<RtpSender>),
    SenderRemoved(Arc<RtpSender>),
    TransceiversChanged(Arc<[Transceiver]>),
    Mute(Arc<MediaStreamTrack>),
    Unmute(Arc<MediaStreamTrack>),
}

/// Listener registry of one connection.
/// Listeners whose receiver has been dropped are forgotten on the next emit.
#[derive(Debug, Default)]
pub(crate) struct EventEmitter {
    listeners: Mutex<Vec<mpsc::UnboundedSender<PeerConnectionEvent>>>,
}

impl EventEmitter {
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<PeerConnectionEvent> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        self.listeners.lock().push(event_tx);
        event_rx
    }

    pub fn emit(&self, event: PeerConnectionEvent) {
        self.listeners
            .lock()
            .retain(|listener| listener.send(event.clone()).is_ok());
    }

    #[cfg(test)]
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

#[cfg(test)]
mod test_event_emitter {
    use super::*;

    #[tokio::test]
    async fn every_listener_receives_events_in_order() {
        let emitter = EventEmitter::default();
        let mut first = emitter.subscribe();
        let mut second = emitter.subscribe();

        emitter.emit(PeerConnectionEvent::NegotiationNeeded);
        emitter.emit(PeerConnectionEvent::SignalingStateChange(
            SignalingState::HaveLocalOffer,
        ));

        for rx in [&mut first, &mut second].iter_mut() {
            if let Some(PeerConnectionEvent::NegotiationNeeded) = rx.recv().await {
                assert!(true);
            } else {
                assert!(false);
            }
            if let Some(PeerConnectionEvent::SignalingStateChange(state)) = rx.recv().await {
                assert_eq!(state, SignalingState::HaveLocalOffer);
            } else {
                assert!(false);
            }
        }
    }

    #[tokio::test]
    async fn dropped_listener_is_removed() {
        let emitter = EventEmitter::default();
        let first = emitter.subscribe();
        let mut second = emitter.subscribe();
        drop(first);

        emitter.emit(PeerConnectionEvent::NegotiationNeeded);

        assert_eq!(emitter.listener_count(), 1);
        assert!(second.recv().await.is_some());
    }
}
