use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::domain::peer_connection::repository::PeerConnectionApi;
use crate::domain::peer_connection::service::fetch_stats;
use crate::domain::peer_connection::value_object::{
    DataChannelInit, PeerConnectionId, StreamDescriptor, TrackDescriptor, TrackKind,
    TransceiverDescriptor,
};
use crate::error;

/// A single media source or sink.
/// Tracks are shared between streams with Arc and compared by identity, not by value.
#[derive(Debug)]
pub struct MediaStreamTrack {
    id: String,
    kind: TrackKind,
    label: String,
    remote: bool,
    muted: AtomicBool,
}

impl MediaStreamTrack {
    /// Track captured locally and handed to a connection by the application
    pub fn new(id: impl Into<String>, kind: TrackKind, label: impl Into<String>) -> Arc<Self> {
        Arc::new(MediaStreamTrack {
            id: id.into(),
            kind,
            label: label.into(),
            remote: false,
            muted: AtomicBool::new(false),
        })
    }

    pub(crate) fn from_descriptor(descriptor: &TrackDescriptor) -> Arc<Self> {
        Arc::new(MediaStreamTrack {
            id: descriptor.id.clone(),
            kind: descriptor.kind,
            label: descriptor.label.clone(),
            remote: true,
            muted: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn remote(&self) -> bool {
        self.remote
    }

    pub fn muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    // only the engine decides whether a track is muted
    pub(crate) fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
    }
}

/// A named group of tracks.
/// The tag is assigned by the engine and is what notifications refer to.
#[derive(Debug)]
pub struct MediaStream {
    id: String,
    tag: String,
    tracks: Vec<Arc<MediaStreamTrack>>,
}

impl MediaStream {
    pub fn new(
        id: impl Into<String>,
        tag: impl Into<String>,
        tracks: Vec<Arc<MediaStreamTrack>>,
    ) -> Arc<Self> {
        Arc::new(MediaStream {
            id: id.into(),
            tag: tag.into(),
            tracks,
        })
    }

    pub(crate) fn from_descriptor(descriptor: &StreamDescriptor) -> Arc<Self> {
        let tracks = descriptor
            .tracks
            .iter()
            .map(MediaStreamTrack::from_descriptor)
            .collect();
        MediaStream::new(&descriptor.stream_id, &descriptor.stream_tag, tracks)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn get_tracks(&self) -> Vec<Arc<MediaStreamTrack>> {
        self.tracks.clone()
    }

    pub fn find_track(&self, track_id: &str) -> Option<Arc<MediaStreamTrack>> {
        self.tracks.iter().find(|t| t.id() == track_id).cloned()
    }
}

/// One entry of the transceiver list reported by the engine
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Transceiver {
    pub mid: String,
    pub sender_track_id: Option<String>,
    pub receiver_track_id: Option<String>,
}

impl From<&TransceiverDescriptor> for Transceiver {
    fn from(descriptor: &TransceiverDescriptor) -> Self {
        Transceiver {
            mid: descriptor.transceiver_mid.clone(),
            sender_track_id: descriptor.sender_track_id.clone(),
            receiver_track_id: descriptor.receiver_track_id.clone(),
        }
    }
}

/// The local side of a transceiver.
/// Only created when the engine reports a sender for a local track the connection knows.
pub struct RtpSender {
    connection_id: PeerConnectionId,
    api: Arc<dyn PeerConnectionApi>,
    track: Mutex<Option<Arc<MediaStreamTrack>>>,
}

impl RtpSender {
    pub(crate) fn new(
        connection_id: PeerConnectionId,
        api: Arc<dyn PeerConnectionApi>,
        track: Arc<MediaStreamTrack>,
    ) -> Self {
        RtpSender {
            connection_id,
            api,
            track: Mutex::new(Some(track)),
        }
    }

    pub fn track(&self) -> Option<Arc<MediaStreamTrack>> {
        self.track.lock().clone()
    }

    pub(crate) fn has_track_id(&self, track_id: &str) -> bool {
        self.track
            .lock()
            .as_ref()
            .map(|t| t.id() == track_id)
            .unwrap_or(false)
    }

    /// Sender stats are the stats of the whole connection
    pub async fn get_stats(&self) -> Option<Value> {
        fetch_stats(self.api.clone(), self.connection_id, None).await
    }

    pub async fn replace_track(
        &self,
        track: Option<Arc<MediaStreamTrack>>,
    ) -> Result<(), error::Error> {
        let current = self
            .track()
            .ok_or_else(|| error::Error::create_local_error("sender has no track to replace"))?;
        self.api
            .replace_sender_track(
                self.connection_id,
                current.id().to_string(),
                track.as_ref().map(|t| t.id().to_string()),
            )
            .await?;
        *self.track.lock() = track;
        Ok(())
    }
}

impl fmt::Debug for RtpSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RtpSender")
            .field("connection_id", &self.connection_id)
            .field("track", &self.track())
            .finish()
    }
}

/// A data channel opened on a connection, either by the application or by the remote side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataChannel {
    pub connection_id: PeerConnectionId,
    pub label: String,
    pub id: u16,
    pub init: DataChannelInit,
}

#[cfg(test)]
mod test_entity {
    use super::*;
    use crate::domain::peer_connection::repository::MockPeerConnectionApi;

    #[test]
    fn remote_stream_from_descriptor() {
        let descriptor = StreamDescriptor {
            stream_id: "stream".into(),
            stream_tag: "tag".into(),
            tracks: vec![TrackDescriptor {
                id: "video-1".into(),
                kind: TrackKind::Video,
                label: "camera".into(),
            }],
        };

        let stream = MediaStream::from_descriptor(&descriptor);

        assert_eq!(stream.tag(), "tag");
        let track = stream.find_track("video-1").unwrap();
        assert!(track.remote());
        assert!(!track.muted());
        assert!(stream.find_track("audio-1").is_none());
    }

    #[tokio::test]
    async fn replace_track() {
        let old_track = MediaStreamTrack::new("audio-1", TrackKind::Audio, "mic");
        let new_track = MediaStreamTrack::new("audio-2", TrackKind::Audio, "headset");

        let mut mock = MockPeerConnectionApi::default();
        mock.expect_replace_sender_track()
            .withf(|_, current, next| current == "audio-1" && next.as_deref() == Some("audio-2"))
            .return_once(|_, _, _| Ok(()));

        let sender = RtpSender::new(PeerConnectionId::new(0), Arc::new(mock), old_track);
        sender.replace_track(Some(new_track.clone())).await.unwrap();

        assert!(Arc::ptr_eq(&sender.track().unwrap(), &new_track));
    }

    #[tokio::test]
    async fn replace_track_fail_keeps_current_track() {
        let old_track = MediaStreamTrack::new("audio-1", TrackKind::Audio, "mic");

        let mut mock = MockPeerConnectionApi::default();
        mock.expect_replace_sender_track()
            .return_once(|_, _, _| Err(error::Error::EngineError(Value::from("rejected"))));

        let sender = RtpSender::new(PeerConnectionId::new(0), Arc::new(mock), old_track.clone());
        let result = sender.replace_track(None).await;

        if let Err(error::Error::EngineError(payload)) = result {
            assert_eq!(payload, Value::from("rejected"));
        } else {
            assert!(false);
        }
        assert!(Arc::ptr_eq(&sender.track().unwrap(), &old_track));
    }
}
