use std::sync::Arc;

use crate::domain::peer_connection::entity::{MediaStream, MediaStreamTrack, RtpSender, Transceiver};
use crate::domain::peer_connection::value_object::StreamDescriptor;
use crate::error;

/// Local view of the streams, tracks, senders and transceivers of one peer connection.
///
/// The application mutates it through addTrack / removeTrack and the engine through notifications.
/// Callers serialize access with the connection's lock.
#[derive(Debug)]
pub struct EntityBookkeeper {
    local_streams: Vec<Arc<MediaStream>>,
    local_tracks: Vec<Arc<MediaStreamTrack>>,
    remote_streams: Vec<Arc<MediaStream>>,
    transceivers: Arc<[Transceiver]>,
    senders: Vec<Arc<RtpSender>>,
}

impl Default for EntityBookkeeper {
    fn default() -> Self {
        EntityBookkeeper {
            local_streams: vec![],
            local_tracks: vec![],
            remote_streams: vec![],
            transceivers: Arc::from(Vec::new()),
            senders: vec![],
        }
    }
}

impl EntityBookkeeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the track was already added, in which case nothing changes
    pub fn add_local_track(
        &mut self,
        track: Arc<MediaStreamTrack>,
        stream: Arc<MediaStream>,
    ) -> bool {
        if !self.local_streams.iter().any(|s| Arc::ptr_eq(s, &stream)) {
            self.local_streams.push(stream);
        }
        if self.local_tracks.iter().any(|t| Arc::ptr_eq(t, &track)) {
            return false;
        }
        self.local_tracks.push(track);
        true
    }

    /// Removes the local stream holding a track with the same id as sender_track, and that track.
    /// Returns None when nothing matches.
    pub fn remove_track(
        &mut self,
        sender_track: &MediaStreamTrack,
    ) -> Option<(Arc<MediaStream>, Arc<MediaStreamTrack>)> {
        let (stream_index, track) =
            self.local_streams
                .iter()
                .enumerate()
                .find_map(|(index, stream)| {
                    stream
                        .find_track(sender_track.id())
                        .map(|track| (index, track))
                })?;
        let track_index = self
            .local_tracks
            .iter()
            .position(|t| Arc::ptr_eq(t, &track))?;

        let stream = self.local_streams.remove(stream_index);
        let track = self.local_tracks.remove(track_index);
        Some((stream, track))
    }

    /// Undoes add_local_track for a track the engine refused. The stream stays.
    pub fn forget_local_track(&mut self, track: &Arc<MediaStreamTrack>) {
        self.local_tracks.retain(|t| !Arc::ptr_eq(t, track));
    }

    pub fn add_local_stream(&mut self, stream: Arc<MediaStream>) -> bool {
        if self.local_streams.iter().any(|s| Arc::ptr_eq(s, &stream)) {
            return false;
        }
        self.local_streams.push(stream);
        true
    }

    pub fn remove_local_stream(&mut self, stream: &Arc<MediaStream>) -> bool {
        match self.local_streams.iter().position(|s| Arc::ptr_eq(s, stream)) {
            Some(index) => {
                self.local_streams.remove(index);
                true
            }
            None => false,
        }
    }

    /// Registers a stream announced by the engine together with a remote track.
    /// Remote streams carry exactly one track here; a redelivered descriptor returns the stream already registered.
    pub fn add_remote_stream(
        &mut self,
        descriptor: &StreamDescriptor,
    ) -> Result<Arc<MediaStream>, error::Error> {
        if descriptor.tracks.len() > 1 {
            return Err(error::Error::TooManyTracksInStream(
                descriptor.stream_tag.clone(),
            ));
        }
        if let Some(stream) = self.find_remote_stream(&descriptor.stream_tag) {
            return Ok(stream);
        }

        let stream = MediaStream::from_descriptor(descriptor);
        self.remote_streams.push(stream.clone());
        Ok(stream)
    }

    pub fn has_remote_stream(&self, stream_tag: &str) -> bool {
        self.remote_streams.iter().any(|s| s.tag() == stream_tag)
    }

    pub fn remove_remote_stream(&mut self, stream_tag: &str) -> Option<Arc<MediaStream>> {
        let index = self
            .remote_streams
            .iter()
            .position(|s| s.tag() == stream_tag)?;
        Some(self.remote_streams.remove(index))
    }

    /// The previous snapshot is dropped as a whole, entries are never merged
    pub fn replace_transceivers(&mut self, transceivers: Vec<Transceiver>) {
        self.transceivers = Arc::from(transceivers);
    }

    /// Remote track lookup used to route mute notifications
    pub fn find_track(&self, stream_tag: &str, track_id: &str) -> Option<Arc<MediaStreamTrack>> {
        self.find_remote_stream(stream_tag)
            .and_then(|stream| stream.find_track(track_id))
    }

    /// Records a sender for the local track the engine refers to.
    /// Fails when no local track matches, since the engine then knows a track this side does not.
    /// Returns Ok(None) when a sender for the track already exists.
    pub fn add_sender<F>(
        &mut self,
        sender_id: Option<&str>,
        sender_track_id: Option<&str>,
        create: F,
    ) -> Result<Option<Arc<RtpSender>>, error::Error>
    where
        F: FnOnce(Arc<MediaStreamTrack>) -> RtpSender,
    {
        let matches = |id: &str| Some(id) == sender_id || Some(id) == sender_track_id;

        let track = self
            .local_tracks
            .iter()
            .find(|t| matches(t.id()))
            .cloned()
            .ok_or_else(|| error::Error::DanglingSenderReference {
                sender_id: sender_id.map(str::to_string),
                sender_track_id: sender_track_id.map(str::to_string),
            })?;

        if self.senders.iter().any(|s| s.has_track_id(track.id())) {
            return Ok(None);
        }

        let sender = Arc::new(create(track));
        self.senders.push(sender.clone());
        Ok(Some(sender))
    }

    pub fn remove_sender(
        &mut self,
        sender_id: Option<&str>,
        sender_track_id: Option<&str>,
    ) -> Option<Arc<RtpSender>> {
        let index = self.senders.iter().position(|s| {
            sender_id.map(|id| s.has_track_id(id)).unwrap_or(false)
                || sender_track_id.map(|id| s.has_track_id(id)).unwrap_or(false)
        })?;
        Some(self.senders.remove(index))
    }

    /// Drops what only makes sense while the connection is negotiated
    pub fn clear_negotiated(&mut self) {
        self.senders.clear();
        self.transceivers = Arc::from(Vec::new());
    }

    pub fn local_streams(&self) -> Vec<Arc<MediaStream>> {
        self.local_streams.clone()
    }

    #[cfg(test)]
    pub fn local_tracks(&self) -> Vec<Arc<MediaStreamTrack>> {
        self.local_tracks.clone()
    }

    pub fn remote_streams(&self) -> Vec<Arc<MediaStream>> {
        self.remote_streams.clone()
    }

    pub fn transceivers(&self) -> Arc<[Transceiver]> {
        self.transceivers.clone()
    }

    pub fn senders(&self) -> Vec<Arc<RtpSender>> {
        self.senders.clone()
    }

    fn find_remote_stream(&self, stream_tag: &str) -> Option<Arc<MediaStream>> {
        self.remote_streams
            .iter()
            .find(|s| s.tag() == stream_tag)
            .cloned()
    }
}
