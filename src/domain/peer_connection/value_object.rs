// Values exchanged with the native engine.
// They are plain parameters; the engine is the authority on their content,
// so nothing here validates SDP or candidate syntax.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Identifier given to each peer connection when it is constructed.
/// Every command and notification exchanged with the engine is tagged with it.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialOrd, PartialEq, Eq, Ord, Hash)]
#[serde(transparent)]
pub struct PeerConnectionId(u64);

impl PeerConnectionId {
    pub fn new(id: u64) -> Self {
        PeerConnectionId(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PeerConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum SignalingState {
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
    HaveLocalPranswer,
    HaveRemotePranswer,
    Closed,
}

impl Default for SignalingState {
    fn default() -> Self {
        SignalingState::Stable
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum IceGatheringState {
    New,
    Gathering,
    Complete,
}

impl Default for IceGatheringState {
    fn default() -> Self {
        IceGatheringState::New
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum IceConnectionState {
    New,
    Checking,
    Connected,
    Completed,
    Failed,
    Disconnected,
    Closed,
}

impl Default for IceConnectionState {
    fn default() -> Self {
        IceConnectionState::New
    }
}

/// Aggregate state of the connection.
/// The engine does not report it; it is derived from IceConnectionState.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum PeerConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl Default for PeerConnectionState {
    fn default() -> Self {
        PeerConnectionState::New
    }
}

impl From<IceConnectionState> for PeerConnectionState {
    fn from(state: IceConnectionState) -> Self {
        match state {
            IceConnectionState::New => PeerConnectionState::New,
            IceConnectionState::Checking => PeerConnectionState::Connecting,
            IceConnectionState::Connected | IceConnectionState::Completed => {
                PeerConnectionState::Connected
            }
            IceConnectionState::Failed => PeerConnectionState::Failed,
            IceConnectionState::Disconnected => PeerConnectionState::Disconnected,
            IceConnectionState::Closed => PeerConnectionState::Closed,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Pranswer,
    Answer,
    Rollback,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn new(sdp_type: SdpType, sdp: impl Into<String>) -> Self {
        SessionDescription {
            sdp_type,
            sdp: sdp.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid")]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_m_line_index: Option<u16>,
}

/// Details of a failed candidate gathering attempt
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct IceCandidateErrorInfo {
    pub address: Option<String>,
    pub port: Option<u16>,
    pub url: String,
    pub error_code: u16,
    pub error_text: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

/// The only negotiation dialect the engine is ever asked to use
pub const SDP_SEMANTICS: &str = "unified-plan";

/// Configuration handed to the engine when a connection is initialized
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RtcConfiguration {
    #[serde(default)]
    pub ice_servers: Vec<IceServer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ice_transport_policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtcp_mux_policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ice_candidate_pool_size: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdp_semantics: Option<String>,
}

impl RtcConfiguration {
    /// Returns the configuration with sdp_semantics forced to unified-plan
    pub fn with_unified_plan(mut self) -> Self {
        self.sdp_semantics = Some(SDP_SEMANTICS.to_string());
        self
    }
}

/// Options of createOffer / createAnswer as the application gives them
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct OfferAnswerOptions {
    pub offer_to_receive_audio: Option<bool>,
    pub offer_to_receive_video: Option<bool>,
    pub voice_activity_detection: Option<bool>,
    pub ice_restart: Option<bool>,
}

/// Options converted into the constraint names the engine understands.
/// Values are "true" / "false" strings.
pub type MediaConstraints = BTreeMap<String, String>;

impl OfferAnswerOptions {
    pub fn normalize(&self) -> MediaConstraints {
        let entries = [
            ("OfferToReceiveAudio", self.offer_to_receive_audio),
            ("OfferToReceiveVideo", self.offer_to_receive_video),
            ("VoiceActivityDetection", self.voice_activity_detection),
            ("IceRestart", self.ice_restart),
        ];

        entries
            .iter()
            .filter_map(|(key, value)| value.map(|v| (key.to_string(), v.to_string())))
            .collect()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct DataChannelInit {
    /// Kept wider than u16 so that out of range requests can be reported as InvalidId
    #[serde(
        default,
        deserialize_with = "integer_or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordered: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_packet_life_time: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retransmits: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negotiated: Option<bool>,
}

// a non integer id reads as no id instead of failing the whole notification
fn integer_or_none<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Value::deserialize(deserializer)?.as_i64())
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackDescriptor {
    pub id: String,
    pub kind: TrackKind,
    #[serde(default)]
    pub label: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamDescriptor {
    pub stream_id: String,
    pub stream_tag: String,
    #[serde(default)]
    pub tracks: Vec<TrackDescriptor>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransceiverDescriptor {
    pub transceiver_mid: String,
    pub sender_track_id: Option<String>,
    pub receiver_track_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DataChannelDescriptor {
    pub label: String,
    #[serde(flatten)]
    pub init: DataChannelInit,
}

/// Notifications raised by the engine
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "params")]
pub enum NotificationEnum {
    #[serde(rename = "RENEGOTIATION_NEEDED")]
    RenegotiationNeeded,
    #[serde(rename = "ICE_CONNECTION_STATE_CHANGED")]
    IceConnectionStateChanged {
        ice_connection_state: IceConnectionState,
    },
    #[serde(rename = "SIGNALING_STATE_CHANGED")]
    SignalingStateChanged { signaling_state: SignalingState },
    #[serde(rename = "TRANSCEIVERS_UPDATED")]
    TransceiversUpdated {
        #[serde(default)]
        transceivers: Vec<TransceiverDescriptor>,
    },
    #[serde(rename = "TRACK_ADDED")]
    TrackAdded {
        #[serde(default)]
        streams: Vec<StreamDescriptor>,
        transceiver_mid: Option<String>,
        // some engines report transceivers here instead of TRANSCEIVERS_UPDATED
        #[serde(default)]
        transceivers: Vec<TransceiverDescriptor>,
    },
    #[serde(rename = "SENDER_ADDED")]
    SenderAdded {
        sender_id: Option<String>,
        sender_track_id: Option<String>,
    },
    #[serde(rename = "SENDER_REMOVED")]
    SenderRemoved {
        sender_id: Option<String>,
        sender_track_id: Option<String>,
    },
    #[serde(rename = "REMOTE_STREAM_ADDED")]
    RemoteStreamAdded { stream: StreamDescriptor },
    #[serde(rename = "REMOTE_STREAM_REMOVED")]
    RemoteStreamRemoved { stream_tag: String },
    #[serde(rename = "TRACK_MUTE_CHANGED")]
    TrackMuteChanged {
        stream_tag: String,
        track_id: String,
        muted: bool,
    },
    #[serde(rename = "ICE_CANDIDATE_GATHERED")]
    IceCandidateGathered { candidate: IceCandidate },
    #[serde(rename = "ICE_CANDIDATE_ERROR")]
    IceCandidateError { error: IceCandidateErrorInfo },
    #[serde(rename = "ICE_GATHERING_STATE_CHANGED")]
    IceGatheringStateChanged {
        ice_gathering_state: IceGatheringState,
    },
    #[serde(rename = "DATA_CHANNEL_OPENED")]
    DataChannelOpened { data_channel: DataChannelDescriptor },
}

/// A notification together with the connection it belongs to
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EngineNotification {
    pub id: PeerConnectionId,
    pub notification: NotificationEnum,
}

impl EngineNotification {
    pub fn new(id: PeerConnectionId, notification: NotificationEnum) -> Self {
        EngineNotification { id, notification }
    }
}
