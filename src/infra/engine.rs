// Channel bridge to the native engine.
// Every PeerConnectionApi call becomes one EngineRequest carrying a oneshot reply slot.
// Whoever drives the engine consumes the requests and answers each one exactly once.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shaku::Component;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::domain::peer_connection::repository::PeerConnectionApi;
use crate::domain::peer_connection::value_object::{
    DataChannelInit, IceCandidate, MediaConstraints, PeerConnectionId, RtcConfiguration,
    SessionDescription,
};
use crate::error;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "command", content = "params")]
pub enum EngineCommand {
    #[serde(rename = "INIT")]
    Init { configuration: RtcConfiguration },
    #[serde(rename = "SET_CONFIGURATION")]
    SetConfiguration { configuration: RtcConfiguration },
    #[serde(rename = "CREATE_OFFER")]
    CreateOffer { constraints: MediaConstraints },
    #[serde(rename = "CREATE_ANSWER")]
    CreateAnswer { constraints: MediaConstraints },
    #[serde(rename = "SET_LOCAL_DESCRIPTION")]
    SetLocalDescription { description: SessionDescription },
    #[serde(rename = "SET_REMOTE_DESCRIPTION")]
    SetRemoteDescription { description: SessionDescription },
    #[serde(rename = "ADD_ICE_CANDIDATE")]
    AddIceCandidate { candidate: IceCandidate },
    #[serde(rename = "GET_STATS")]
    GetStats { track_id: String },
    #[serde(rename = "ADD_TRACK")]
    AddTrack { track_id: String, stream_tag: String },
    #[serde(rename = "REMOVE_TRACK")]
    RemoveTrack { track_id: String, stream_tag: String },
    #[serde(rename = "ADD_STREAM")]
    AddStream { stream_tag: String },
    #[serde(rename = "REMOVE_STREAM")]
    RemoveStream { stream_tag: String },
    #[serde(rename = "REPLACE_SENDER_TRACK")]
    ReplaceSenderTrack {
        sender_track_id: String,
        track_id: Option<String>,
    },
    #[serde(rename = "CREATE_DATA_CHANNEL")]
    CreateDataChannel { label: String, init: DataChannelInit },
    #[serde(rename = "CLOSE")]
    Close,
}

/// The engine's answer to one command.
/// On failure `data` is the engine's diagnostic payload, passed to the caller as is.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EngineResponse {
    pub successful: bool,
    #[serde(default)]
    pub data: Value,
}

impl EngineResponse {
    pub fn success(data: Value) -> Self {
        EngineResponse {
            successful: true,
            data,
        }
    }

    pub fn failure(data: Value) -> Self {
        EngineResponse {
            successful: false,
            data,
        }
    }
}

#[derive(Debug)]
pub struct EngineRequest {
    pub id: PeerConnectionId,
    pub command: EngineCommand,
    pub reply: oneshot::Sender<EngineResponse>,
}

impl EngineRequest {
    /// Dropping the request without answering makes the caller fail with EngineUnavailable
    pub fn respond(self, response: EngineResponse) {
        if self.reply.send(response).is_err() {
            debug!(
                "peer connection {}: caller went away before the engine answered",
                self.id
            );
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct CommandSender(mpsc::Sender<EngineRequest>);

// without an engine attached every command fails with EngineUnavailable
impl Default for CommandSender {
    fn default() -> Self {
        let (command_tx, _) = mpsc::channel(1);
        CommandSender(command_tx)
    }
}

#[derive(Component)]
#[shaku(interface = PeerConnectionApi)]
pub(crate) struct ChannelEngineApi {
    #[shaku(default)]
    command_tx: CommandSender,
}

impl ChannelEngineApi {
    pub fn new(command_tx: mpsc::Sender<EngineRequest>) -> Self {
        ChannelEngineApi {
            command_tx: CommandSender(command_tx),
        }
    }

    async fn request(
        &self,
        id: PeerConnectionId,
        command: EngineCommand,
    ) -> Result<Value, error::Error> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = EngineRequest {
            id,
            command,
            reply: reply_tx,
        };
        self.command_tx
            .0
            .send(request)
            .await
            .map_err(|_| error::Error::EngineUnavailable)?;

        let response = reply_rx
            .await
            .map_err(|_| error::Error::EngineUnavailable)?;
        if response.successful {
            Ok(response.data)
        } else {
            Err(error::Error::EngineError(response.data))
        }
    }

    async fn request_unit(
        &self,
        id: PeerConnectionId,
        command: EngineCommand,
    ) -> Result<(), error::Error> {
        self.request(id, command).await.map(|_| ())
    }
}

#[async_trait]
impl PeerConnectionApi for ChannelEngineApi {
    async fn init(
        &self,
        configuration: RtcConfiguration,
        id: PeerConnectionId,
    ) -> Result<(), error::Error> {
        self.request_unit(id, EngineCommand::Init { configuration })
            .await
    }

    async fn set_configuration(
        &self,
        id: PeerConnectionId,
        configuration: RtcConfiguration,
    ) -> Result<(), error::Error> {
        self.request_unit(id, EngineCommand::SetConfiguration { configuration })
            .await
    }

    async fn create_offer(
        &self,
        id: PeerConnectionId,
        constraints: MediaConstraints,
    ) -> Result<SessionDescription, error::Error> {
        let data = self
            .request(id, EngineCommand::CreateOffer { constraints })
            .await?;
        Ok(serde_json::from_value::<SessionDescription>(data)?)
    }

    async fn create_answer(
        &self,
        id: PeerConnectionId,
        constraints: MediaConstraints,
    ) -> Result<SessionDescription, error::Error> {
        let data = self
            .request(id, EngineCommand::CreateAnswer { constraints })
            .await?;
        Ok(serde_json::from_value::<SessionDescription>(data)?)
    }

    async fn set_local_description(
        &self,
        id: PeerConnectionId,
        description: SessionDescription,
    ) -> Result<(), error::Error> {
        self.request_unit(id, EngineCommand::SetLocalDescription { description })
            .await
    }

    async fn set_remote_description(
        &self,
        id: PeerConnectionId,
        description: SessionDescription,
    ) -> Result<(), error::Error> {
        self.request_unit(id, EngineCommand::SetRemoteDescription { description })
            .await
    }

    async fn add_ice_candidate(
        &self,
        id: PeerConnectionId,
        candidate: IceCandidate,
    ) -> Result<(), error::Error> {
        self.request_unit(id, EngineCommand::AddIceCandidate { candidate })
            .await
    }

    async fn get_stats(
        &self,
        id: PeerConnectionId,
        track_id: String,
    ) -> Result<String, error::Error> {
        let data = self
            .request(id, EngineCommand::GetStats { track_id })
            .await?;
        // engines answer either with the report serialized or with the report itself
        match data {
            Value::String(raw) => Ok(raw),
            report => Ok(report.to_string()),
        }
    }

    async fn add_track(
        &self,
        id: PeerConnectionId,
        track_id: String,
        stream_tag: String,
    ) -> Result<(), error::Error> {
        self.request_unit(
            id,
            EngineCommand::AddTrack {
                track_id,
                stream_tag,
            },
        )
        .await
    }

    async fn remove_track(
        &self,
        id: PeerConnectionId,
        track_id: String,
        stream_tag: String,
    ) -> Result<(), error::Error> {
        self.request_unit(
            id,
            EngineCommand::RemoveTrack {
                track_id,
                stream_tag,
            },
        )
        .await
    }

    async fn add_stream(
        &self,
        id: PeerConnectionId,
        stream_tag: String,
    ) -> Result<(), error::Error> {
        self.request_unit(id, EngineCommand::AddStream { stream_tag })
            .await
    }

    async fn remove_stream(
        &self,
        id: PeerConnectionId,
        stream_tag: String,
    ) -> Result<(), error::Error> {
        self.request_unit(id, EngineCommand::RemoveStream { stream_tag })
            .await
    }

    async fn replace_sender_track(
        &self,
        id: PeerConnectionId,
        sender_track_id: String,
        track_id: Option<String>,
    ) -> Result<(), error::Error> {
        self.request_unit(
            id,
            EngineCommand::ReplaceSenderTrack {
                sender_track_id,
                track_id,
            },
        )
        .await
    }

    async fn create_data_channel(
        &self,
        id: PeerConnectionId,
        label: String,
        init: DataChannelInit,
    ) -> Result<(), error::Error> {
        self.request_unit(id, EngineCommand::CreateDataChannel { label, init })
            .await
    }

    async fn close(&self, id: PeerConnectionId) -> Result<(), error::Error> {
        self.request_unit(id, EngineCommand::Close).await
    }
}

#[cfg(test)]
mod test_engine {
    use std::sync::Arc;

    use shaku::HasComponent;

    use super::*;
    use crate::di::PeerConnectionContainer;
    use crate::domain::peer_connection::value_object::SdpType;

    // answers every request with the given closure
    fn engine<F>(respond: F) -> Arc<dyn PeerConnectionApi>
    where
        F: Fn(&EngineRequest) -> Option<EngineResponse> + Send + 'static,
    {
        let (command_tx, mut command_rx) = mpsc::channel::<EngineRequest>(10);
        tokio::spawn(async move {
            while let Some(request) = command_rx.recv().await {
                if let Some(response) = respond(&request) {
                    request.respond(response);
                }
            }
        });

        let module = PeerConnectionContainer::builder()
            .with_component_override::<dyn PeerConnectionApi>(Box::new(ChannelEngineApi::new(
                command_tx,
            )))
            .build();
        module.resolve()
    }

    #[tokio::test]
    async fn create_offer_parses_description() {
        let api = engine(|request| match request.command {
            EngineCommand::CreateOffer { ref constraints } => {
                assert_eq!(constraints.get("IceRestart").map(String::as_str), Some("true"));
                Some(EngineResponse::success(
                    serde_json::json!({"type": "offer", "sdp": "v=0"}),
                ))
            }
            _ => None,
        });

        // execute
        let mut constraints = MediaConstraints::new();
        constraints.insert("IceRestart".into(), "true".into());
        let result = api.create_offer(PeerConnectionId::new(1), constraints).await;

        // evaluate
        assert_eq!(
            result.unwrap(),
            SessionDescription::new(SdpType::Offer, "v=0")
        );
    }

    #[tokio::test]
    async fn failure_carries_engine_payload() {
        let api = engine(|_| {
            Some(EngineResponse::failure(
                serde_json::json!({"code": 400, "reason": "bad candidate"}),
            ))
        });

        let result = api
            .add_ice_candidate(
                PeerConnectionId::new(1),
                IceCandidate {
                    candidate: "candidate:0".into(),
                    sdp_mid: None,
                    sdp_m_line_index: None,
                },
            )
            .await;

        if let Err(error::Error::EngineError(payload)) = result {
            assert_eq!(payload["reason"], "bad candidate");
        } else {
            assert!(false);
        }
    }

    #[tokio::test]
    async fn unanswered_request_is_unavailable() {
        // the engine drops the reply slot
        let api = engine(|_| None);

        let result = api.close(PeerConnectionId::new(1)).await;

        if let Err(error::Error::EngineUnavailable) = result {
            assert!(true);
        } else {
            assert!(false);
        }
    }

    #[tokio::test]
    async fn default_component_has_no_engine() {
        let module = PeerConnectionContainer::builder().build();
        let api: Arc<dyn PeerConnectionApi> = module.resolve();

        let result = api.init(RtcConfiguration::default(), PeerConnectionId::new(0)).await;

        if let Err(error::Error::EngineUnavailable) = result {
            assert!(true);
        } else {
            assert!(false);
        }
    }

    #[tokio::test]
    async fn stats_are_returned_raw() {
        let api = engine(|request| match request.command {
            EngineCommand::GetStats { ref track_id } if track_id.is_empty() => Some(
                EngineResponse::success(serde_json::json!(r#"[{"type":"transport"}]"#)),
            ),
            EngineCommand::GetStats { .. } => Some(EngineResponse::success(
                serde_json::json!([{"type": "track"}]),
            )),
            _ => None,
        });

        let connection = api
            .get_stats(PeerConnectionId::new(1), String::new())
            .await
            .unwrap();
        let track = api
            .get_stats(PeerConnectionId::new(1), "audio-1".into())
            .await
            .unwrap();

        assert_eq!(connection, r#"[{"type":"transport"}]"#);
        assert_eq!(track, r#"[{"type":"track"}]"#);
    }

    #[test]
    fn command_wire_format() {
        let command = EngineCommand::AddTrack {
            track_id: "audio-1".into(),
            stream_tag: "tag".into(),
        };

        let json = serde_json::to_value(&command).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "command": "ADD_TRACK",
                "params": {"track_id": "audio-1", "stream_tag": "tag"}
            })
        );
        let close = serde_json::to_value(&EngineCommand::Close).unwrap();
        assert_eq!(close, serde_json::json!({"command": "CLOSE"}));
    }
}
