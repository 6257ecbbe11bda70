use serde_json::{json, Value};
use tokio::sync::mpsc;

use rtc_peer_coordinator::prelude::engine::*;
use rtc_peer_coordinator::prelude::value_object::*;
use rtc_peer_coordinator::prelude::*;
use rtc_peer_coordinator::run;

// A stand-in for the native engine.
// It accepts every command and reports the signaling and gathering progress of an offer.
async fn engine(
    mut command_rx: mpsc::Receiver<EngineRequest>,
    notification_tx: mpsc::Sender<EngineNotification>,
) {
    while let Some(request) = command_rx.recv().await {
        let id = request.id;
        tracing::info!("engine received {:?} for {}", request.command, id);

        let notifications = match request.command {
            EngineCommand::SetLocalDescription { .. } => vec![
                NotificationEnum::SignalingStateChanged {
                    signaling_state: SignalingState::HaveLocalOffer,
                },
                NotificationEnum::IceGatheringStateChanged {
                    ice_gathering_state: IceGatheringState::Gathering,
                },
                NotificationEnum::IceCandidateGathered {
                    candidate: IceCandidate {
                        candidate: "candidate:1 1 udp 2122260223 127.0.0.1 50000 typ host".into(),
                        sdp_mid: Some("0".into()),
                        sdp_m_line_index: Some(0),
                    },
                },
                NotificationEnum::IceGatheringStateChanged {
                    ice_gathering_state: IceGatheringState::Complete,
                },
            ],
            _ => vec![],
        };
        let data = match request.command {
            EngineCommand::CreateOffer { .. } => json!({"type": "offer", "sdp": "v=0\r\n"}),
            _ => Value::Null,
        };
        request.respond(EngineResponse::success(data));

        for notification in notifications {
            if notification_tx
                .send(EngineNotification::new(id, notification))
                .await
                .is_err()
            {
                return;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let (command_tx, command_rx) = mpsc::channel::<EngineRequest>(10);
    let (factory, notification_tx) = run(command_tx).await;
    tokio::spawn(engine(command_rx, notification_tx));

    let pc = factory.create(None).await?;
    let mut events = pc.subscribe();

    let offer = pc.create_offer(None).await?;
    pc.set_local_description(offer).await?;

    while let Some(event) = events.recv().await {
        println!("{:?}", event);
        if let PeerConnectionEvent::IceCandidate(None) = event {
            break;
        }
    }

    pc.close().await
}
