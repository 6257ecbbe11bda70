use std::sync::Arc;

use shaku::HasComponent;
use tokio::sync::mpsc;

pub(crate) mod application;
pub(crate) mod di;
pub(crate) mod domain;
pub mod error;
pub(crate) mod infra;
pub mod prelude;
pub(crate) mod presentation;

pub use application::event::PeerConnectionEvent;
pub use application::factory::PeerConnectionFactory;
pub use application::peer_connection::PeerConnection;
pub use domain::peer_connection::entity::{
    DataChannel, MediaStream, MediaStreamTrack, RtpSender, Transceiver,
};
pub use domain::peer_connection::value_object::{
    EngineNotification, NotificationEnum, PeerConnectionId,
};
pub use infra::engine::{EngineCommand, EngineRequest, EngineResponse};
pub use presentation::format_notification_json;

use crate::application::router::NotificationRouter;
use crate::di::PeerConnectionContainer;
use crate::domain::peer_connection::repository::PeerConnectionApi;
use crate::infra::engine::ChannelEngineApi;

/// Connects the coordination layer to a native engine.
///
/// Commands for the engine are sent to `command_tx`; the engine answers each one through its reply slot.
/// The engine feeds its notifications into the returned sender. Dropping that sender stops delivery
/// to every connection created from the returned factory.
pub async fn run(
    command_tx: mpsc::Sender<EngineRequest>,
) -> (PeerConnectionFactory, mpsc::Sender<EngineNotification>) {
    let module = PeerConnectionContainer::builder()
        .with_component_override::<dyn PeerConnectionApi>(Box::new(ChannelEngineApi::new(
            command_tx,
        )))
        .build();

    let (notification_tx, notification_rx) = mpsc::channel::<EngineNotification>(10);

    let router: Arc<dyn NotificationRouter> = module.resolve();
    tokio::spawn(application::router::run(router, notification_rx));

    (PeerConnectionFactory::from_module(&module), notification_tx)
}
