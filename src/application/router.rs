use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::StreamExt;
use parking_lot::RwLock;
use shaku::*;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::domain::peer_connection::value_object::{EngineNotification, PeerConnectionId};

#[cfg(test)]
use mockall::automock;

/// Demultiplexes the engine's notification stream by connection id.
/// Each registered connection gets its own inbound queue; notifications for ids without a queue are dropped.
#[cfg_attr(test, automock)]
pub trait NotificationRouter: Interface {
    /// A second registration of the same id replaces the first queue
    fn register(&self, id: PeerConnectionId) -> mpsc::UnboundedReceiver<EngineNotification>;
    /// Idempotent. Dropping the queue ends the connection's dispatch loop.
    fn unregister(&self, id: PeerConnectionId);
    /// Returns false when the notification was dropped
    fn route(&self, notification: EngineNotification) -> bool;
}

// Created only through the DI container
#[derive(Component)]
#[shaku(interface = NotificationRouter)]
pub(crate) struct NotificationRouterImpl {
    #[shaku(default)]
    routes: RwLock<HashMap<PeerConnectionId, mpsc::UnboundedSender<EngineNotification>>>,
}

impl NotificationRouter for NotificationRouterImpl {
    fn register(&self, id: PeerConnectionId) -> mpsc::UnboundedReceiver<EngineNotification> {
        let (notification_tx, notification_rx) = mpsc::unbounded_channel();
        self.routes.write().insert(id, notification_tx);
        notification_rx
    }

    fn unregister(&self, id: PeerConnectionId) {
        if self.routes.write().remove(&id).is_some() {
            debug!("peer connection {}: unsubscribed from notifications", id);
        }
    }

    fn route(&self, notification: EngineNotification) -> bool {
        let id = notification.id;
        let routes = self.routes.read();
        match routes.get(&id) {
            Some(notification_tx) => notification_tx.send(notification).is_ok(),
            None => {
                debug!(
                    "dropped a notification for peer connection {} which is not subscribed: {:?}",
                    id, notification.notification
                );
                false
            }
        }
    }
}

/// Feeds the engine's notification channel into the router until the engine side closes it
pub(crate) async fn run(
    router: Arc<dyn NotificationRouter>,
    notification_rx: mpsc::Receiver<EngineNotification>,
) {
    ReceiverStream::new(notification_rx)
        .for_each(|notification| {
            router.route(notification);
            futures::future::ready(())
        })
        .await;
    debug!("engine notification stream closed");
}
