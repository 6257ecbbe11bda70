use std::sync::Arc;

use shaku::HasComponent;
use tracing::info;

use crate::application::dispatch::ConnectionCore;
use crate::application::peer_connection::PeerConnection;
use crate::application::router::NotificationRouter;
use crate::domain::peer_connection::repository::{IdentityAllocator, PeerConnectionApi};
use crate::domain::peer_connection::value_object::RtcConfiguration;
use crate::error;

/// Creates peer connections that share one engine, one router and one identity space
#[derive(Clone)]
pub struct PeerConnectionFactory {
    api: Arc<dyn PeerConnectionApi>,
    identity: Arc<dyn IdentityAllocator>,
    router: Arc<dyn NotificationRouter>,
}

impl PeerConnectionFactory {
    pub(crate) fn from_module<M>(module: &M) -> Self
    where
        M: HasComponent<dyn PeerConnectionApi>
            + HasComponent<dyn IdentityAllocator>
            + HasComponent<dyn NotificationRouter>,
    {
        PeerConnectionFactory {
            api: HasComponent::<dyn PeerConnectionApi>::resolve(module),
            identity: HasComponent::<dyn IdentityAllocator>::resolve(module),
            router: HasComponent::<dyn NotificationRouter>::resolve(module),
        }
    }

    /// Allocates an id, subscribes it to the engine's notifications and initializes the engine side.
    /// The engine is always told to use unified plan, whatever the configuration says.
    pub async fn create(
        &self,
        configuration: Option<RtcConfiguration>,
    ) -> Result<PeerConnection, error::Error> {
        let id = self.identity.next();
        // subscribe first, the engine may notify before init resolves
        let notification_rx = self.router.register(id);
        let core = Arc::new(ConnectionCore::new(
            id,
            self.api.clone(),
            self.router.clone(),
        ));
        tokio::spawn(core.clone().listen(notification_rx));
        // on failure the handle is dropped, which unsubscribes it again
        let connection = PeerConnection::new(core);

        let configuration = configuration.unwrap_or_default().with_unified_plan();
        self.api.init(configuration, id).await?;
        info!("peer connection {}: created", id);
        Ok(connection)
    }
}

#[cfg(test)]
mod test_factory {
    use std::collections::HashSet;

    use super::*;
    use crate::application::event::PeerConnectionEvent;
    use crate::di::PeerConnectionContainer;
    use crate::domain::peer_connection::repository::MockPeerConnectionApi;
    use crate::domain::peer_connection::value_object::{
        EngineNotification, IceServer, NotificationEnum, PeerConnectionId,
    };

    fn module(api: MockPeerConnectionApi) -> PeerConnectionContainer {
        PeerConnectionContainer::builder()
            .with_component_override::<dyn PeerConnectionApi>(Box::new(api))
            .build()
    }

    #[tokio::test]
    async fn create_initializes_engine() {
        // the configuration given to the engine always carries unified plan
        let mut api = MockPeerConnectionApi::default();
        api.expect_init()
            .withf(|configuration, id| {
                id.as_u64() == 0
                    && configuration.sdp_semantics.as_deref() == Some("unified-plan")
                    && configuration.ice_servers[0].urls[0] == "stun:stun.example.org"
            })
            .times(1)
            .returning(|_, _| Ok(()));
        let module = module(api);
        let factory = PeerConnectionFactory::from_module(&module);

        // execute
        let configuration = RtcConfiguration {
            ice_servers: vec![IceServer {
                urls: vec!["stun:stun.example.org".into()],
                ..Default::default()
            }],
            ..Default::default()
        };
        let result = factory.create(Some(configuration)).await;

        // evaluate
        assert_eq!(result.unwrap().id().as_u64(), 0);
    }

    #[tokio::test]
    async fn ids_increase() {
        let mut api = MockPeerConnectionApi::default();
        api.expect_init().returning(|_, _| Ok(()));
        let module = module(api);
        let factory = PeerConnectionFactory::from_module(&module);

        let first = factory.create(None).await.unwrap();
        let second = factory.create(None).await.unwrap();
        let third = factory.create(None).await.unwrap();

        assert!(first.id() < second.id());
        assert!(second.id() < third.id());
    }

    #[tokio::test]
    async fn concurrent_creation_gives_unique_ids() {
        let mut api = MockPeerConnectionApi::default();
        api.expect_init().times(32).returning(|_, _| Ok(()));
        let module = module(api);
        let factory = PeerConnectionFactory::from_module(&module);

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let factory = factory.clone();
                tokio::spawn(async move { factory.create(None).await.map(|pc| pc.id()) })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            let id = handle.await.unwrap().unwrap();
            assert!(ids.insert(id));
        }
        assert_eq!(ids.len(), 32);
    }

    #[tokio::test]
    async fn notifications_reach_the_new_connection() {
        let mut api = MockPeerConnectionApi::default();
        api.expect_init().returning(|_, _| Ok(()));
        let module = module(api);
        let factory = PeerConnectionFactory::from_module(&module);
        let router: Arc<dyn NotificationRouter> = module.resolve();

        let pc = factory.create(None).await.unwrap();
        let mut events = pc.subscribe();
        router.route(EngineNotification::new(
            pc.id(),
            NotificationEnum::RenegotiationNeeded,
        ));

        assert!(matches!(
            events.recv().await,
            Some(PeerConnectionEvent::NegotiationNeeded)
        ));
    }

    #[tokio::test]
    async fn failed_init_unsubscribes() {
        let mut api = MockPeerConnectionApi::default();
        api.expect_init()
            .returning(|_, _| Err(error::Error::EngineError(serde_json::json!("no engine"))));
        let module = module(api);
        let factory = PeerConnectionFactory::from_module(&module);
        let router: Arc<dyn NotificationRouter> = module.resolve();

        let result = factory.create(None).await;

        if let Err(error::Error::EngineError(payload)) = result {
            assert_eq!(payload, serde_json::json!("no engine"));
        } else {
            assert!(false);
        }
        assert!(!router.route(EngineNotification::new(
            PeerConnectionId::new(0),
            NotificationEnum::RenegotiationNeeded,
        )));
    }
}
