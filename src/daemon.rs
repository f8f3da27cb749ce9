//! Composition root of the pairing and notification daemon.
//!
//! The [`Daemon`] owns the room state, the pairing registry and the sync loop,
//! and exposes the operations used by the external account system:
//!
//! - [`Daemon::send_start`] - create a direct room and post a pairing PIN in it
//! - [`Daemon::send`] - notify paired users
//! - [`Daemon::shutdown`] - stop the sync loop; later sends fail fast
//!
//! # Concurrency
//!
//! [`Daemon::run`] processes events serially on the caller's task while
//! `send_start` and `send` may be called from any other task. Shared state
//! lives in [`RoomStateCache`] and [`PairingRegistry`], both synchronized.

use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::Context;
use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use crate::{
    commands::{Dispatcher, LANG_COMMAND},
    lang::{Catalog, LANGUAGE_MESSAGE, START_MESSAGE},
    matrix::{EncryptionGateway, Transport},
    messages::{Message, MessageContent, MessageRouter},
    pairing::{PairingRegistry, PendingToken},
    rooms::{BindingStore, RoomBinding, RoomStateCache},
    sync_loop::SyncLoop,
};

/// Errors reported by the daemon itself.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    /// The daemon was shut down, or its sync loop died.
    #[error("daemon is shut down")]
    Stopped,
}

/// Identity of the bot and pairing room settings.
#[derive(Clone, Debug)]
pub struct DaemonSettings {
    /// Matrix ID of the bot account, used to ignore its own messages
    pub user_id: String,
    /// Topic of the rooms created for pairing
    pub topic: String,
}

/// External capabilities the daemon is built on.
#[derive(Clone)]
pub struct Collaborators {
    /// Room creation, plaintext delivery and the event stream
    pub transport: Arc<dyn Transport>,
    /// Encryption negotiation and encrypted delivery
    pub gateway: Arc<dyn EncryptionGateway>,
    /// Persistence of the paired rooms
    pub store: Arc<dyn BindingStore>,
}

/// The pairing and notification daemon.
pub struct Daemon {
    settings: DaemonSettings,
    transport: Arc<dyn Transport>,
    gateway: Arc<dyn EncryptionGateway>,
    store: Arc<dyn BindingStore>,
    catalog: Arc<Catalog>,
    rooms: Arc<RoomStateCache>,
    pairing: PairingRegistry,
    router: Arc<MessageRouter>,
    sync_loop: SyncLoop,
    shutdown: CancellationToken,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

impl Daemon {
    /// Creates a daemon started now, seeding room state from the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted bindings cannot be loaded.
    pub async fn new(
        settings: DaemonSettings,
        collaborators: Collaborators,
        catalog: Catalog,
    ) -> anyhow::Result<Self> {
        Self::with_start_time(settings, collaborators, catalog, now_millis()).await
    }

    /// Same as [`Daemon::new`] with an explicit start time, in milliseconds
    /// since the Unix epoch. Events older than this are never dispatched.
    pub async fn with_start_time(
        settings: DaemonSettings,
        collaborators: Collaborators,
        catalog: Catalog,
        start_millis: u64,
    ) -> anyhow::Result<Self> {
        let Collaborators {
            transport,
            gateway,
            store,
        } = collaborators;

        let bindings = store
            .load_bindings()
            .await
            .context("failed to load room bindings")?;
        info!("{} paired rooms loaded", bindings.len());

        let rooms = Arc::new(RoomStateCache::from_bindings(&bindings));
        let catalog = Arc::new(catalog);
        let router = Arc::new(MessageRouter::new(
            Arc::clone(&transport),
            Arc::clone(&gateway),
            Arc::clone(&rooms),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            &settings.user_id,
            start_millis,
            Arc::clone(&rooms),
            Arc::clone(&catalog),
            Arc::clone(&router),
            Arc::clone(&store),
        ));
        let shutdown = CancellationToken::new();
        let sync_loop = SyncLoop::new(Arc::clone(&transport), dispatcher, shutdown.clone());

        Ok(Daemon {
            settings,
            transport,
            gateway,
            store,
            catalog,
            rooms,
            pairing: PairingRegistry::new(),
            router,
            sync_loop,
            shutdown,
        })
    }

    /// Runs the sync loop until shutdown.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the sync fails. The daemon is stopped
    /// afterwards and does not reconnect.
    pub async fn run(&self) -> anyhow::Result<()> {
        info!("starting daemon for {}", self.settings.user_id);
        self.sync_loop.run().await
    }

    /// Stops the sync loop and wakes every [`Daemon::stopped`] waiter. Idempotent.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            info!("shutting down");
        }
        self.shutdown.cancel();
    }

    /// Whether the daemon was shut down.
    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Waits until the daemon is shut down.
    pub async fn stopped(&self) {
        self.shutdown.cancelled().await
    }

    fn ensure_running(&self) -> anyhow::Result<()> {
        if self.is_stopped() {
            return Err(DaemonError::Stopped.into());
        }
        Ok(())
    }

    /// Room state shared with the dispatcher.
    pub fn rooms(&self) -> &RoomStateCache {
        &self.rooms
    }

    /// Starts pairing `user_id`. Returns whether the room was created and the PIN delivered.
    pub async fn send_start(&self, user_id: &str) -> bool {
        match self.start_pairing(user_id).await {
            Ok(token) => {
                info!(
                    "pairing started for {} in {}",
                    user_id, token.binding.room_id
                );
                true
            }
            Err(e) => {
                error!("failed to start pairing for {}: {:?}", user_id, e);
                false
            }
        }
    }

    /// Creates a direct room with `user_id`, issues a PIN and posts it in the room.
    ///
    /// Encryption is attempted on the new room; if it cannot be enabled the
    /// room stays plaintext. The token is kept even if the welcome message
    /// cannot be delivered.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon is stopped, the room cannot be created
    /// or the welcome message cannot be sent.
    pub async fn start_pairing(&self, user_id: &str) -> anyhow::Result<PendingToken> {
        self.ensure_running()?;

        let room_id = self
            .transport
            .create_direct_room(user_id, &self.settings.topic)
            .await
            .with_context(|| format!("failed to create room for {}", user_id))?;

        let encrypted = self.gateway.enable_encryption(&room_id, user_id).await;
        if !encrypted {
            warn!("room {} falls back to plaintext", room_id);
        }
        self.rooms.insert_room(&room_id, encrypted).await;

        let token = self
            .pairing
            .issue(RoomBinding::new(&room_id, user_id, encrypted))
            .await;

        let welcome = self.welcome_message(&token.binding.language, &token.pin);
        self.router
            .send(&MessageContent::plain(&welcome), &[&room_id])
            .await
            .with_context(|| format!("failed to send welcome message to {}", user_id))?;

        Ok(token)
    }

    fn welcome_message(&self, language: &str, pin: &str) -> String {
        format!(
            "{}\n\n{}\n\n{}",
            self.catalog.template(language, START_MESSAGE, &[]),
            pin,
            self.catalog
                .template(language, LANGUAGE_MESSAGE, &[("command", LANG_COMMAND)])
        )
    }

    /// Looks up the token issued with `pin`. The token stays pending.
    pub async fn pending_token(&self, pin: &str) -> Option<PendingToken> {
        self.pairing.get(pin).await
    }

    /// Registers a binding confirmed by the account system.
    ///
    /// The room learns its paired user so that later language changes are
    /// persisted too. A language picked with `!lang` while the pairing was
    /// pending wins over the one carried by `binding`. The merged binding is
    /// then persisted.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon is stopped or the binding cannot be saved.
    pub async fn link_binding(&self, binding: &RoomBinding) -> anyhow::Result<()> {
        self.ensure_running()?;

        let linked = self.rooms.link(binding).await;
        self.store.save_binding(&linked).await?;

        info!("{} linked to {}", binding.user_id, binding.room_id);
        Ok(())
    }

    /// Sends `message` to the rooms of `users`.
    ///
    /// Every recipient is attempted; the first delivery error is returned.
    ///
    /// # Errors
    ///
    /// Fails fast with [`DaemonError::Stopped`] after shutdown.
    pub async fn send(&self, message: &Message, users: &[RoomBinding]) -> anyhow::Result<()> {
        self.ensure_running()?;
        self.router.send_to(message, users).await
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        matrix::{IncomingEvent, MockEncryptionGateway, MockTransport},
        rooms::MockBindingStore,
    };

    const ALICE: &str = "@alice:example.com";
    const NEW_ROOM: &str = "!new:example.com";

    fn settings() -> DaemonSettings {
        DaemonSettings {
            user_id: "@bot:example.com".to_string(),
            topic: "Notifications".to_string(),
        }
    }

    fn empty_store() -> MockBindingStore {
        let mut store = MockBindingStore::new();
        store.expect_load_bindings().returning(|| Ok(vec![]));
        store
    }

    async fn daemon(
        transport: MockTransport,
        gateway: MockEncryptionGateway,
        store: MockBindingStore,
    ) -> Daemon {
        Daemon::new(
            settings(),
            Collaborators {
                transport: Arc::new(transport),
                gateway: Arc::new(gateway),
                store: Arc::new(store),
            },
            Catalog::builtin(),
        )
        .await
        .unwrap()
    }

    fn transport_creating_room() -> MockTransport {
        let mut transport = MockTransport::new();
        transport
            .expect_create_direct_room()
            .withf(|invitee, topic| invitee == ALICE && topic == "Notifications")
            .times(1)
            .returning(|_, _| Ok(NEW_ROOM.to_string()));
        transport
    }

    fn gateway_encrypting(encrypted: bool) -> MockEncryptionGateway {
        let mut gateway = MockEncryptionGateway::new();
        gateway
            .expect_enable_encryption()
            .withf(|room_id, user_id| room_id == NEW_ROOM && user_id == ALICE)
            .times(1)
            .returning(move |_, _| encrypted);
        gateway
    }

    #[tokio::test]
    async fn test_new_seeds_rooms_from_store() {
        let mut store = MockBindingStore::new();
        store.expect_load_bindings().times(1).returning(|| {
            Ok(vec![RoomBinding {
                room_id: "!old:example.com".to_string(),
                user_id: ALICE.to_string(),
                language: "fr".to_string(),
                encrypted: true,
            }])
        });

        let daemon = daemon(MockTransport::new(), MockEncryptionGateway::new(), store).await;

        assert!(daemon.rooms().is_encrypted("!old:example.com").await);
        assert_eq!(
            daemon.rooms().language("!old:example.com").await.unwrap(),
            "fr"
        );
    }

    #[tokio::test]
    async fn test_new_fails_when_bindings_cannot_be_loaded() {
        let mut store = MockBindingStore::new();
        store
            .expect_load_bindings()
            .returning(|| Err(anyhow::anyhow!("corrupted")));

        let result = Daemon::new(
            settings(),
            Collaborators {
                transport: Arc::new(MockTransport::new()),
                gateway: Arc::new(MockEncryptionGateway::new()),
                store: Arc::new(store),
            },
            Catalog::builtin(),
        )
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_start_pairing_without_encryption_uses_plaintext() {
        let mut transport = transport_creating_room();
        transport
            .expect_send_plain()
            .withf(|room_id, content| {
                room_id == NEW_ROOM
                    && content.body.starts_with("Hi! To finish linking your account")
                    && content.body.contains("!lang")
            })
            .times(1)
            .returning(|_, _| Ok(()));
        let daemon = daemon(transport, gateway_encrypting(false), empty_store()).await;

        let token = daemon.start_pairing(ALICE).await.unwrap();

        assert!(!token.verified);
        assert!(!token.binding.encrypted);
        assert_eq!(token.binding.room_id, NEW_ROOM);
        assert_eq!(token.binding.user_id, ALICE);
        assert_eq!(token.binding.language, "en-us");
        assert_eq!(daemon.pending_token(&token.pin).await, Some(token));
    }

    #[tokio::test]
    async fn test_welcome_message_contains_pin() {
        let (sent_tx, mut sent_rx) = mpsc::unbounded_channel();
        let mut transport = transport_creating_room();
        transport
            .expect_send_plain()
            .times(1)
            .returning(move |_, content| {
                sent_tx.send(content.body.clone()).unwrap();
                Ok(())
            });
        let daemon = daemon(transport, gateway_encrypting(false), empty_store()).await;

        let token = daemon.start_pairing(ALICE).await.unwrap();

        let body = sent_rx.recv().await.unwrap();
        let sections: Vec<&str> = body.split("\n\n").collect();
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[1], token.pin);
    }

    #[tokio::test]
    async fn test_start_pairing_with_encryption_sends_encrypted_welcome() {
        let transport = transport_creating_room();
        let mut gateway = gateway_encrypting(true);
        gateway
            .expect_send_encrypted()
            .withf(|room_id, _| room_id == NEW_ROOM)
            .times(1)
            .returning(|_, _| Ok(()));
        let daemon = daemon(transport, gateway, empty_store()).await;

        let token = daemon.start_pairing(ALICE).await.unwrap();

        assert!(token.binding.encrypted);
        assert!(daemon.rooms().is_encrypted(NEW_ROOM).await);
    }

    #[tokio::test]
    async fn test_encryption_stays_sticky_for_later_sends() {
        let transport = transport_creating_room();
        let mut gateway = gateway_encrypting(true);
        gateway
            .expect_send_encrypted()
            .withf(|room_id, _| room_id == NEW_ROOM)
            .times(3)
            .returning(|_, _| Ok(()));
        let daemon = daemon(transport, gateway, empty_store()).await;
        daemon.start_pairing(ALICE).await.unwrap();

        let stale = RoomBinding::new(NEW_ROOM, ALICE, false);
        daemon.send(&Message::text("one"), &[stale.clone()]).await.unwrap();
        daemon.send(&Message::text("two"), &[stale]).await.unwrap();
    }

    #[tokio::test]
    async fn test_send_start_returns_false_when_room_creation_fails() {
        let mut transport = MockTransport::new();
        transport
            .expect_create_direct_room()
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("forbidden")));
        let daemon = daemon(transport, MockEncryptionGateway::new(), empty_store()).await;

        assert!(!daemon.send_start(ALICE).await);
    }

    #[tokio::test]
    async fn test_send_start_returns_false_when_welcome_fails() {
        let mut transport = transport_creating_room();
        transport
            .expect_send_plain()
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("rate limited")));
        let daemon = daemon(transport, gateway_encrypting(false), empty_store()).await;

        assert!(!daemon.send_start(ALICE).await);
    }

    #[tokio::test]
    async fn test_send_start_returns_true_on_success() {
        let mut transport = transport_creating_room();
        transport
            .expect_send_plain()
            .times(1)
            .returning(|_, _| Ok(()));
        let daemon = daemon(transport, gateway_encrypting(false), empty_store()).await;

        assert!(daemon.send_start(ALICE).await);
    }

    #[tokio::test]
    async fn test_link_binding_persists_and_caches() {
        let mut store = empty_store();
        store
            .expect_save_binding()
            .withf(|binding| binding.room_id == NEW_ROOM)
            .times(1)
            .returning(|_| Ok(()));
        let daemon = daemon(MockTransport::new(), MockEncryptionGateway::new(), store).await;

        daemon
            .link_binding(&RoomBinding::new(NEW_ROOM, ALICE, true))
            .await
            .unwrap();

        let state = daemon.rooms().get(NEW_ROOM).await.unwrap();
        assert!(state.encrypted);
        assert_eq!(state.user_id.as_deref(), Some(ALICE));
    }

    /// Transport creating [`NEW_ROOM`], replaying `events` on sync, then idling.
    struct ScriptedTransport {
        events: Vec<IncomingEvent>,
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn create_direct_room(&self, _: &str, _: &str) -> anyhow::Result<String> {
            Ok(NEW_ROOM.to_string())
        }

        async fn send_plain(&self, _: &str, _: &MessageContent) -> anyhow::Result<()> {
            Ok(())
        }

        async fn sync(&self, events: mpsc::Sender<IncomingEvent>) -> anyhow::Result<()> {
            for event in &self.events {
                events.send(event.clone()).await?;
            }
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_language_chosen_while_pending_survives_linking() {
        let mut store = empty_store();
        store
            .expect_save_binding()
            .withf(|binding| {
                binding.room_id == NEW_ROOM && binding.user_id == ALICE && binding.language == "fr"
            })
            .times(1)
            .returning(|_| Ok(()));
        let daemon = Arc::new(
            Daemon::with_start_time(
                settings(),
                Collaborators {
                    transport: Arc::new(ScriptedTransport {
                        events: vec![IncomingEvent::text(NEW_ROOM, ALICE, 1, "!lang fr")],
                    }),
                    gateway: Arc::new(gateway_encrypting(false)),
                    store: Arc::new(store),
                },
                Catalog::builtin(),
                0,
            )
            .await
            .unwrap(),
        );
        let token = daemon.start_pairing(ALICE).await.unwrap();

        let running = tokio::spawn({
            let daemon = Arc::clone(&daemon);
            async move { daemon.run().await }
        });
        for _ in 0..1000 {
            if daemon.rooms().language(NEW_ROOM).await.as_deref() == Some("fr") {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(daemon.rooms().language(NEW_ROOM).await.as_deref(), Some("fr"));

        let pending = daemon.pending_token(&token.pin).await.unwrap();
        daemon.link_binding(&pending.binding).await.unwrap();

        let state = daemon.rooms().get(NEW_ROOM).await.unwrap();
        assert_eq!(state.language, "fr");
        assert_eq!(state.user_id.as_deref(), Some(ALICE));

        daemon.shutdown();
        assert!(running.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_sends_after_shutdown_fail_fast() {
        let daemon = daemon(
            MockTransport::new(),
            MockEncryptionGateway::new(),
            empty_store(),
        )
        .await;

        daemon.shutdown();
        daemon.shutdown();

        let error = daemon
            .send(&Message::text("late"), &[RoomBinding::new(NEW_ROOM, ALICE, false)])
            .await
            .unwrap_err();
        assert!(matches!(
            error.downcast_ref::<DaemonError>(),
            Some(DaemonError::Stopped)
        ));
        assert!(!daemon.send_start(ALICE).await);
        daemon.stopped().await;
    }

    /// Transport whose sync never ends, like a healthy long poll.
    struct IdleTransport;

    #[async_trait]
    impl Transport for IdleTransport {
        async fn create_direct_room(&self, _: &str, _: &str) -> anyhow::Result<String> {
            unimplemented!()
        }

        async fn send_plain(&self, _: &str, _: &MessageContent) -> anyhow::Result<()> {
            unimplemented!()
        }

        async fn sync(&self, _events: mpsc::Sender<IncomingEvent>) -> anyhow::Result<()> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_shutdown_stops_running_loop() {
        let daemon = Arc::new(
            Daemon::new(
                settings(),
                Collaborators {
                    transport: Arc::new(IdleTransport),
                    gateway: Arc::new(MockEncryptionGateway::new()),
                    store: Arc::new(empty_store()),
                },
                Catalog::builtin(),
            )
            .await
            .unwrap(),
        );

        let running = tokio::spawn({
            let daemon = Arc::clone(&daemon);
            async move { daemon.run().await }
        });
        daemon.shutdown();

        assert!(running.await.unwrap().is_ok());
        assert!(daemon.is_stopped());
    }

    #[tokio::test]
    async fn test_sync_failure_stops_daemon() {
        let mut transport = MockTransport::new();
        transport
            .expect_sync()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("homeserver unreachable")));
        let daemon = daemon(transport, MockEncryptionGateway::new(), empty_store()).await;

        assert!(daemon.run().await.is_err());
        assert!(daemon.is_stopped());
        assert!(
            daemon
                .send(&Message::text("late"), &[])
                .await
                .unwrap_err()
                .is::<DaemonError>()
        );
    }
}
