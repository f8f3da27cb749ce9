//! `matrix-sdk` backed implementation of [`Transport`] and [`EncryptionGateway`].

use anyhow::{Context, anyhow, bail};
use async_trait::async_trait;
use log::{debug, info, warn};
use matrix_sdk::{
    Client, EncryptionState, Room,
    ruma::{
        OwnedUserId, RoomId,
        api::client::room::{
            Visibility,
            create_room::v3::{Request as CreateRoomRequest, RoomPreset},
        },
        events::room::message::RoomMessageEventContent,
    },
};
use tokio::sync::mpsc;

use crate::{
    matrix::{
        EncryptionGateway, IncomingEvent, Transport, UserCredentials, encryption::setup_client,
        session::SessionFile, sync::EventFeed,
    },
    messages::MessageContent,
};

/// Authenticated Matrix client of the bot account.
///
/// Encryption itself is done by the SDK: once a room carries encryption
/// state, every message sent to it is encrypted with the client's Olm machine.
pub struct MatrixClient {
    client: Client,
    feed: EventFeed,
}

impl MatrixClient {
    /// Logs in (or restores the session stored in `session_path`) and sets up encryption.
    ///
    /// # Errors
    ///
    /// Returns an error if the session directory cannot be used, the login
    /// fails or the device cannot be verified.
    pub async fn new(credentials: &UserCredentials, session_path: &str) -> anyhow::Result<Self> {
        let mut session = SessionFile::open(session_path).await?;
        let client = setup_client(credentials, &mut session)
            .await
            .context("failed to set up matrix client")?;
        let feed = EventFeed::new(&client, &session);

        info!("matrix client ready for {}", credentials.user_id);
        Ok(MatrixClient { client, feed })
    }

    fn room(&self, room_id: &str) -> anyhow::Result<Room> {
        let room_id = RoomId::parse(room_id)?;
        self.client
            .get_room(&room_id)
            .ok_or_else(|| anyhow!("room {} is unknown to the client", room_id))
    }
}

fn to_event_content(content: &MessageContent) -> RoomMessageEventContent {
    match &content.formatted_body {
        Some(html) => RoomMessageEventContent::text_html(&content.body, html),
        None => RoomMessageEventContent::text_plain(&content.body),
    }
}

/// Fails unless the SDK sees `room_id` as encrypted.
fn ensure_encrypted(room_id: &str, state: EncryptionState) -> anyhow::Result<()> {
    if !state.is_encrypted() {
        bail!("room {} is not encrypted, refusing to send", room_id);
    }
    Ok(())
}

#[async_trait]
impl Transport for MatrixClient {
    async fn create_direct_room(&self, invitee_id: &str, topic: &str) -> anyhow::Result<String> {
        let invitee: OwnedUserId = invitee_id.try_into()?;

        let mut request = CreateRoomRequest::new();
        request.visibility = Visibility::Private;
        request.preset = Some(RoomPreset::PrivateChat);
        request.is_direct = true;
        request.invite = vec![invitee.clone()];
        if !topic.is_empty() {
            request.topic = Some(topic.to_string());
        }

        let room = self.client.create_room(request).await?;
        if let Err(e) = room.set_is_direct(true).await {
            warn!("failed to mark room {} as direct: {:?}", room.room_id(), e);
        }

        info!("direct room {} created for {}", room.room_id(), invitee);
        Ok(room.room_id().to_string())
    }

    async fn send_plain(&self, room_id: &str, content: &MessageContent) -> anyhow::Result<()> {
        self.room(room_id)?.send(to_event_content(content)).await?;
        debug!("message sent to {}", room_id);
        Ok(())
    }

    async fn sync(&self, events: mpsc::Sender<IncomingEvent>) -> anyhow::Result<()> {
        self.feed.run(events).await
    }
}

#[async_trait]
impl EncryptionGateway for MatrixClient {
    async fn enable_encryption(&self, room_id: &str, user_id: &str) -> bool {
        let room = match self.room(room_id) {
            Ok(room) => room,
            Err(e) => {
                warn!("cannot enable encryption: {:?}", e);
                return false;
            }
        };

        match room.enable_encryption().await {
            Ok(()) => {
                info!("encryption enabled in {} for {}", room_id, user_id);
                true
            }
            Err(e) => {
                warn!("failed to enable encryption in {}: {:?}", room_id, e);
                false
            }
        }
    }

    async fn send_encrypted(&self, room_id: &str, content: &MessageContent) -> anyhow::Result<()> {
        let room = self.room(room_id)?;
        ensure_encrypted(room_id, room.latest_encryption_state().await?)?;

        room.send(to_event_content(content)).await?;
        debug!("encrypted message sent to {}", room_id);
        Ok(())
    }
}
