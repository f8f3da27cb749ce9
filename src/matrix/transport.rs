//! Capabilities the daemon needs from the homeserver client.

use async_trait::async_trait;
use mockall::automock;
use tokio::sync::mpsc;

use crate::{matrix::IncomingEvent, messages::MessageContent};

/// Room and event operations of the homeserver client.
#[automock]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Creates a private, direct, invite-only room inviting `invitee_id`.
    ///
    /// Returns the ID of the new room.
    async fn create_direct_room(&self, invitee_id: &str, topic: &str) -> anyhow::Result<String>;

    /// Sends `content` to `room_id` as a regular room message.
    async fn send_plain(&self, room_id: &str, content: &MessageContent) -> anyhow::Result<()>;

    /// Long-polls the homeserver and pushes every room event into `events`.
    ///
    /// Only returns when the connection fails for good.
    async fn sync(&self, events: mpsc::Sender<IncomingEvent>) -> anyhow::Result<()>;
}

/// End-to-end encryption capability.
#[automock]
#[async_trait]
pub trait EncryptionGateway: Send + Sync {
    /// Tries to enable encryption in a room shared with `user_id`.
    ///
    /// Returns whether the room is now encrypted. Failures are reported as `false`.
    async fn enable_encryption(&self, room_id: &str, user_id: &str) -> bool;

    /// Encrypts `content` and sends it to `room_id`.
    async fn send_encrypted(&self, room_id: &str, content: &MessageContent) -> anyhow::Result<()>;
}
