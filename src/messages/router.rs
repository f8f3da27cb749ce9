//! Per-room transport selection.

use std::sync::Arc;

use log::{debug, error};

use crate::{
    matrix::{EncryptionGateway, Transport},
    messages::{Message, MessageContent, render_markdown, strip_images},
    rooms::{RoomBinding, RoomStateCache},
};

/// Renders messages and delivers them to rooms through the right transport.
///
/// A room flagged as encrypted in the [`RoomStateCache`] always goes through
/// the [`EncryptionGateway`], everything else through the plaintext
/// [`Transport`].
///
/// # Partial failures
///
/// Every recipient is attempted. Failures are logged and the first one is
/// returned once all recipients have been tried.
pub struct MessageRouter {
    transport: Arc<dyn Transport>,
    gateway: Arc<dyn EncryptionGateway>,
    rooms: Arc<RoomStateCache>,
}

impl MessageRouter {
    pub fn new(
        transport: Arc<dyn Transport>,
        gateway: Arc<dyn EncryptionGateway>,
        rooms: Arc<RoomStateCache>,
    ) -> Self {
        MessageRouter {
            transport,
            gateway,
            rooms,
        }
    }

    /// Renders `message` into the content sent to rooms.
    pub fn render(message: &Message) -> MessageContent {
        let formatted_body = message
            .markdown
            .as_deref()
            .filter(|markdown| !markdown.is_empty())
            .and_then(|markdown| render_markdown(&strip_images(markdown)));

        MessageContent {
            body: message.text.clone(),
            formatted_body,
        }
    }

    /// Sends already rendered `content` to each room of `room_ids`.
    pub async fn send(&self, content: &MessageContent, room_ids: &[&str]) -> anyhow::Result<()> {
        let mut first_error = None;
        for room_id in room_ids {
            let encrypted = self.rooms.is_encrypted(room_id).await;
            if let Err(e) = self.deliver(content, room_id, encrypted).await {
                error!("failed to send message to {}: {:?}", room_id, e);
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Renders `message` once and sends it to the room of each binding.
    ///
    /// A binding flagged as encrypted is honored even if the cache does not
    /// know its room.
    pub async fn send_to(&self, message: &Message, bindings: &[RoomBinding]) -> anyhow::Result<()> {
        let content = Self::render(message);

        let mut first_error = None;
        for binding in bindings {
            let encrypted = binding.encrypted || self.rooms.is_encrypted(&binding.room_id).await;
            if let Err(e) = self.deliver(&content, &binding.room_id, encrypted).await {
                error!(
                    "failed to send message to {} in {}: {:?}",
                    binding.user_id, binding.room_id, e
                );
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    async fn deliver(
        &self,
        content: &MessageContent,
        room_id: &str,
        encrypted: bool,
    ) -> anyhow::Result<()> {
        debug!("delivering to {} (encrypted: {})", room_id, encrypted);
        if encrypted {
            self.gateway.send_encrypted(room_id, content).await
        } else {
            self.transport.send_plain(room_id, content).await
        }
    }
}
