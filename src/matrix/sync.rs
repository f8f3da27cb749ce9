//! Long-poll loop turning SDK room messages into [`IncomingEvent`]s.

use anyhow::Context;
use log::{debug, error, info, warn};
use matrix_sdk::{
    Client, LoopCtrl, Room, RoomState,
    config::SyncSettings,
    ruma::{
        api::client::filter::FilterDefinition,
        events::room::message::{MessageType, OriginalSyncRoomMessageEvent},
    },
};
use tokio::sync::mpsc;

use crate::matrix::{EventContent, IncomingEvent, ROOM_MESSAGE, session::SessionFile};

/// Feeds the events of a Matrix client into a channel.
pub struct EventFeed {
    client: Client,
    session: SessionFile,
}

impl EventFeed {
    pub fn new(client: &Client, session: &SessionFile) -> Self {
        EventFeed {
            client: client.clone(),
            session: session.clone(),
        }
    }

    /// Syncs until the connection fails, pushing room messages into `events`.
    ///
    /// A first sync catches up with the stored sync token before the message
    /// handler is registered. The sync token is persisted after every response.
    pub async fn run(&self, events: mpsc::Sender<IncomingEvent>) -> anyhow::Result<()> {
        let filter = FilterDefinition::with_lazy_loading();
        let mut sync_settings = SyncSettings::default().filter(filter.into());
        if let Some(sync_token) = self.session.sync_token() {
            sync_settings = sync_settings.token(sync_token);
        }

        let response = self
            .client
            .sync_once(sync_settings.clone())
            .await
            .context("initial sync failed")?;
        self.persist_token(&response.next_batch).await;
        sync_settings = sync_settings.token(response.next_batch);

        let handle = self.client.add_event_handler(
            move |event: OriginalSyncRoomMessageEvent, room: Room| {
                let events = events.clone();
                async move { forward_message(event, room, &events).await }
            },
        );

        info!("listening for room events");
        let result = self
            .client
            .sync_with_result_callback(sync_settings, |sync_result| async move {
                let response = sync_result?;
                self.persist_token(&response.next_batch).await;
                Ok(LoopCtrl::Continue)
            })
            .await;

        self.client.remove_event_handler(handle);
        result.context("sync loop failed")
    }

    async fn persist_token(&self, next_batch: &str) {
        if let Err(e) = self.session.persist_sync_token(next_batch).await {
            error!("failed to persist sync token: {:?}", e);
        }
    }
}

/// Decodes a room message and hands it to the channel.
async fn forward_message(
    event: OriginalSyncRoomMessageEvent,
    room: Room,
    events: &mpsc::Sender<IncomingEvent>,
) {
    if room.state() != RoomState::Joined {
        return;
    }

    let content = match event.content.msgtype {
        MessageType::Text(text) => EventContent::TextMessage { body: text.body },
        _ => EventContent::Other,
    };
    let incoming = IncomingEvent {
        event_type: ROOM_MESSAGE.to_string(),
        sender_id: event.sender.to_string(),
        room_id: room.room_id().to_string(),
        timestamp_millis: u64::from(event.origin_server_ts.0),
        content,
    };

    debug!("event from {} in {}", incoming.sender_id, incoming.room_id);
    if events.send(incoming).await.is_err() {
        warn!("event dropped, dispatcher is gone");
    }
}
