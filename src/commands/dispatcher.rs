//! Incoming event dispatch.

use std::sync::Arc;

use log::{debug, error, info, trace};

use crate::{
    commands::{Command, CommandContext, CommandResult, actions::handle_lang},
    lang::Catalog,
    matrix::{IncomingEvent, ROOM_MESSAGE},
    messages::{MessageContent, MessageRouter},
    rooms::{BindingStore, RoomStateCache},
};

/// Filters incoming events and runs the commands they carry.
///
/// Events are discarded when they:
///
/// - predate the daemon start (backlog replayed on first sync)
/// - were sent by the bot itself
/// - are not room messages
/// - are not text messages
/// - do not start with a known command
pub struct Dispatcher {
    /// Matrix ID of the bot account
    bot_user_id: String,
    /// Daemon start, in milliseconds since the Unix epoch
    start_millis: u64,
    rooms: Arc<RoomStateCache>,
    catalog: Arc<Catalog>,
    router: Arc<MessageRouter>,
    store: Arc<dyn BindingStore>,
}

impl Dispatcher {
    pub fn new(
        bot_user_id: &str,
        start_millis: u64,
        rooms: Arc<RoomStateCache>,
        catalog: Arc<Catalog>,
        router: Arc<MessageRouter>,
        store: Arc<dyn BindingStore>,
    ) -> Self {
        Dispatcher {
            bot_user_id: bot_user_id.to_string(),
            start_millis,
            rooms,
            catalog,
            router,
            store,
        }
    }

    /// Handles one event. Returns the command that was run, if any.
    pub async fn handle(&self, event: &IncomingEvent) -> Option<Command> {
        if event.timestamp_millis < self.start_millis {
            trace!("ignoring event older than daemon start in {}", event.room_id);
            return None;
        }
        if event.sender_id == self.bot_user_id {
            return None;
        }
        if event.event_type != ROOM_MESSAGE {
            trace!("ignoring {} event in {}", event.event_type, event.room_id);
            return None;
        }
        let body = event.text_body()?;
        let command = Command::parse(body)?;

        let cached = self.rooms.language(&event.room_id).await;
        let language = self.catalog.resolve(cached.as_deref());
        let context = CommandContext {
            room_id: &event.room_id,
            language,
            catalog: &self.catalog,
        };

        let result = match &command {
            Command::Lang(args) => handle_lang(&context, args),
        };
        self.apply(&event.room_id, result).await;

        Some(command)
    }

    /// Applies the outcome of a handler: language change first, then the reply.
    async fn apply(&self, room_id: &str, result: CommandResult) {
        if let Some(language) = result.language {
            info!("language of {} set to {}", room_id, language);
            match self.rooms.set_language(room_id, &language).await {
                Some(binding) => {
                    if let Err(e) = self.store.save_binding(&binding).await {
                        error!("failed to persist binding of {}: {:?}", room_id, e);
                    }
                }
                None => debug!("room {} has no persisted binding yet", room_id),
            }
        }

        if let Some(reply) = result.reply
            && let Err(e) = self
                .router
                .send(&MessageContent::plain(&reply), &[room_id])
                .await
        {
            error!("failed to reply in {}: {:?}", room_id, e);
        }
    }
}
