//! Events handed from the transport to the dispatcher.

/// Event type of room messages.
pub const ROOM_MESSAGE: &str = "m.room.message";

/// Content of an incoming event, decoded once by the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventContent {
    /// A plain text message
    TextMessage {
        /// Text of the message
        body: String,
    },
    /// Anything else: notices, media, reactions...
    Other,
}

/// A room event received from the homeserver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncomingEvent {
    /// Matrix event type, e.g. [`ROOM_MESSAGE`]
    pub event_type: String,
    /// User who sent the event
    pub sender_id: String,
    /// Room the event was sent to
    pub room_id: String,
    /// Origin server timestamp in milliseconds since the Unix epoch
    pub timestamp_millis: u64,
    /// Decoded content
    pub content: EventContent,
}

impl IncomingEvent {
    /// Builds a text message event.
    pub fn text(room_id: &str, sender_id: &str, timestamp_millis: u64, body: &str) -> Self {
        IncomingEvent {
            event_type: ROOM_MESSAGE.to_string(),
            sender_id: sender_id.to_string(),
            room_id: room_id.to_string(),
            timestamp_millis,
            content: EventContent::TextMessage {
                body: body.to_string(),
            },
        }
    }

    /// Body of the event if it is a text message.
    pub fn text_body(&self) -> Option<&str> {
        match &self.content {
            EventContent::TextMessage { body } => Some(body),
            EventContent::Other => None,
        }
    }
}
