//! Persisted user-room binding.

use serde::{Deserialize, Serialize};

/// Language code used when a room has no valid language set.
pub const DEFAULT_LANGUAGE: &str = "en-us";

/// One paired user-room relationship.
///
/// Created when a pairing starts, updated by the `!lang` command and persisted
/// by a [`BindingStore`](crate::rooms::BindingStore). Loaded once at startup to
/// seed the [`RoomStateCache`](crate::rooms::RoomStateCache).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomBinding {
    /// Matrix room ID of the direct room
    pub room_id: String,
    /// Matrix user ID invited to the room
    pub user_id: String,
    /// Language code used for messages sent to this room
    #[serde(default = "default_language")]
    pub language: String,
    /// Whether encryption was enabled when the room was created
    #[serde(default)]
    pub encrypted: bool,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

impl RoomBinding {
    /// Creates a binding with the default language.
    pub fn new(room_id: &str, user_id: &str, encrypted: bool) -> Self {
        RoomBinding {
            room_id: room_id.to_string(),
            user_id: user_id.to_string(),
            language: default_language(),
            encrypted,
        }
    }
}
