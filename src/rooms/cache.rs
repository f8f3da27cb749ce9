//! In-memory per-room state.
//!
//! The [`RoomStateCache`] is the single source of truth for routing decisions:
//! whether a room gets encrypted delivery and which language its replies use.

use std::collections::HashMap;

use log::debug;
use tokio::sync::RwLock;

use crate::rooms::{DEFAULT_LANGUAGE, RoomBinding};

/// Cached state of a single room.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoomState {
    /// Whether messages to the room go through the encryption gateway.
    ///
    /// Once `true`, never reset for the lifetime of the entry.
    pub encrypted: bool,
    /// Language code chosen for the room
    pub language: String,
    /// User paired with the room, if the binding is persisted
    pub user_id: Option<String>,
}

impl RoomState {
    fn binding(&self, room_id: &str) -> Option<RoomBinding> {
        self.user_id.as_ref().map(|user_id| RoomBinding {
            room_id: room_id.to_string(),
            user_id: user_id.clone(),
            language: self.language.clone(),
            encrypted: self.encrypted,
        })
    }
}

/// Synchronized map of room ID → [`RoomState`].
///
/// Shared between the sync loop and the callers of the daemon, so every
/// operation takes the lock for the whole read-modify-write.
#[derive(Default)]
pub struct RoomStateCache {
    rooms: RwLock<HashMap<String, RoomState>>,
}

impl RoomStateCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache seeded with persisted bindings.
    ///
    /// An empty language in a binding falls back to [`DEFAULT_LANGUAGE`].
    pub fn from_bindings(bindings: &[RoomBinding]) -> Self {
        let rooms = bindings
            .iter()
            .map(|binding| {
                let language = if binding.language.is_empty() {
                    DEFAULT_LANGUAGE.to_string()
                } else {
                    binding.language.clone()
                };
                (
                    binding.room_id.clone(),
                    RoomState {
                        encrypted: binding.encrypted,
                        language,
                        user_id: Some(binding.user_id.clone()),
                    },
                )
            })
            .collect();

        RoomStateCache {
            rooms: RwLock::new(rooms),
        }
    }

    /// Returns a copy of the state of `room_id`.
    pub async fn get(&self, room_id: &str) -> Option<RoomState> {
        self.rooms.read().await.get(room_id).cloned()
    }

    /// Whether messages to `room_id` must be encrypted. Unknown rooms are plaintext.
    pub async fn is_encrypted(&self, room_id: &str) -> bool {
        self.rooms
            .read()
            .await
            .get(room_id)
            .is_some_and(|state| state.encrypted)
    }

    /// Returns the language cached for `room_id`, valid or not.
    pub async fn language(&self, room_id: &str) -> Option<String> {
        self.rooms
            .read()
            .await
            .get(room_id)
            .map(|state| state.language.clone())
    }

    /// Records a freshly created room.
    ///
    /// The encrypted flag is sticky: an existing `true` is kept.
    pub async fn insert_room(&self, room_id: &str, encrypted: bool) {
        let mut rooms = self.rooms.write().await;
        let state = rooms.entry(room_id.to_string()).or_insert_with(|| RoomState {
            encrypted,
            language: DEFAULT_LANGUAGE.to_string(),
            user_id: None,
        });
        state.encrypted |= encrypted;
        debug!("room {} cached, encrypted: {}", room_id, state.encrypted);
    }

    /// Attaches a binding to its room, creating the entry if needed.
    ///
    /// A room already in the cache keeps its language, which may have been
    /// changed with `!lang` before the pairing was confirmed. Returns the
    /// merged binding to persist.
    pub async fn link(&self, binding: &RoomBinding) -> RoomBinding {
        let mut rooms = self.rooms.write().await;
        let state = rooms
            .entry(binding.room_id.clone())
            .or_insert_with(|| RoomState {
                encrypted: binding.encrypted,
                language: if binding.language.is_empty() {
                    DEFAULT_LANGUAGE.to_string()
                } else {
                    binding.language.clone()
                },
                user_id: None,
            });
        state.encrypted |= binding.encrypted;
        state.user_id = Some(binding.user_id.clone());

        RoomBinding {
            room_id: binding.room_id.clone(),
            user_id: binding.user_id.clone(),
            language: state.language.clone(),
            encrypted: state.encrypted,
        }
    }

    /// Sets the language of `room_id`.
    ///
    /// Returns the updated binding when the room has a paired user, so the
    /// caller can persist it.
    pub async fn set_language(&self, room_id: &str, language: &str) -> Option<RoomBinding> {
        let mut rooms = self.rooms.write().await;
        let state = rooms.entry(room_id.to_string()).or_insert_with(|| RoomState {
            encrypted: false,
            language: DEFAULT_LANGUAGE.to_string(),
            user_id: None,
        });
        state.language = language.to_string();
        state.binding(room_id)
    }
}
