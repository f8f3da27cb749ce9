//! Persistence of room bindings.
//!
//! The daemon only needs two operations from storage: load every binding once
//! at startup, and save one binding after it changes. [`JsonBindingStore`]
//! keeps them in a single JSON file keyed by room ID.

use std::collections::BTreeMap;

use anyhow::Context;
use async_trait::async_trait;
use log::{debug, info, warn};
use mockall::automock;
use tokio::{fs, sync::Mutex};

use crate::rooms::RoomBinding;

/// Storage seam for [`RoomBinding`]s.
#[automock]
#[async_trait]
pub trait BindingStore: Send + Sync {
    /// Loads every persisted binding.
    async fn load_bindings(&self) -> anyhow::Result<Vec<RoomBinding>>;
    /// Inserts or replaces the binding of `binding.room_id`.
    async fn save_binding(&self, binding: &RoomBinding) -> anyhow::Result<()>;
}

/// Bindings persisted as a JSON object of room ID → binding.
pub struct JsonBindingStore {
    /// Path of the JSON file
    path: String,
    /// Serializes read-modify-write cycles on the file
    write_lock: Mutex<()>,
}

impl JsonBindingStore {
    /// Creates a store backed by the file at `path`. The file is created on first save.
    pub fn new(path: &str) -> Self {
        JsonBindingStore {
            path: path.to_string(),
            write_lock: Mutex::new(()),
        }
    }

    async fn read_map(&self) -> anyhow::Result<BTreeMap<String, RoomBinding>> {
        let serialized = match fs::read_to_string(&self.path).await {
            Ok(serialized) => serialized,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(BTreeMap::new());
            }
            Err(e) => return Err(e).with_context(|| format!("failed to read {}", self.path)),
        };

        serde_json::from_str(&serialized)
            .with_context(|| format!("failed to deserialize bindings from {}", self.path))
    }
}

#[async_trait]
impl BindingStore for JsonBindingStore {
    async fn load_bindings(&self) -> anyhow::Result<Vec<RoomBinding>> {
        let map = self.read_map().await?;
        if map.is_empty() {
            warn!("no persisted bindings found in {}", self.path);
        } else {
            info!("loaded {} persisted bindings", map.len());
        }

        Ok(map.into_values().collect())
    }

    async fn save_binding(&self, binding: &RoomBinding) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut map = self.read_map().await?;
        map.insert(binding.room_id.clone(), binding.clone());

        let serialized = serde_json::to_string_pretty(&map)?;
        fs::write(&self.path, serialized)
            .await
            .with_context(|| format!("failed to write {}", self.path))?;

        debug!("binding for room {} persisted", binding.room_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn path_in(dir: &TempDir) -> String {
        dir.path().join("bindings.json").to_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_load_missing_file_returns_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonBindingStore::new(&path_in(&dir));

        assert!(store.load_bindings().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = JsonBindingStore::new(&path_in(&dir));
        let binding = RoomBinding::new("!room:example.com", "@alice:example.com", true);

        store.save_binding(&binding).await.unwrap();

        assert_eq!(store.load_bindings().await.unwrap(), vec![binding]);
    }

    #[tokio::test]
    async fn test_save_replaces_binding_of_same_room() {
        let dir = TempDir::new().unwrap();
        let store = JsonBindingStore::new(&path_in(&dir));
        let mut binding = RoomBinding::new("!room:example.com", "@alice:example.com", false);
        store.save_binding(&binding).await.unwrap();
        store
            .save_binding(&RoomBinding::new("!other:example.com", "@bob:example.com", false))
            .await
            .unwrap();

        binding.language = "fr".to_string();
        store.save_binding(&binding).await.unwrap();

        let loaded = store.load_bindings().await.unwrap();
        assert_eq!(loaded.len(), 2);
        let room = loaded
            .iter()
            .find(|b| b.room_id == "!room:example.com")
            .unwrap();
        assert_eq!(room.language, "fr");
    }

    #[tokio::test]
    async fn test_load_corrupted_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = path_in(&dir);
        fs::write(&path, "{ not json").await.unwrap();

        let store = JsonBindingStore::new(&path);

        assert!(store.load_bindings().await.is_err());
    }
}
