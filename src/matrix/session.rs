//! On-disk Matrix session.
//!
//! The session directory holds two things:
//!
//! - `session`: JSON file with the login session and the last sync token
//! - `sqlite`: the SDK state and crypto store, encrypted with the passphrase

use std::path::{Path, PathBuf};

use anyhow::Context;
use log::{debug, trace};
use matrix_sdk::authentication::matrix;
use serde::{Deserialize, Serialize};
use tokio::fs;

/// Content of the `session` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSession {
    user_session: matrix::MatrixSession,
    #[serde(skip_serializing_if = "Option::is_none")]
    sync_token: Option<String>,
}

/// Persisted login session of the bot account.
#[derive(Clone)]
pub struct SessionFile {
    /// Session loaded at startup, if any
    stored: Option<StoredSession>,
    /// `<dir>/sqlite`
    sqlite_path: PathBuf,
    /// `<dir>/session`
    session_path: PathBuf,
}

impl SessionFile {
    /// Opens the session directory at `dir_path`, creating it if needed.
    ///
    /// A missing or unreadable session file is not an error: the client will
    /// log in again and overwrite it.
    pub async fn open(dir_path: &str) -> anyhow::Result<Self> {
        fs::create_dir_all(dir_path)
            .await
            .with_context(|| format!("failed to create session directory {}", dir_path))?;

        let dir = Path::new(dir_path);
        let session_path = dir.join("session");
        let stored = match fs::read_to_string(&session_path).await {
            Ok(serialized) => serde_json::from_str(&serialized).ok(),
            Err(_) => None,
        };
        debug!("session found in {}: {}", dir_path, stored.is_some());

        Ok(SessionFile {
            stored,
            sqlite_path: dir.join("sqlite"),
            session_path,
        })
    }

    /// Whether a login session was found on disk.
    pub fn has_session(&self) -> bool {
        self.stored.is_some()
    }

    /// Path of the SDK SQLite store.
    pub fn sqlite_path(&self) -> &Path {
        &self.sqlite_path
    }

    /// The persisted login session.
    pub fn user_session(&self) -> Option<&matrix::MatrixSession> {
        self.stored.as_ref().map(|s| &s.user_session)
    }

    /// The last persisted sync token.
    pub fn sync_token(&self) -> Option<String> {
        self.stored.as_ref().and_then(|s| s.sync_token.clone())
    }

    /// Writes a fresh login session, dropping any previous sync token.
    pub async fn persist_user_session(
        &mut self,
        user_session: &matrix::MatrixSession,
    ) -> anyhow::Result<()> {
        let stored = StoredSession {
            user_session: user_session.clone(),
            sync_token: None,
        };
        fs::write(&self.session_path, serde_json::to_string(&stored)?).await?;
        self.stored = Some(stored);

        trace!("user session persisted");
        Ok(())
    }

    /// Updates the sync token stored next to the login session.
    pub async fn persist_sync_token(&self, sync_token: &str) -> anyhow::Result<()> {
        let serialized = fs::read_to_string(&self.session_path).await?;
        let mut stored: StoredSession = serde_json::from_str(&serialized)?;
        stored.sync_token = Some(sync_token.to_string());
        fs::write(&self.session_path, serde_json::to_string(&stored)?).await?;

        trace!("sync token {} persisted", sync_token);
        Ok(())
    }
}
