//! Configuration file structures for the roomlink daemon.
//!
//! The configuration is a YAML file. Any value can be overridden by an
//! environment variable prefixed with `ROOMLINK_`, nested keys being separated
//! by `__` (e.g. `ROOMLINK_MATRIX__PASSWORD`).
//!
//! ```yaml
//! matrix:
//!   # Fully qualified Matrix user ID of the bot account
//!   user_id: "@roomlink:matrix.org"
//!   password: "secret-password"
//!   # Protects the crypto store and the recovery secrets
//!   passphrase: "recovery-passphrase"
//!   # Topic of the rooms created for pairing
//!   topic: "Notifications"
//!
//! # Optional YAML file with extra or overridden languages
//! languages: "languages.yaml"
//! ```

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::Deserialize;

use crate::matrix::UserCredentials;

/// Prefix of the environment variables overriding the file.
const ENV_PREFIX: &str = "ROOMLINK_";

/// Root configuration structure.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Matrix account configuration
    pub matrix: Matrix,
    /// Path of the language catalog, merged over the built-in languages
    #[serde(default)]
    pub languages: Option<String>,
}

/// Matrix account configuration.
#[derive(Debug, Deserialize)]
pub struct Matrix {
    /// Fully qualified Matrix user ID, e.g. `@roomlink:matrix.org`.
    pub user_id: String,

    /// Matrix account password.
    ///
    /// Used for the first login only. The session is persisted in the data
    /// directory and restored on the next starts.
    pub password: String,

    /// E2EE recovery passphrase.
    pub passphrase: String,

    /// Topic of the direct rooms created for pairing. Empty means no topic.
    #[serde(default)]
    pub topic: String,
}

impl Config {
    /// Loads the YAML file at `path`, then applies the environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or a required value is missing.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let config = Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        Ok(config)
    }

    /// Credentials of the bot account.
    pub fn credentials(&self) -> UserCredentials {
        UserCredentials {
            user_id: self.matrix.user_id.clone(),
            password: self.matrix.password.clone(),
            passphrase: self.matrix.passphrase.clone(),
        }
    }
}
