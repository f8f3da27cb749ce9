//! Matrix integration.
//!
//! The core of the daemon only talks to Matrix through two capabilities:
//!
//! - [`Transport`] - room creation, plaintext delivery and the event stream
//! - [`EncryptionGateway`] - encryption negotiation and encrypted delivery
//!
//! [`MatrixClient`] implements both on top of `matrix-sdk`. It owns the login
//! (see the encryption submodule), the persisted session (session submodule)
//! and the long-poll loop translating SDK events into [`IncomingEvent`]s
//! (sync submodule).

mod client;
mod encryption;
mod event;
mod session;
mod sync;
mod transport;

pub use crate::matrix::{
    client::MatrixClient,
    event::{EventContent, IncomingEvent, ROOM_MESSAGE},
    transport::{EncryptionGateway, Transport},
};

#[cfg(test)]
pub use crate::matrix::transport::{MockEncryptionGateway, MockTransport};

/// User credentials for a Matrix account
#[derive(Debug, Clone)]
pub struct UserCredentials {
    /// User ID of the matrix account
    pub user_id: String,
    /// Password of the matrix account
    pub password: String,
    /// Passphrase protecting the crypto store and the recovery secrets
    pub passphrase: String,
}
