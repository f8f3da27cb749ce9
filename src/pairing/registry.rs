use std::collections::HashMap;

use log::debug;
use rand::{Rng, SeedableRng, rngs::StdRng};
use tokio::sync::Mutex;

use crate::{pairing::generate_pin, rooms::RoomBinding};

/// A pairing waiting for the user to confirm the PIN.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingToken {
    /// PIN sent to the room
    pub pin: String,
    /// Set by the external verification step, never by the daemon
    pub verified: bool,
    /// Binding to persist once the pairing is confirmed
    pub binding: RoomBinding,
}

/// Synchronized map of PIN → [`PendingToken`].
///
/// PINs are unique among pending tokens: generation happens under the lock
/// and is retried until the PIN is free.
#[derive(Default)]
pub struct PairingRegistry {
    tokens: Mutex<HashMap<String, PendingToken>>,
}

impl PairingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a PIN for `binding` and stores an unverified token.
    pub async fn issue(&self, binding: RoomBinding) -> PendingToken {
        self.issue_with(&mut StdRng::from_entropy(), binding).await
    }

    /// Same as [`PairingRegistry::issue`] with a caller-provided random source.
    pub async fn issue_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        binding: RoomBinding,
    ) -> PendingToken {
        let mut tokens = self.tokens.lock().await;

        let mut pin = generate_pin(rng);
        while tokens.contains_key(&pin) {
            debug!("pin collision, generating another one");
            pin = generate_pin(rng);
        }

        let token = PendingToken {
            pin: pin.clone(),
            verified: false,
            binding,
        };
        tokens.insert(pin, token.clone());
        token
    }

    /// Returns a copy of the token issued with `pin`.
    pub async fn get(&self, pin: &str) -> Option<PendingToken> {
        self.tokens.lock().await.get(pin).cloned()
    }

    /// Number of pending tokens.
    pub async fn len(&self) -> usize {
        self.tokens.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tokens.lock().await.is_empty()
    }
}
