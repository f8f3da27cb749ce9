//! One-time PIN pairing between external accounts and direct rooms.
//!
//! When a pairing starts, the daemon creates a direct room, issues a PIN and
//! posts it in that room. The user proves room ownership by typing the PIN
//! back into the account system, which looks it up with
//! [`PairingRegistry::get`].
//!
//! # Token lifecycle
//!
//! Tokens are issued unverified and stay in the registry: the daemon never
//! marks them verified nor removes them. Verification, and consuming the token
//! if desired, belong to the external account-linking step.

mod pin;
mod registry;

pub use crate::pairing::{
    pin::{PIN_ALPHABET, PIN_LENGTH, generate_pin},
    registry::{PairingRegistry, PendingToken},
};
