//! Paired rooms and their per-room state.
//!
//! A room becomes known to the daemon in two ways:
//!
//! - at startup, from the bindings persisted by a [`BindingStore`]
//! - when a pairing starts, right after the direct room is created
//!
//! # Components
//!
//! - [`RoomBinding`] - One paired user-room relationship, as persisted
//! - [`RoomStateCache`] - Synchronized room → [`RoomState`] map consulted by routing
//!   and command handling
//! - [`BindingStore`] - Persistence seam for bindings, with a JSON file
//!   implementation in [`JsonBindingStore`]

mod binding;
mod cache;
mod store;

pub use crate::rooms::{
    binding::{DEFAULT_LANGUAGE, RoomBinding},
    cache::{RoomState, RoomStateCache},
    store::{BindingStore, JsonBindingStore},
};

#[cfg(test)]
pub use crate::rooms::store::MockBindingStore;
