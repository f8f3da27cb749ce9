//! roomlink - a Matrix daemon pairing accounts with direct rooms.
//!
//! The daemon creates a direct room with a Matrix user, posts a one-time PIN
//! in it and keeps a pending token until an external account system confirms
//! the pairing. Once paired, notifications are pushed to the room, encrypted
//! whenever the room supports it. Users can switch the room language with
//! `!lang`.
//!
//! # Modules
//!
//! - [`daemon`] - composition root and public operations
//! - [`matrix`] - transport and encryption capabilities backed by `matrix-sdk`
//! - [`sync_loop`] - event loop between the transport and the commands
//! - [`commands`] - room command parsing and dispatch
//! - [`messages`] - rendering and encrypted/plaintext routing of messages
//! - [`pairing`] - PIN generation and pending tokens
//! - [`rooms`] - room bindings, their cache and their persistence
//! - [`lang`] - language catalog
//! - [`config`] - YAML configuration with environment overrides

pub mod commands;
pub mod config;
pub mod daemon;
pub mod lang;
pub mod matrix;
pub mod messages;
pub mod pairing;
pub mod rooms;
pub mod sync_loop;
