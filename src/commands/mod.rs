//! Room commands typed by paired users.
//!
//! # Flow
//!
//! ```text
//! IncomingEvent → Dispatcher (filters) → Command::parse → handler → CommandResult → apply
//! ```
//!
//! Handlers never touch shared state. They return a [`CommandResult`]
//! describing the reply to send and the state change to make, and the
//! [`Dispatcher`] applies it.
//!
//! # Commands
//!
//! | Command | Arguments | Effect |
//! |---------|-----------|--------|
//! | `!lang` | none | Lists the recognized languages |
//! | `!lang` | `<code>` | Switches the room language, ignored if `code` is unknown |

mod actions;
mod command;
mod dispatcher;

pub use crate::commands::{
    command::{Command, LANG_COMMAND},
    dispatcher::Dispatcher,
};

use crate::lang::Catalog;

/// What a handler needs to know about the event it answers.
pub struct CommandContext<'a> {
    /// Room the command was sent in
    pub room_id: &'a str,
    /// Language of the room, always a recognized code
    pub language: &'a str,
    /// Recognized languages
    pub catalog: &'a Catalog,
}

/// Outcome of a command handler.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CommandResult {
    /// Unformatted text to send back to the room
    pub reply: Option<String>,
    /// New language of the room
    pub language: Option<String>,
}
