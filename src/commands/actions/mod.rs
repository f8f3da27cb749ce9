//! Command handlers.
//!
//! - [`handle_lang`] - List or switch the room language

mod lang;

pub use crate::commands::actions::lang::handle_lang;
