//! Localized strings for the messages the bot sends.
//!
//! The [`Catalog`] ships with built-in languages and can be extended or
//! overridden by a YAML file:
//!
//! ```yaml
//! de:
//!   name: Deutsch
//!   strings:
//!     start_message: "Hallo! Gib diese PIN ein, um dein Konto zu verknüpfen:"
//!     language_message: "Sende {command} gefolgt von einem Sprachcode, um die Sprache zu ändern."
//! ```
//!
//! Templates use `{name}` placeholders, see [`Catalog::template`].

mod catalog;

pub use crate::lang::catalog::{Catalog, LANGUAGE_MESSAGE, Language, START_MESSAGE};
