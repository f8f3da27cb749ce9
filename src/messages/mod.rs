//! Outbound messages: what callers send, how it is rendered and where it goes.
//!
//! ```text
//! Message ──render()──▶ MessageContent ──MessageRouter──┬──▶ EncryptionGateway (encrypted room)
//!                                                       └──▶ Transport        (plaintext room)
//! ```

mod content;
mod markdown;
mod router;

pub use crate::messages::{
    content::{Message, MessageContent},
    markdown::{render_markdown, strip_images},
    router::MessageRouter,
};
