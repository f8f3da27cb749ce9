/// A notification sent by the account system.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Message {
    /// Plain text version, always sent as the body
    pub text: String,
    /// Optional Markdown source rendered to the formatted body
    pub markdown: Option<String>,
}

impl Message {
    pub fn text(text: &str) -> Self {
        Message {
            text: text.to_string(),
            markdown: None,
        }
    }

    pub fn markdown(text: &str, markdown: &str) -> Self {
        Message {
            text: text.to_string(),
            markdown: Some(markdown.to_string()),
        }
    }
}

/// Rendered message as handed to the transport.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageContent {
    /// Plain text body
    pub body: String,
    /// HTML body, if any
    pub formatted_body: Option<String>,
}

impl MessageContent {
    /// Content without formatting.
    pub fn plain(body: &str) -> Self {
        MessageContent {
            body: body.to_string(),
            formatted_body: None,
        }
    }
}
