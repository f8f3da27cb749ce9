use log::debug;

/// Keyword of the language command.
pub const LANG_COMMAND: &str = "!lang";

/// A recognized room command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// `!lang` followed by its arguments
    Lang(Vec<String>),
}

impl Command {
    /// Parses a message body.
    ///
    /// The body is split on whitespace and the first token selects the
    /// command. Returns `None` for anything that is not a known command.
    pub fn parse(body: &str) -> Option<Self> {
        let mut tokens = body.split_whitespace();
        let command = match tokens.next()? {
            LANG_COMMAND => Command::Lang(tokens.map(str::to_string).collect()),
            _ => return None,
        };

        debug!("parsed command {:?}", command);
        Some(command)
    }
}
