//! `!lang` command handler.
//!
//! Without exactly one argument the handler lists the languages; with a
//! recognized code it requests a language switch. An unknown code is ignored
//! without any reply.

use log::debug;

use crate::commands::{CommandContext, CommandResult, LANG_COMMAND};

/// Formats the language listing: a usage line then `code: name` per language.
fn format_languages(context: &CommandContext) -> String {
    let mut list = format!("{} <lang>\n", LANG_COMMAND);
    for (code, name) in context.catalog.list_codes() {
        list.push_str(&format!("{}: {}\n", code, name));
    }
    list
}

/// Handles `!lang` with its arguments.
pub fn handle_lang(context: &CommandContext, args: &[String]) -> CommandResult {
    let [code] = args else {
        debug!("listing languages for {}", context.room_id);
        return CommandResult {
            reply: Some(format_languages(context)),
            language: None,
        };
    };

    if !context.catalog.is_valid(code) {
        debug!("ignoring unknown language {} in {}", code, context.room_id);
        return CommandResult::default();
    }

    debug!(
        "switching {} from {} to {}",
        context.room_id, context.language, code
    );
    CommandResult {
        reply: None,
        language: Some(code.clone()),
    }
}
