//! Markdown to HTML rendering for formatted bodies.

use matrix_sdk::ruma::events::room::message::FormattedBody;

/// Turns image embeds into plain links.
///
/// Clients tend to fetch or mangle images embedded in bot messages, so
/// `![alt](url)` becomes `[alt](url)`.
pub fn strip_images(markdown: &str) -> String {
    markdown.replace("![", "[")
}

/// Renders CommonMark to HTML.
///
/// Returns `None` when the source has no formatting, in which case the plain
/// body is enough.
pub fn render_markdown(source: &str) -> Option<String> {
    FormattedBody::markdown(source).map(|formatted| formatted.body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_images() {
        assert_eq!(
            strip_images("see ![logo](https://example.com/logo.png) and ![x](y)"),
            "see [logo](https://example.com/logo.png) and [x](y)"
        );
    }

    #[test]
    fn test_strip_images_keeps_plain_links() {
        assert_eq!(strip_images("[link](url)!"), "[link](url)!");
    }

    #[test]
    fn test_render_markdown_formats() {
        let html = render_markdown("**bold** text").unwrap();

        assert!(html.contains("<strong>bold</strong>"));
    }

    #[test]
    fn test_render_markdown_plain_text_is_none() {
        assert!(render_markdown("just text").is_none());
    }
}
