use pulldown_cmark::{html, Event, Options, Parser};

/// GFM-flavoured options: tables, strikethrough and task lists.
fn options() -> Options {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_TABLES);
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    opts.insert(Options::ENABLE_TASKLISTS);
    opts
}

/// Parses `text` into Markdown events. Single newlines become hard breaks so
/// streamed answers keep the line layout the model produced.
pub fn events(text: &str) -> Vec<Event<'_>> {
    Parser::new_ext(text, options())
        .map(|event| match event {
            Event::SoftBreak => Event::HardBreak,
            other => other,
        })
        .collect()
}

/// Renders events to unsanitized HTML.
pub fn to_html<'a>(events: impl IntoIterator<Item = Event<'a>>) -> String {
    let mut out = String::new();
    html::push_html(&mut out, events.into_iter());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(text: &str) -> String {
        to_html(events(text))
    }

    #[test]
    fn emphasis_and_code() {
        assert_eq!(
            format("Hello **world** and `code`"),
            "<p>Hello <strong>world</strong> and <code>code</code></p>\n"
        );
    }

    #[test]
    fn single_newlines_are_line_breaks() {
        assert_eq!(format("one\ntwo"), "<p>one<br />\ntwo</p>\n");
    }

    #[test]
    fn unterminated_fence_renders_as_open_code_block() {
        let html = format("```rust\nfn main() {");
        assert!(html.starts_with("<pre><code class=\"language-rust\">"));
        assert!(html.contains("fn main() {"));
    }

    #[test]
    fn lists_and_strikethrough() {
        let html = format("- a\n- ~~b~~");
        assert!(html.contains("<ul>"));
        assert!(html.contains("<del>b</del>"));
    }
}
