//! Markdown formatting and HTML sanitizing for assistant answers.

pub mod markdown;
pub mod sanitize;

pub use sanitize::{Removal, Sanitizer};

/// Result of formatting and sanitizing one piece of text.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutput {
    /// Sanitized HTML, safe to inject as-is.
    pub html: String,
    /// What the sanitizer had to strip; empty for safe input.
    pub removed: Vec<Removal>,
}

impl RenderOutput {
    pub fn is_clean(&self) -> bool {
        self.removed.is_empty()
    }
}

/// `sanitize(format(text))`, recomputed from scratch on every call.
#[derive(Default)]
pub struct MarkdownRenderer {
    sanitizer: Sanitizer,
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self { sanitizer: Sanitizer::new() }
    }

    pub fn render(&self, text: &str) -> RenderOutput {
        let formatted = markdown::to_html(markdown::events(text));
        let removed = self.sanitizer.inspect(&formatted);
        let html = self.sanitizer.clean(&formatted);
        RenderOutput { html, removed }
    }

    /// Sanitized HTML regardless of what had to be removed. Used for stored
    /// history, which is rendered once and never streamed.
    pub fn render_html(&self, text: &str) -> String {
        self.render(text).html
    }
}
