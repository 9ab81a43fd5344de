//! Display helpers shared by the conversation and document panels.

use chrono::{DateTime, Utc};

use crate::models::{Citation, Message, MessageRole};
use crate::render::MarkdownRenderer;

pub const EMPTY_CHAT_NOTICE: &str = "Hello! How can I help you today?";
pub const NO_MESSAGES_NOTICE: &str = "No messages yet. Start the conversation!";
pub const DELETED_NOTICE: &str = "Conversation deleted. Start a new one!";
pub const NO_CONVERSATIONS_NOTICE: &str = "No conversations yet";
pub const NO_SELECTION_TITLE: &str = "Select or create a conversation";

#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    /// Shown as a text node, never parsed as HTML.
    Text(String),
    /// Sanitized HTML.
    Html(String),
}

/// One rendered entry of the message list.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageView {
    pub role: MessageRole,
    pub class: &'static str,
    pub body: MessageBody,
}

impl MessageView {
    pub fn render(message: &Message, renderer: &MarkdownRenderer) -> Self {
        match message.role {
            MessageRole::User => Self {
                role: message.role,
                class: "message user-message",
                body: MessageBody::Text(message.text.clone()),
            },
            MessageRole::Assistant => Self {
                role: message.role,
                class: "message ai-message",
                body: MessageBody::Html(renderer.render_html(&message.text)),
            },
        }
    }

    pub fn render_all(messages: &[Message], renderer: &MarkdownRenderer) -> Vec<Self> {
        messages.iter().map(|m| Self::render(m, renderer)).collect()
    }
}

/// Short "time ago" label for the sidebar.
pub fn relative_time(timestamp: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(ts) = timestamp else {
        return String::new();
    };
    let elapsed = now.signed_duration_since(ts);
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    if minutes < 1 {
        "Just now".to_string()
    } else if minutes < 60 {
        format!("{minutes} min ago")
    } else if hours < 24 {
        format!("{hours}h ago")
    } else if days < 7 {
        format!("{days}d ago")
    } else {
        ts.format("%d/%m").to_string()
    }
}

pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut exponent = 0;
    let mut scaled = bytes;
    while scaled >= 1024 && exponent < UNITS.len() - 1 {
        scaled /= 1024;
        exponent += 1;
    }
    let value = bytes as f64 / 1024f64.powi(exponent as i32);
    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{} {}", rounded as u64, UNITS[exponent])
    } else {
        format!("{rounded:.1} {}", UNITS[exponent])
    }
}

pub fn relevance_percent(relevance: f64) -> u32 {
    (relevance.clamp(0.0, 1.0) * 100.0).round() as u32
}

/// A citation under a RAG answer. All fields are plain text.
#[derive(Debug, Clone, PartialEq)]
pub struct CitationView {
    pub source: String,
    pub content: String,
    pub relevance: Option<String>,
}

impl From<&Citation> for CitationView {
    fn from(c: &Citation) -> Self {
        Self {
            source: c
                .source
                .clone()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "Document".to_string()),
            content: c.content.clone().unwrap_or_default(),
            relevance: c
                .relevance
                .filter(|r| *r > 0.0)
                .map(|r| format!("Relevance: {}%", relevance_percent(r))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn user_text_is_never_parsed() {
        let renderer = MarkdownRenderer::new();
        let view = MessageView::render(&Message::user("<b>**hi**</b>"), &renderer);
        assert_eq!(view.class, "message user-message");
        assert_eq!(view.body, MessageBody::Text("<b>**hi**</b>".into()));
    }

    #[test]
    fn assistant_text_is_formatted_and_sanitized() {
        let renderer = MarkdownRenderer::new();
        let view = MessageView::render(
            &Message::assistant("**hi** <img src=x onerror=alert(1)>"),
            &renderer,
        );
        let MessageBody::Html(html) = view.body else {
            panic!("assistant messages render as html");
        };
        assert!(html.contains("<strong>hi</strong>"));
        assert!(!html.contains("onerror"));
    }

    #[test]
    fn relative_time_buckets() {
        let now = Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap();
        let ago = |d: Duration| relative_time(Some(now - d), now);

        assert_eq!(ago(Duration::seconds(30)), "Just now");
        assert_eq!(ago(Duration::minutes(5)), "5 min ago");
        assert_eq!(ago(Duration::hours(3)), "3h ago");
        assert_eq!(ago(Duration::days(2)), "2d ago");
        assert_eq!(ago(Duration::days(10)), "10/05");
        assert_eq!(relative_time(None, now), "");
    }

    #[test]
    fn file_sizes() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5 MB");
    }

    #[test]
    fn citation_defaults() {
        let view = CitationView::from(&Citation {
            source: None,
            content: Some("text".into()),
            page: None,
            relevance: Some(0.876),
        });
        assert_eq!(view.source, "Document");
        assert_eq!(view.relevance.as_deref(), Some("Relevance: 88%"));
    }
}
