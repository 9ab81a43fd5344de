use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One entry of `GET /conversations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub conversation_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub first_message_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub last_message_time: Option<DateTime<Utc>>,
}

impl ConversationSummary {
    pub fn new(conversation_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            title: title.into(),
            first_message_time: None,
            last_message_time: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for MessageRole {
    type Error = String;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "user" => Ok(MessageRole::User),
            "assistant" | "ai" => Ok(MessageRole::Assistant),
            other => Err(format!("Unknown role: {other}")),
        }
    }
}

impl From<MessageRole> for String {
    fn from(role: MessageRole) -> Self {
        role.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    #[serde(alias = "content")]
    pub text: String,
}

impl Message {
    pub fn new(role: MessageRole, text: impl Into<String>) -> Self {
        Self { role, text: text.into() }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, text)
    }
}

/// Decodes a `GET /{chatId}/messages` body, skipping entries whose role the
/// client does not display (system prompts, tool calls).
pub fn decode_messages(body: &str) -> serde_json::Result<Vec<Message>> {
    #[derive(Deserialize)]
    struct RawMessage {
        role: String,
        #[serde(alias = "content", default)]
        text: String,
    }

    let raw: Vec<RawMessage> = serde_json::from_str(body)?;
    Ok(raw
        .into_iter()
        .filter_map(|m| {
            MessageRole::try_from(m.role)
                .ok()
                .map(|role| Message::new(role, m.text))
        })
        .collect())
}

/// Payload of one server-sent stream event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub value: String,
}

// ── RAG documents ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentStatus {
    Processing,
    Completed,
    Failed,
    Error,
    #[serde(other)]
    Unknown,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Processing => "PROCESSING",
            DocumentStatus::Completed => "COMPLETED",
            DocumentStatus::Failed => "FAILED",
            DocumentStatus::Error => "ERROR",
            DocumentStatus::Unknown => "UNKNOWN",
        }
    }

    /// CSS modifier, e.g. `status-processing`.
    pub fn css_class(&self) -> String {
        format!("status-{}", self.as_str().to_lowercase())
    }
}

/// A document as reported by `GET /documents` or the upload endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    #[serde(alias = "documentId", default)]
    pub id: i64,
    #[serde(default)]
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    pub status: DocumentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(alias = "message", default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl DocumentRecord {
    /// Placeholder shown while an upload is in flight.
    pub fn pending(filename: impl Into<String>, file_size: u64, content_type: Option<String>) -> Self {
        Self {
            id: 0,
            filename: filename.into(),
            content_type,
            file_size: Some(file_size),
            status: DocumentStatus::Processing,
            uploaded_at: None,
            processed_at: None,
            chunk_count: None,
            summary: None,
            error_message: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RagQueryRequest {
    pub question: String,
    pub top_k: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub relevance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagQueryResponse {
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

// ── Timestamps ────────────────────────────────────────────────────────────────

/// Accepts epoch milliseconds, RFC 3339 strings, or zone-less ISO date-times
/// (read as UTC). Anything else becomes `None`.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_timestamp))
}

pub(crate) fn parse_timestamp(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                s.parse::<NaiveDateTime>()
                    .ok()
                    .map(|naive| naive.and_utc())
            }),
        _ => None,
    }
}
