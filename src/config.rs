use serde::Deserialize;

use crate::errors::{ClientError, Result};

const DEFAULT_API_BASE: &str = "http://localhost:8080/api/chat";
const DEFAULT_RAG_BASE: &str = "/api/rag";
const DEFAULT_TOP_K: u32 = 5;
const DEFAULT_INPUT_MAX_HEIGHT: u32 = 120;
const DEFAULT_DOCUMENT_REFRESH_MS: u32 = 5_000;

/// What a stream session does when the accumulated answer contains markup the
/// sanitizer would strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnsafeContentPolicy {
    /// Skip the render, drop the unsafe text from the rendered window and keep
    /// accumulating.
    #[default]
    Discard,
    /// Close the session with an inline error.
    Abort,
}

impl std::str::FromStr for UnsafeContentPolicy {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "discard" => Ok(UnsafeContentPolicy::Discard),
            "abort" => Ok(UnsafeContentPolicy::Abort),
            other => Err(ClientError::invalid_config("CHAT_UNSAFE_CONTENT", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
    pub api_base: String,
    pub rag_base: String,
    pub top_k: u32,
    pub unsafe_content: UnsafeContentPolicy,
    /// Cap for the auto-growing prompt box in pixels; 0 disables the cap.
    pub input_max_height: u32,
    pub document_refresh_ms: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            rag_base: DEFAULT_RAG_BASE.to_string(),
            top_k: DEFAULT_TOP_K,
            unsafe_content: UnsafeContentPolicy::default(),
            input_max_height: DEFAULT_INPUT_MAX_HEIGHT,
            document_refresh_ms: DEFAULT_DOCUMENT_REFRESH_MS,
        }
    }
}

impl ClientConfig {
    /// Builds a config from environment-style keys, falling back to defaults
    /// for missing or blank values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(v) = get("CHAT_API_BASE") {
            config.api_base = v;
        }
        if let Some(v) = get("RAG_API_BASE") {
            config.rag_base = v;
        }
        if let Some(v) = get("RAG_TOP_K") {
            config.top_k = parse_number("RAG_TOP_K", &v)?;
        }
        if let Some(v) = get("CHAT_UNSAFE_CONTENT") {
            config.unsafe_content = v.parse()?;
        }
        if let Some(v) = get("CHAT_INPUT_MAX_HEIGHT") {
            config.input_max_height = parse_number("CHAT_INPUT_MAX_HEIGHT", &v)?;
        }
        if let Some(v) = get("RAG_REFRESH_MS") {
            config.document_refresh_ms = parse_number("RAG_REFRESH_MS", &v)?;
        }

        config.validated()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ClientError::decode(format!("config: {e}")))?;
        config.validated()
    }

    fn validated(mut self) -> Result<Self> {
        self.api_base = self.api_base.trim().trim_end_matches('/').to_string();
        self.rag_base = self.rag_base.trim().trim_end_matches('/').to_string();
        if self.api_base.is_empty() {
            return Err(ClientError::invalid_config("CHAT_API_BASE", ""));
        }
        if self.top_k == 0 {
            return Err(ClientError::invalid_config("RAG_TOP_K", "0"));
        }
        Ok(self)
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            api_base: self.api_base.clone(),
            rag_base: self.rag_base.clone(),
        }
    }

    pub fn input_height_cap(&self) -> Option<u32> {
        (self.input_max_height > 0).then_some(self.input_max_height)
    }
}

fn parse_number(key: &str, value: &str) -> Result<u32> {
    value
        .trim()
        .parse()
        .map_err(|_| ClientError::invalid_config(key, value))
}

/// URL builder for every backend route the client calls.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoints {
    api_base: String,
    rag_base: String,
}

impl Endpoints {
    pub fn conversations(&self) -> String {
        format!("{}/conversations", self.api_base)
    }

    pub fn generate_chat_id(&self) -> String {
        format!("{}/generate-chat-id", self.api_base)
    }

    /// Used for both `GET` (load) and `DELETE` (remove).
    pub fn messages(&self, chat_id: &str) -> String {
        format!("{}/{}/messages", self.api_base, urlencoding::encode(chat_id))
    }

    pub fn stream(&self, chat_id: &str, question: &str) -> String {
        format!(
            "{}/stream?chatId={}&question={}",
            self.api_base,
            urlencoding::encode(chat_id),
            urlencoding::encode(question)
        )
    }

    pub fn documents(&self) -> String {
        format!("{}/documents", self.rag_base)
    }

    pub fn upload_document(&self) -> String {
        format!("{}/documents/upload", self.rag_base)
    }

    pub fn document(&self, id: i64) -> String {
        format!("{}/documents/{id}", self.rag_base)
    }

    pub fn query(&self) -> String {
        format!("{}/query", self.rag_base)
    }
}
