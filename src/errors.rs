use thiserror::Error;

/// Top-level client error.
/// All variants carry enough context for a short user-facing notice.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    // ── Transport errors ─────────────────────────────────────────────────────
    #[error("Network error: {message}")]
    Transport { message: String },

    #[error("Could not open answer stream: {message}")]
    Stream { message: String },

    // ── Server errors ────────────────────────────────────────────────────────
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Parse error: {message}")]
    Decode { message: String },

    // ── Streaming answer errors ──────────────────────────────────────────────
    #[error("The answer contained unsafe markup and was discarded")]
    UnsafeContent,

    #[error("The server closed the stream without an answer")]
    EmptyResponse,

    // ── Configuration errors ─────────────────────────────────────────────────
    #[error("Invalid value '{value}' for configuration key '{key}'")]
    InvalidConfig { key: String, value: String },
}

impl ClientError {
    pub fn transport(message: impl Into<String>) -> Self {
        ClientError::Transport { message: message.into() }
    }

    pub fn server(status: u16, message: impl Into<String>) -> Self {
        ClientError::Server { status, message: message.into() }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        ClientError::Decode { message: message.into() }
    }

    pub fn invalid_config(key: impl Into<String>, value: impl Into<String>) -> Self {
        ClientError::InvalidConfig { key: key.into(), value: value.into() }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport { .. } | ClientError::Stream { .. })
    }

    pub fn is_server(&self) -> bool {
        matches!(self, ClientError::Server { .. } | ClientError::Decode { .. })
    }

    /// Short notice shown in an alert or inline banner.
    pub fn user_message(&self) -> &'static str {
        match self {
            ClientError::Transport { .. } | ClientError::Stream { .. } => {
                "Connection error. Please try again."
            }
            ClientError::Server { .. } | ClientError::Decode { .. } => {
                "The server could not complete the request."
            }
            ClientError::UnsafeContent => "The answer was blocked because it contained unsafe content.",
            ClientError::EmptyResponse => "No answer was received. Please try again.",
            ClientError::InvalidConfig { .. } => "The client is misconfigured.",
        }
    }
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;
