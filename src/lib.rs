//! Client core of the chatbot web UI: conversation and document stores over
//! the backend API, streamed answers rendered as sanitized Markdown, and the
//! prompt input state machine. The `frontend` crate wires these to Leptos.

pub mod api;
pub mod config;
pub mod errors;
pub mod input;
pub mod models;
pub mod render;
pub mod service;
pub mod stream;
pub mod view;

pub use api::{ChatApi, RagApi, UploadSource};
pub use config::{ClientConfig, Endpoints, UnsafeContentPolicy};
pub use errors::{ClientError, Result};
pub use input::{InputController, InputState, KeyAction, SubmitRejection};
pub use render::MarkdownRenderer;
pub use service::chat_controller::{ChatController, SendError};
pub use service::chat_service::{ConversationStore, DeleteOutcome};
pub use service::document_service::{DocumentEntry, DocumentLibrary, EntryKey, RagReply};
pub use stream::{
    AnswerSlot, AnswerStream, Delivery, SessionId, SessionOutcome, StreamConnection, StreamEvent,
    StreamReport, StreamRequest, StreamTransport,
};
