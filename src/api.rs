//! Backend seams. The frontend implements these over `gloo-net`; tests use
//! in-memory fakes.
//!
//! Futures are not required to be `Send`: the client runs on the browser's
//! single-threaded event loop.
#![allow(async_fn_in_trait)]

use crate::errors::Result;
use crate::models::{ConversationSummary, DocumentRecord, Message, RagQueryRequest, RagQueryResponse};

pub trait ChatApi {
    /// `GET /conversations`
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>>;

    /// `GET /generate-chat-id`, plain-text body.
    async fn generate_chat_id(&self) -> Result<String>;

    /// `GET /{chatId}/messages`
    async fn load_messages(&self, chat_id: &str) -> Result<Vec<Message>>;

    /// `DELETE /{chatId}/messages`
    async fn delete_conversation(&self, chat_id: &str) -> Result<()>;
}

/// A file picked for upload.
pub trait UploadSource {
    fn file_name(&self) -> String;
    fn size(&self) -> u64;
    fn content_type(&self) -> Option<String>;
}

pub trait RagApi {
    type Upload: UploadSource;

    /// `POST /documents/upload` (multipart field `file`)
    async fn upload_document(&self, file: &Self::Upload) -> Result<DocumentRecord>;

    /// `GET /documents`
    async fn list_documents(&self) -> Result<Vec<DocumentRecord>>;

    /// `DELETE /documents/{id}`
    async fn delete_document(&self, id: i64) -> Result<()>;

    /// `POST /query`
    async fn query(&self, request: &RagQueryRequest) -> Result<RagQueryResponse>;
}
