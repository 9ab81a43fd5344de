use std::cell::{Cell, RefCell};
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::api::{RagApi, UploadSource};
use crate::errors::{ClientError, Result};
use crate::models::{Citation, DocumentRecord, DocumentStatus, RagQueryRequest};
use crate::render::MarkdownRenderer;

/// Identifies a row of the documents panel. Uploads in flight have no server
/// id yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKey {
    Local(u64),
    Stored(i64),
}

impl std::fmt::Display for EntryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKey::Local(n) => write!(f, "local-{n}"),
            EntryKey::Stored(id) => write!(f, "doc-{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentEntry {
    pub key: EntryKey,
    pub record: DocumentRecord,
}

impl DocumentEntry {
    fn stored(record: DocumentRecord) -> Self {
        Self { key: EntryKey::Stored(record.id), record }
    }
}

/// Answer to a RAG question, ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct RagReply {
    pub question: String,
    /// Sanitized HTML of the answer.
    pub answer_html: String,
    pub citations: Vec<Citation>,
}

/// Uploaded documents and question answering over them.
pub struct DocumentLibrary<A> {
    api: A,
    renderer: Arc<MarkdownRenderer>,
    top_k: u32,
    entries: RefCell<Vec<DocumentEntry>>,
    last_local: Cell<u64>,
    asking: Cell<bool>,
}

impl<A: RagApi> DocumentLibrary<A> {
    pub fn new(api: A, renderer: Arc<MarkdownRenderer>, top_k: u32) -> Self {
        Self {
            api,
            renderer,
            top_k,
            entries: RefCell::new(Vec::new()),
            last_local: Cell::new(0),
            asking: Cell::new(false),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn entries(&self) -> Vec<DocumentEntry> {
        self.entries.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Questions need at least one fully processed document.
    pub fn can_query(&self) -> bool {
        self.entries
            .borrow()
            .iter()
            .any(|e| e.record.status == DocumentStatus::Completed)
    }

    /// Some document is still being processed server-side.
    pub fn needs_refresh(&self) -> bool {
        self.entries
            .borrow()
            .iter()
            .any(|e| e.record.status == DocumentStatus::Processing)
    }

    pub fn is_asking(&self) -> bool {
        self.asking.get()
    }

    /// Replaces the server-side rows, keeping rows that only exist locally.
    pub async fn refresh(&self) -> Result<()> {
        let records = self.api.list_documents().await.map_err(|e| {
            error!("Failed to load documents: {e}");
            e
        })?;
        let mut entries = self.entries.borrow_mut();
        entries.retain(|e| matches!(e.key, EntryKey::Local(_)));
        entries.extend(records.into_iter().map(DocumentEntry::stored));
        Ok(())
    }

    /// Shows the file as `PROCESSING` right away, then swaps in the server
    /// record, or marks the row `ERROR` when the upload fails.
    pub async fn upload(&self, file: &A::Upload) -> Result<DocumentEntry> {
        let local = EntryKey::Local(self.last_local.get() + 1);
        self.last_local.set(self.last_local.get() + 1);
        self.entries.borrow_mut().insert(
            0,
            DocumentEntry {
                key: local,
                record: DocumentRecord::pending(file.file_name(), file.size(), file.content_type()),
            },
        );

        let result = self.api.upload_document(file).await;

        let mut entries = self.entries.borrow_mut();
        let Some(entry) = entries.iter_mut().find(|e| e.key == local) else {
            // Removed by the user while uploading.
            return result.map(DocumentEntry::stored);
        };
        match result {
            Ok(record) => {
                info!(id = record.id, filename = %record.filename, "document uploaded");
                *entry = DocumentEntry::stored(record);
                Ok(entry.clone())
            }
            Err(e) => {
                error!("Failed to upload {}: {e}", entry.record.filename);
                entry.record.status = DocumentStatus::Error;
                entry.record.error_message = Some(upload_error_message(&e));
                Err(e)
            }
        }
    }

    pub async fn delete(&self, key: EntryKey) -> Result<()> {
        if let EntryKey::Stored(id) = key {
            self.api.delete_document(id).await.map_err(|e| {
                error!("Failed to delete document {id}: {e}");
                e
            })?;
        }
        self.entries.borrow_mut().retain(|e| e.key != key);
        Ok(())
    }

    /// Asks a question over the uploaded documents. Returns `Ok(None)` without
    /// a request for a blank question or while another one is pending.
    pub async fn ask(&self, question: &str) -> Result<Option<RagReply>> {
        let question = question.trim();
        if question.is_empty() || self.asking.replace(true) {
            debug!("rag question skipped");
            return Ok(None);
        }

        let request = RagQueryRequest {
            question: question.to_string(),
            top_k: self.top_k,
            conversation_id: None,
        };
        let result = self.api.query(&request).await;
        self.asking.set(false);

        let response = result.map_err(|e| {
            error!("RAG query failed: {e}");
            e
        })?;
        Ok(Some(RagReply {
            question: request.question,
            answer_html: self.renderer.render_html(&response.answer),
            citations: response.citations,
        }))
    }
}

fn upload_error_message(error: &ClientError) -> String {
    match error {
        ClientError::Server { message, .. } if !message.trim().is_empty() => message.clone(),
        ClientError::Transport { .. } => "Network error".to_string(),
        _ => "Upload failed".to_string(),
    }
}
