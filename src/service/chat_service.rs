use std::cell::{Cell, RefCell};

use tracing::{debug, error};

use crate::api::ChatApi;
use crate::errors::Result;
use crate::models::{ConversationSummary, Message};

const UNTITLED: &str = "New conversation";

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteOutcome {
    /// The deleted conversation was the open one; the message view is now empty.
    pub cleared_current: bool,
}

#[derive(Debug, Default)]
struct StoreState {
    conversations: Vec<ConversationSummary>,
    current: Option<String>,
    messages: Vec<Message>,
}

/// Client-side view of the server's conversations: the sidebar list, the open
/// conversation and its messages.
///
/// Every operation is one request/response. State only changes after a
/// successful response, so a failure leaves the previous view intact. Borrows
/// of the state never span an `.await`.
pub struct ConversationStore<A> {
    api: A,
    state: RefCell<StoreState>,
    creating: Cell<bool>,
    loading: Cell<bool>,
}

impl<A: ChatApi> ConversationStore<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            state: RefCell::new(StoreState::default()),
            creating: Cell::new(false),
            loading: Cell::new(false),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    // ── Snapshots ─────────────────────────────────────────────────────────────

    pub fn conversations(&self) -> Vec<ConversationSummary> {
        self.state.borrow().conversations.clone()
    }

    pub fn current(&self) -> Option<String> {
        self.state.borrow().current.clone()
    }

    pub fn has_current(&self) -> bool {
        self.state.borrow().current.is_some()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state.borrow().messages.clone()
    }

    pub fn is_creating(&self) -> bool {
        self.creating.get()
    }

    /// Title of the open conversation; fresh conversations are not listed by
    /// the server until their first message.
    pub fn current_title(&self) -> Option<String> {
        let state = self.state.borrow();
        let current = state.current.as_deref()?;
        let title = state
            .conversations
            .iter()
            .find(|c| c.conversation_id == current)
            .map(|c| c.title.trim())
            .filter(|t| !t.is_empty())
            .unwrap_or(UNTITLED);
        Some(title.to_string())
    }

    // ── Operations ────────────────────────────────────────────────────────────

    pub async fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        let conversations = self.api.list_conversations().await.map_err(|e| {
            error!("Failed to load conversations: {e}");
            e
        })?;
        self.state.borrow_mut().conversations = conversations.clone();
        Ok(conversations)
    }

    /// Loads the list and opens a fresh conversation when there is none yet.
    pub async fn bootstrap(&self) -> Result<()> {
        if self.list_conversations().await?.is_empty() {
            self.create_conversation().await?;
        }
        Ok(())
    }

    /// Asks the server for a new conversation id and makes it current.
    /// Returns `Ok(None)` without a request when a creation is already pending.
    pub async fn create_conversation(&self) -> Result<Option<String>> {
        if self.creating.replace(true) {
            debug!("conversation creation already pending");
            return Ok(None);
        }
        let result = self.api.generate_chat_id().await;
        self.creating.set(false);

        let id = result
            .map_err(|e| {
                error!("Failed to create conversation: {e}");
                e
            })?
            .trim()
            .to_string();
        {
            let mut state = self.state.borrow_mut();
            state.current = Some(id.clone());
            state.messages.clear();
        }

        if let Err(e) = self.list_conversations().await {
            debug!("conversation list not refreshed after create: {e}");
        }
        Ok(Some(id))
    }

    /// Opens `chat_id` and loads its messages. Returns `Ok(false)` when it is
    /// already open or another load is pending.
    pub async fn open_conversation(&self, chat_id: &str) -> Result<bool> {
        if self.loading.get() || self.current().as_deref() == Some(chat_id) {
            return Ok(false);
        }
        self.load_messages(chat_id).await?;
        Ok(true)
    }

    /// Fetches the messages of `chat_id` and makes it current.
    pub async fn load_messages(&self, chat_id: &str) -> Result<Vec<Message>> {
        self.loading.set(true);
        let result = self.api.load_messages(chat_id).await;
        self.loading.set(false);

        let messages = result.map_err(|e| {
            error!("Failed to load conversation {chat_id}: {e}");
            e
        })?;
        let mut state = self.state.borrow_mut();
        state.current = Some(chat_id.to_string());
        state.messages = messages.clone();
        Ok(messages)
    }

    pub async fn delete_conversation(&self, chat_id: &str) -> Result<DeleteOutcome> {
        self.api.delete_conversation(chat_id).await.map_err(|e| {
            error!("Failed to delete conversation {chat_id}: {e}");
            e
        })?;

        let cleared_current = {
            let mut state = self.state.borrow_mut();
            state.conversations.retain(|c| c.conversation_id != chat_id);
            if state.current.as_deref() == Some(chat_id) {
                state.current = None;
                state.messages.clear();
                true
            } else {
                false
            }
        };

        if let Err(e) = self.list_conversations().await {
            debug!("conversation list not refreshed after delete: {e}");
        }
        Ok(DeleteOutcome { cleared_current })
    }

    /// Appends a message to the open conversation's view, e.g. the question
    /// just sent or the final text of a streamed answer.
    pub fn record_message(&self, message: Message) {
        let mut state = self.state.borrow_mut();
        if state.current.is_some() {
            state.messages.push(message);
        }
    }
}
