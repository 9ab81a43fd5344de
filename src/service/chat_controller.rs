use std::cell::RefCell;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::ChatApi;
use crate::errors::{ClientError, Result};
use crate::input::{InputController, SubmitRejection};
use crate::models::{ConversationSummary, Message};
use crate::service::chat_service::{ConversationStore, DeleteOutcome};
use crate::stream::{AnswerSlot, AnswerStream, Delivery, SessionId, StreamEvent, StreamRequest, StreamTransport};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SendError {
    #[error(transparent)]
    Rejected(#[from] SubmitRejection),
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Ties the conversation store, the prompt input and the answer stream of the
/// chat page together.
///
/// Switching or deleting the open conversation tears its answer stream down
/// before anything else changes. Dropping the controller releases any open
/// stream.
pub struct ChatController<A: ChatApi, T: StreamTransport, S: AnswerSlot> {
    store: ConversationStore<A>,
    input: RefCell<InputController>,
    answers: RefCell<AnswerStream<T, S>>,
}

impl<A, T, S> ChatController<A, T, S>
where
    A: ChatApi,
    T: StreamTransport,
    S: AnswerSlot,
{
    pub fn new(store: ConversationStore<A>, answers: AnswerStream<T, S>) -> Self {
        Self {
            store,
            input: RefCell::new(InputController::new()),
            answers: RefCell::new(answers),
        }
    }

    pub fn store(&self) -> &ConversationStore<A> {
        &self.store
    }

    pub fn is_sending(&self) -> bool {
        self.input.borrow().is_sending()
    }

    pub fn input_enabled(&self) -> bool {
        self.input.borrow().can_edit(self.store.has_current())
    }

    pub fn can_send(&self, draft: &str) -> bool {
        self.input.borrow().can_send(draft, self.store.has_current())
    }

    pub fn send_label(&self) -> &'static str {
        self.input.borrow().send_label()
    }

    pub fn active_session(&self) -> Option<SessionId> {
        self.answers.borrow().active_id()
    }

    /// Sends `draft` to the open conversation and starts streaming the answer
    /// into `slot`. Nothing is requested when the draft is blank, no
    /// conversation is open or an answer is still streaming.
    ///
    /// The question joins the message list only once its stream is open; if
    /// the connection cannot be made, the list is left as it was and `slot`
    /// shows the inline failure notice.
    pub fn send(&self, draft: &str, slot: S) -> std::result::Result<SessionId, SendError> {
        let current = self.store.current();
        let question = self.input.borrow_mut().submit(draft, current.is_some())?;
        let Some(conversation_id) = current else {
            self.input.borrow_mut().finish();
            return Err(SubmitRejection::NoConversation.into());
        };

        let opened = self
            .answers
            .borrow_mut()
            .open(StreamRequest::new(conversation_id, question.clone()), slot);

        match opened {
            Ok(id) => {
                self.store.record_message(Message::user(question));
                Ok(id)
            }
            Err(e) => {
                self.input.borrow_mut().finish();
                Err(e.into())
            }
        }
    }

    /// Feeds one transport event to the answer stream. When the session ends
    /// the answer joins the message list and the input goes back to idle.
    ///
    /// The stored answer is the text of the last render the user saw, so
    /// reopening the conversation shows the same thing.
    pub fn deliver(&self, id: SessionId, event: StreamEvent) -> Delivery {
        let delivery = self.answers.borrow_mut().deliver(id, event);
        if let Delivery::Closed(report) = &delivery {
            info!(id = %report.id, outcome = ?report.outcome, fragments = report.fragments, "answer finished");
            if let Some(e) = report.outcome.error() {
                warn!(id = %report.id, "no answer: {e}");
            }
            if report.outcome.is_success() && !report.shown.is_empty() {
                self.store.record_message(Message::assistant(report.shown.clone()));
            }
            self.input.borrow_mut().finish();
        }
        delivery
    }

    /// Stops the streaming answer, if any.
    pub fn cancel_answer(&self) {
        if let Some(report) = self.answers.borrow_mut().cancel() {
            debug!(id = %report.id, "answer cancelled");
        }
        self.input.borrow_mut().finish();
    }

    pub async fn bootstrap(&self) -> Result<()> {
        self.store.bootstrap().await
    }

    pub async fn refresh(&self) -> Result<Vec<ConversationSummary>> {
        self.store.list_conversations().await
    }

    pub async fn create_conversation(&self) -> Result<Option<String>> {
        if self.store.is_creating() {
            return Ok(None);
        }
        self.cancel_answer();
        self.store.create_conversation().await
    }

    pub async fn open_conversation(&self, chat_id: &str) -> Result<bool> {
        if self.store.current().as_deref() == Some(chat_id) {
            return Ok(false);
        }
        self.cancel_answer();
        self.store.open_conversation(chat_id).await
    }

    pub async fn delete_conversation(&self, chat_id: &str) -> Result<DeleteOutcome> {
        let outcome = self.store.delete_conversation(chat_id).await?;
        if outcome.cleared_current {
            self.cancel_answer();
        }
        Ok(outcome)
    }
}
