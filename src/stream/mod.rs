//! Streaming answer rendering: the per-question session state machine and the
//! controller that owns the single live session of an answer slot.

pub mod session;

use std::sync::Arc;

use tracing::{debug, error};

use crate::config::{ClientConfig, Endpoints, UnsafeContentPolicy};
use crate::errors::Result;
use crate::render::MarkdownRenderer;

pub use session::{
    AnswerSlot, SessionId, SessionOutcome, StreamEvent, StreamSession, Transition,
    NO_ANSWER_MESSAGE, UNSAFE_ANSWER_MESSAGE,
};

/// The question a session answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub conversation_id: String,
    pub question: String,
}

impl StreamRequest {
    pub fn new(conversation_id: impl Into<String>, question: impl Into<String>) -> Self {
        Self { conversation_id: conversation_id.into(), question: question.into() }
    }
}

/// A live server-push connection.
pub trait StreamConnection {
    /// Releases the connection. Events already queued may still be delivered.
    fn close(&mut self);
}

/// Opens server-push connections. Implementations deliver every inbound event
/// back through [`AnswerStream::deliver`] tagged with the session id.
pub trait StreamTransport {
    type Connection: StreamConnection;

    fn connect(&mut self, url: &str, session: SessionId) -> Result<Self::Connection>;
}

/// Summary of a finished session.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamReport {
    pub id: SessionId,
    pub request: StreamRequest,
    pub outcome: SessionOutcome,
    /// Full accumulated answer text, unsafe regions included.
    pub text: String,
    /// The text the slot last showed a render of. This is the answer to keep.
    pub shown: String,
    pub fragments: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// Stale session id, nothing changed.
    Ignored,
    Applied(Transition),
    /// The session reached its terminal state and its transport was released.
    Closed(StreamReport),
}

struct ActiveSession<C, S> {
    session: StreamSession<S>,
    connection: C,
}

impl<C: StreamConnection, S: AnswerSlot> ActiveSession<C, S> {
    fn finish(mut self) -> StreamReport {
        self.connection.close();
        StreamReport {
            id: self.session.id(),
            request: self.session.request().clone(),
            outcome: self
                .session
                .outcome()
                .cloned()
                .unwrap_or(SessionOutcome::Cancelled),
            text: self.session.text().to_string(),
            shown: self.session.shown_text().to_string(),
            fragments: self.session.fragments(),
        }
    }
}

/// Owns at most one open [`StreamSession`] for one answer slot.
pub struct AnswerStream<T: StreamTransport, S: AnswerSlot> {
    transport: T,
    endpoints: Endpoints,
    renderer: Arc<MarkdownRenderer>,
    policy: UnsafeContentPolicy,
    last_id: u64,
    active: Option<ActiveSession<T::Connection, S>>,
}

impl<T: StreamTransport, S: AnswerSlot> AnswerStream<T, S> {
    pub fn new(transport: T, config: &ClientConfig, renderer: Arc<MarkdownRenderer>) -> Self {
        Self {
            transport,
            endpoints: config.endpoints(),
            renderer,
            policy: config.unsafe_content,
            last_id: 0,
            active: None,
        }
    }

    pub fn active_id(&self) -> Option<SessionId> {
        self.active.as_ref().map(|a| a.session.id())
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Starts answering `request` into `slot`. An already open session is
    /// cancelled and its transport closed before the new one connects.
    pub fn open(&mut self, request: StreamRequest, slot: S) -> Result<SessionId> {
        if let Some(report) = self.cancel() {
            debug!(id = %report.id, "previous session cancelled by a new question");
        }

        self.last_id += 1;
        let id = SessionId(self.last_id);
        let url = self.endpoints.stream(&request.conversation_id, &request.question);
        let mut session = StreamSession::new(id, request, slot, self.renderer.clone(), self.policy);

        match self.transport.connect(&url, id) {
            Ok(connection) => {
                self.active = Some(ActiveSession { session, connection });
                Ok(id)
            }
            Err(e) => {
                error!(%id, "failed to open answer stream: {e}");
                session.abandon(e.clone());
                Err(e)
            }
        }
    }

    /// Routes one transport event to the session it belongs to.
    pub fn deliver(&mut self, id: SessionId, event: StreamEvent) -> Delivery {
        let transition = match self.active.as_mut() {
            Some(active) if active.session.id() == id => active.session.apply(event),
            _ => {
                debug!(%id, "event for inactive session ignored");
                return Delivery::Ignored;
            }
        };

        if !transition.is_terminal() {
            return Delivery::Applied(transition);
        }
        match self.active.take() {
            Some(active) => Delivery::Closed(active.finish()),
            None => Delivery::Ignored,
        }
    }

    /// Closes the open session, if any.
    pub fn cancel(&mut self) -> Option<StreamReport> {
        let mut active = self.active.take()?;
        active.session.cancel();
        Some(active.finish())
    }
}

impl<T: StreamTransport, S: AnswerSlot> Drop for AnswerStream<T, S> {
    fn drop(&mut self) {
        self.cancel();
    }
}
