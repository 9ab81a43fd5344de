use std::ops::Range;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::UnsafeContentPolicy;
use crate::errors::ClientError;
use crate::models::Fragment;
use crate::render::MarkdownRenderer;
use crate::stream::StreamRequest;

/// Inline message shown when a stream fails before producing any text.
pub const NO_ANSWER_MESSAGE: &str = "Error receiving the answer. Please try again.";
/// Inline message shown when the abort policy rejects an answer.
pub const UNSAFE_ANSWER_MESSAGE: &str = "The answer was blocked because it contained unsafe content.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub(crate) u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// What the push transport hands to a session.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Raw `data` of one server-sent event, JSON `{"value": "..."}`.
    Message(String),
    /// The server closed the stream.
    End,
    /// The connection failed or was dropped.
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Completed,
    /// Ended before any fragment arrived.
    Failed(ClientError),
    /// Closed by the abort policy after unsafe content arrived.
    Rejected,
    /// Closed by the client, e.g. a newer question took over.
    Cancelled,
}

impl SessionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SessionOutcome::Completed)
    }

    /// Why the session produced no answer. `None` for a completed or
    /// cancelled session.
    pub fn error(&self) -> Option<ClientError> {
        match self {
            SessionOutcome::Failed(e) => Some(e.clone()),
            SessionOutcome::Rejected => Some(ClientError::UnsafeContent),
            SessionOutcome::Completed | SessionOutcome::Cancelled => None,
        }
    }
}

/// The UI element an answer is rendered into.
pub trait AnswerSlot {
    /// Replaces the whole content with already sanitized HTML.
    fn show_html(&mut self, html: &str);
    /// Replaces the whole content with an inline error message (plain text).
    fn show_error(&mut self, message: &str);
}

/// Effect of applying one event to a session.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The session was already closed or the event carried no fragment.
    Ignored,
    /// The slot now shows the render of the accumulated text.
    Rendered,
    /// The fragment was accumulated but its render was withheld as unsafe.
    Suppressed,
    Closed(SessionOutcome),
}

impl Transition {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Transition::Closed(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Phase {
    Open,
    Closed(SessionOutcome),
}

/// One streamed answer to one question.
///
/// `Open -> Fragment* -> Closed`. The accumulator only grows; every fragment
/// triggers a full re-render of the text after the last discarded unsafe
/// region, so the final output depends only on the full text and never on
/// how the server split it.
pub struct StreamSession<S> {
    id: SessionId,
    request: StreamRequest,
    buffer: String,
    window_start: usize,
    shown: Range<usize>,
    fragments: usize,
    phase: Phase,
    slot: S,
    renderer: Arc<MarkdownRenderer>,
    policy: UnsafeContentPolicy,
}

impl<S: AnswerSlot> StreamSession<S> {
    pub fn new(
        id: SessionId,
        request: StreamRequest,
        slot: S,
        renderer: Arc<MarkdownRenderer>,
        policy: UnsafeContentPolicy,
    ) -> Self {
        debug!(%id, conversation_id = %request.conversation_id, "stream session opened");
        Self {
            id,
            request,
            buffer: String::new(),
            window_start: 0,
            shown: 0..0,
            fragments: 0,
            phase: Phase::Open,
            slot,
            renderer,
            policy,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn request(&self) -> &StreamRequest {
        &self.request
    }

    /// Everything received so far, unsafe regions included.
    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// The part of the accumulator the slot is rendered from.
    pub fn visible_text(&self) -> &str {
        &self.buffer[self.window_start..]
    }

    /// The text behind the last render the slot received. Unsafe regions
    /// skipped under the discard policy never appear here.
    pub fn shown_text(&self) -> &str {
        &self.buffer[self.shown.clone()]
    }

    pub fn fragments(&self) -> usize {
        self.fragments
    }

    pub fn is_open(&self) -> bool {
        self.phase == Phase::Open
    }

    pub fn outcome(&self) -> Option<&SessionOutcome> {
        match &self.phase {
            Phase::Open => None,
            Phase::Closed(outcome) => Some(outcome),
        }
    }

    pub fn slot(&self) -> &S {
        &self.slot
    }

    pub fn apply(&mut self, event: StreamEvent) -> Transition {
        if !self.is_open() {
            debug!(id = %self.id, "event after close ignored");
            return Transition::Ignored;
        }
        match event {
            StreamEvent::Message(data) => self.on_message(&data),
            StreamEvent::End => {
                if self.fragments == 0 {
                    self.fail(ClientError::EmptyResponse)
                } else {
                    self.close(SessionOutcome::Completed)
                }
            }
            StreamEvent::Error(reason) => {
                // Browsers report a server-side close as an error too.
                if self.fragments == 0 {
                    self.fail(ClientError::Stream { message: reason })
                } else {
                    self.close(SessionOutcome::Completed)
                }
            }
        }
    }

    /// Client-side close. No-op if the session already ended.
    pub fn cancel(&mut self) -> Transition {
        if !self.is_open() {
            return Transition::Ignored;
        }
        self.close(SessionOutcome::Cancelled)
    }

    /// Ends the session with `error` and the inline failure notice, whatever
    /// was received so far. No-op if the session already ended.
    pub fn abandon(&mut self, error: ClientError) -> Transition {
        if !self.is_open() {
            return Transition::Ignored;
        }
        self.fail(error)
    }

    fn on_message(&mut self, data: &str) -> Transition {
        let fragment: Fragment = match serde_json::from_str(data) {
            Ok(f) => f,
            Err(e) => {
                warn!(id = %self.id, "undecodable stream event ignored: {e}");
                return Transition::Ignored;
            }
        };

        self.buffer.push_str(&fragment.value);
        self.fragments += 1;

        let output = self.renderer.render(self.visible_text());
        if output.is_clean() {
            self.slot.show_html(&output.html);
            self.shown = self.window_start..self.buffer.len();
            return Transition::Rendered;
        }

        let removed: Vec<String> = output.removed.iter().map(ToString::to_string).collect();
        warn!(id = %self.id, ?removed, "unsafe content in streamed answer");
        match self.policy {
            UnsafeContentPolicy::Discard => {
                self.window_start = self.buffer.len();
                Transition::Suppressed
            }
            UnsafeContentPolicy::Abort => {
                self.slot.show_error(UNSAFE_ANSWER_MESSAGE);
                self.shown = 0..0;
                self.close(SessionOutcome::Rejected)
            }
        }
    }

    fn fail(&mut self, error: ClientError) -> Transition {
        self.slot.show_error(NO_ANSWER_MESSAGE);
        self.shown = 0..0;
        self.close(SessionOutcome::Failed(error))
    }

    fn close(&mut self, outcome: SessionOutcome) -> Transition {
        debug!(id = %self.id, ?outcome, fragments = self.fragments, "stream session closed");
        self.phase = Phase::Closed(outcome.clone());
        Transition::Closed(outcome)
    }
}
