use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use chatbot_ui::api::ChatApi;
use chatbot_ui::models::{ConversationSummary, Message};
use chatbot_ui::stream::NO_ANSWER_MESSAGE;
use chatbot_ui::{
    AnswerSlot, AnswerStream, ChatController, ClientConfig, ClientError, ConversationStore,
    Delivery, MarkdownRenderer, SendError, SessionId, SessionOutcome, StreamConnection,
    StreamEvent, StreamRequest, StreamTransport, SubmitRejection, UnsafeContentPolicy,
};

type Log = Rc<RefCell<Vec<String>>>;

// ── Fakes ─────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeApi {
    conversations: RefCell<Vec<ConversationSummary>>,
    calls: Rc<Cell<usize>>,
}

impl FakeApi {
    fn with(ids: &[&str]) -> Self {
        let api = Self::default();
        api.conversations
            .borrow_mut()
            .extend(ids.iter().map(|id| ConversationSummary::new(*id, format!("Chat {id}"))));
        api
    }
}

impl ChatApi for FakeApi {
    async fn list_conversations(&self) -> chatbot_ui::Result<Vec<ConversationSummary>> {
        self.calls.set(self.calls.get() + 1);
        Ok(self.conversations.borrow().clone())
    }

    async fn generate_chat_id(&self) -> chatbot_ui::Result<String> {
        self.calls.set(self.calls.get() + 1);
        Ok("fresh".into())
    }

    async fn load_messages(&self, _chat_id: &str) -> chatbot_ui::Result<Vec<Message>> {
        self.calls.set(self.calls.get() + 1);
        Ok(vec![Message::user("earlier"), Message::assistant("reply")])
    }

    async fn delete_conversation(&self, chat_id: &str) -> chatbot_ui::Result<()> {
        self.calls.set(self.calls.get() + 1);
        self.conversations
            .borrow_mut()
            .retain(|c| c.conversation_id != chat_id);
        Ok(())
    }
}

struct FakeTransport {
    log: Log,
    refuse: bool,
}

struct FakeConnection {
    id: SessionId,
    log: Log,
}

impl StreamConnection for FakeConnection {
    fn close(&mut self) {
        self.log.borrow_mut().push(format!("close {}", self.id));
    }
}

impl StreamTransport for FakeTransport {
    type Connection = FakeConnection;

    fn connect(&mut self, _url: &str, session: SessionId) -> chatbot_ui::Result<FakeConnection> {
        if self.refuse {
            return Err(ClientError::Stream { message: "connection refused".into() });
        }
        self.log.borrow_mut().push(format!("open {session}"));
        Ok(FakeConnection { id: session, log: self.log.clone() })
    }
}

struct Slot {
    name: &'static str,
    log: Log,
}

impl AnswerSlot for Slot {
    fn show_html(&mut self, html: &str) {
        self.log.borrow_mut().push(format!("{}={html}", self.name));
    }

    fn show_error(&mut self, message: &str) {
        self.log.borrow_mut().push(format!("{}!{message}", self.name));
    }
}

fn slot(name: &'static str, log: &Log) -> Slot {
    Slot { name, log: log.clone() }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatbot_ui=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

fn answers(log: &Log, policy: UnsafeContentPolicy) -> AnswerStream<FakeTransport, Slot> {
    answers_over(FakeTransport { log: log.clone(), refuse: false }, policy)
}

fn answers_over(transport: FakeTransport, policy: UnsafeContentPolicy) -> AnswerStream<FakeTransport, Slot> {
    init_tracing();
    let config = ClientConfig { unsafe_content: policy, ..ClientConfig::default() };
    AnswerStream::new(transport, &config, Arc::new(MarkdownRenderer::new()))
}

fn fragment(value: &str) -> StreamEvent {
    StreamEvent::Message(serde_json::json!({ "value": value }).to_string())
}

/// Streams `chunks` into a fresh session and returns the slot writes.
fn stream_chunks(chunks: &[&str], policy: UnsafeContentPolicy) -> Vec<String> {
    let log = Log::default();
    let mut stream = answers(&log, policy);
    let id = stream
        .open(StreamRequest::new("c", "q"), slot("a", &log))
        .unwrap();
    for chunk in chunks {
        stream.deliver(id, fragment(chunk));
    }
    stream.deliver(id, StreamEvent::End);

    let writes = log
        .borrow()
        .iter()
        .filter_map(|l| l.strip_prefix("a=").or_else(|| l.strip_prefix("a!")))
        .map(str::to_string)
        .collect();
    writes
}

fn controller(api: FakeApi, log: &Log) -> ChatController<FakeApi, FakeTransport, Slot> {
    ChatController::new(ConversationStore::new(api), answers(log, UnsafeContentPolicy::Discard))
}

/// A controller whose stream endpoint never accepts a connection.
fn refusing_controller(api: FakeApi, log: &Log) -> ChatController<FakeApi, FakeTransport, Slot> {
    let transport = FakeTransport { log: log.clone(), refuse: true };
    ChatController::new(
        ConversationStore::new(api),
        answers_over(transport, UnsafeContentPolicy::Discard),
    )
}

// ── Rendering properties ──────────────────────────────────────────────────────

const ANSWER: &str = "# Plan\nHello **world**, try `cargo run`:\n\n```rust\nfn main() {}\n```\n\n- one\n- *two*\n\n| a | b |\n|---|---|\n| 1 | 2 |\n";

#[test]
fn final_render_does_not_depend_on_chunking() {
    let expected = MarkdownRenderer::new().render(ANSWER).html;

    for size in 1..=ANSWER.len() {
        let chunks: Vec<&str> = ANSWER
            .as_bytes()
            .chunks(size)
            .map(|c| std::str::from_utf8(c).unwrap())
            .collect();
        let writes = stream_chunks(&chunks, UnsafeContentPolicy::Discard);
        assert_eq!(writes.last().unwrap(), &expected, "chunk size {size}");
    }
}

#[test]
fn split_bold_renders_as_bold() {
    let writes = stream_chunks(&["Hel", "lo **wo", "rld**"], UnsafeContentPolicy::Discard);
    assert_eq!(writes.last().unwrap(), "<p>Hello <strong>world</strong></p>\n");
    assert_eq!(writes.len(), 3);
}

#[test]
fn unsafe_text_is_never_rendered() {
    let chunks = ["Intro ", "<scr", "ipt>alert(1)</scr", "ipt> after [x](java", "script:alert(2))"];
    for policy in [UnsafeContentPolicy::Discard, UnsafeContentPolicy::Abort] {
        let writes = stream_chunks(&chunks, policy);
        assert!(!writes.is_empty());
        for write in &writes {
            assert!(!write.contains("<script"), "{policy:?}: {write}");
            assert!(!write.contains("alert"), "{policy:?}: {write}");
            assert!(!write.contains("javascript"), "{policy:?}: {write}");
        }
    }
}

#[test]
fn abort_policy_ends_the_session_on_unsafe_text() {
    let log = Log::default();
    let mut stream = answers(&log, UnsafeContentPolicy::Abort);
    let id = stream.open(StreamRequest::new("c", "q"), slot("a", &log)).unwrap();

    stream.deliver(id, fragment("ok "));
    let Delivery::Closed(report) = stream.deliver(id, fragment("<object data=x>")) else {
        panic!("abort policy must close the session");
    };
    assert_eq!(report.outcome, SessionOutcome::Rejected);
    assert_eq!(stream.deliver(id, fragment("more")), Delivery::Ignored);
    assert_eq!(log.borrow().iter().filter(|l| l.starts_with("close")).count(), 1);
}

// ── Session lifecycle ─────────────────────────────────────────────────────────

#[test]
fn exactly_one_terminal_event_and_no_late_writes() {
    let log = Log::default();
    let mut stream = answers(&log, UnsafeContentPolicy::Discard);
    let id = stream.open(StreamRequest::new("c", "q"), slot("a", &log)).unwrap();

    stream.deliver(id, fragment("done"));
    assert!(matches!(stream.deliver(id, StreamEvent::End), Delivery::Closed(_)));
    let len = log.borrow().len();

    assert_eq!(stream.deliver(id, fragment("late")), Delivery::Ignored);
    assert_eq!(stream.deliver(id, StreamEvent::Error("late".into())), Delivery::Ignored);
    assert_eq!(log.borrow().len(), len);
}

#[test]
fn new_session_closes_the_old_transport_first() {
    let log = Log::default();
    let mut stream = answers(&log, UnsafeContentPolicy::Discard);
    let first = stream.open(StreamRequest::new("c", "one"), slot("a", &log)).unwrap();
    stream.deliver(first, fragment("partial"));

    let second = stream.open(StreamRequest::new("c", "two"), slot("b", &log)).unwrap();
    assert_eq!(stream.deliver(first, fragment(" late")), Delivery::Ignored);
    stream.deliver(second, fragment("fresh"));

    assert_eq!(
        *log.borrow(),
        vec![
            format!("open {first}"),
            "a=<p>partial</p>\n".to_string(),
            format!("close {first}"),
            format!("open {second}"),
            "b=<p>fresh</p>\n".to_string(),
        ]
    );
}

// ── Page scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn error_before_any_fragment_shows_one_inline_error() {
    let log = Log::default();
    let chat = controller(FakeApi::with(&["a", "b"]), &log);
    chat.refresh().await.unwrap();
    chat.open_conversation("a").await.unwrap();
    let list_before = chat.store().conversations();

    let id = chat.send("hello?", slot("answer", &log)).unwrap();
    assert!(chat.is_sending());
    let delivery = chat.deliver(id, StreamEvent::Error("connection refused".into()));

    let Delivery::Closed(report) = delivery else {
        panic!("error must close the session");
    };
    assert_eq!(
        report.outcome,
        SessionOutcome::Failed(ClientError::Stream { message: "connection refused".into() })
    );
    let errors: Vec<_> = log.borrow().iter().filter(|l| l.starts_with("answer")).cloned().collect();
    assert_eq!(errors, vec![format!("answer!{NO_ANSWER_MESSAGE}")]);
    assert_eq!(chat.store().conversations(), list_before);
    assert!(!chat.is_sending());
    assert!(chat.input_enabled());
}

#[tokio::test]
async fn completed_answer_joins_the_message_list() {
    let log = Log::default();
    let chat = controller(FakeApi::with(&["a"]), &log);
    chat.open_conversation("a").await.unwrap();

    let id = chat.send("  question  ", slot("answer", &log)).unwrap();
    chat.deliver(id, fragment("answer"));
    chat.deliver(id, StreamEvent::End);

    let messages = chat.store().messages();
    assert_eq!(
        &messages[2..],
        &[Message::user("question"), Message::assistant("answer")]
    );
}

#[tokio::test]
async fn saved_answer_is_what_the_user_last_saw() {
    let log = Log::default();
    let chat = controller(FakeApi::with(&["a"]), &log);
    chat.open_conversation("a").await.unwrap();

    let id = chat.send("q", slot("answer", &log)).unwrap();
    for chunk in ["safe ", "<img src=x onerror=alert(1)>", " tail"] {
        chat.deliver(id, fragment(chunk));
    }
    chat.deliver(id, StreamEvent::End);

    let last_shown = log
        .borrow()
        .iter()
        .rev()
        .find_map(|l| l.strip_prefix("answer="))
        .map(str::to_string)
        .unwrap();
    let saved = chat.store().messages().last().cloned().unwrap();

    assert_eq!(saved, Message::assistant(" tail"));
    assert!(!saved.text.contains("onerror"));
    assert_eq!(MarkdownRenderer::new().render_html(&saved.text), last_shown);
}

#[tokio::test]
async fn empty_stream_saves_no_answer() {
    let log = Log::default();
    let chat = controller(FakeApi::with(&["a"]), &log);
    chat.open_conversation("a").await.unwrap();

    let id = chat.send("q", slot("answer", &log)).unwrap();
    let Delivery::Closed(report) = chat.deliver(id, StreamEvent::End) else {
        panic!("end must close the session");
    };

    assert_eq!(report.outcome.error(), Some(ClientError::EmptyResponse));
    assert_eq!(chat.store().messages().last(), Some(&Message::user("q")));
}

#[tokio::test]
async fn refused_stream_leaves_the_message_list_alone() {
    let log = Log::default();
    let chat = refusing_controller(FakeApi::with(&["a"]), &log);
    chat.open_conversation("a").await.unwrap();
    let before = chat.store().messages();

    let result = chat.send("hello", slot("answer", &log));

    assert!(matches!(result, Err(SendError::Client(ref e)) if e.is_transport()));
    assert_eq!(chat.store().messages(), before);
    assert_eq!(chat.active_session(), None);
    assert!(!chat.is_sending());
    assert!(chat.input_enabled());
    assert_eq!(*log.borrow(), vec![format!("answer!{NO_ANSWER_MESSAGE}")]);
}

#[tokio::test]
async fn deleting_the_open_conversation_clears_view_and_disables_input() {
    let log = Log::default();
    let chat = controller(FakeApi::with(&["a", "b"]), &log);
    chat.open_conversation("a").await.unwrap();
    assert!(chat.input_enabled());
    let id = chat.send("q", slot("answer", &log)).unwrap();

    let outcome = chat.delete_conversation("a").await.unwrap();

    assert!(outcome.cleared_current);
    assert!(chat.store().messages().is_empty());
    assert_eq!(chat.store().current(), None);
    assert!(!chat.input_enabled());
    assert!(!chat.can_send("anything"));
    assert_eq!(chat.active_session(), None);
    assert!(log.borrow().contains(&format!("close {id}")));
}

#[tokio::test]
async fn empty_text_or_no_conversation_sends_nothing() {
    let log = Log::default();
    let api = FakeApi::with(&["a"]);
    let calls = api.calls.clone();
    let chat = controller(api, &log);

    assert_eq!(
        chat.send("hello", slot("answer", &log)),
        Err(SendError::Rejected(SubmitRejection::NoConversation))
    );

    chat.open_conversation("a").await.unwrap();
    let calls_after_open = calls.get();
    assert_eq!(
        chat.send("   ", slot("answer", &log)),
        Err(SendError::Rejected(SubmitRejection::Empty))
    );

    assert!(log.borrow().is_empty());
    assert_eq!(calls.get(), calls_after_open);
    assert!(!chat.is_sending());
}

#[tokio::test]
async fn second_send_while_streaming_is_rejected() {
    let log = Log::default();
    let chat = controller(FakeApi::with(&["a"]), &log);
    chat.open_conversation("a").await.unwrap();

    let first = chat.send("one", slot("answer", &log)).unwrap();
    assert_eq!(
        chat.send("two", slot("other", &log)),
        Err(SendError::Rejected(SubmitRejection::Busy))
    );
    assert_eq!(chat.active_session(), Some(first));
}

#[tokio::test]
async fn each_question_writes_only_to_its_own_slot() {
    let log = Log::default();
    let chat = controller(FakeApi::with(&["a"]), &log);
    chat.open_conversation("a").await.unwrap();

    let first = chat.send("one", slot("first", &log)).unwrap();
    chat.deliver(first, fragment("1"));
    chat.deliver(first, StreamEvent::End);
    let second = chat.send("two", slot("second", &log)).unwrap();
    chat.deliver(first, fragment("stale"));
    chat.deliver(second, fragment("2"));

    let writes: Vec<String> = log
        .borrow()
        .iter()
        .filter(|l| !l.starts_with("open") && !l.starts_with("close"))
        .cloned()
        .collect();
    assert_eq!(writes, vec!["first=<p>1</p>\n".to_string(), "second=<p>2</p>\n".to_string()]);
}

#[tokio::test]
async fn switching_conversations_cancels_the_stream() {
    let log = Log::default();
    let chat = controller(FakeApi::with(&["a", "b"]), &log);
    chat.open_conversation("a").await.unwrap();
    let id = chat.send("q", slot("answer", &log)).unwrap();

    assert!(chat.open_conversation("b").await.unwrap());
    assert_eq!(chat.active_session(), None);
    assert_eq!(chat.deliver(id, fragment("late")), Delivery::Ignored);
    assert!(!log.borrow().iter().any(|l| l.contains("late")));
    assert!(!chat.is_sending());
}

#[test]
fn client_errors_map_to_short_notices() {
    assert!(ClientError::transport("x").is_transport());
    assert!(ClientError::server(503, "down").is_server());
    assert_eq!(
        ClientError::EmptyResponse.user_message(),
        "No answer was received. Please try again."
    );
    assert_eq!(SessionOutcome::Rejected.error(), Some(ClientError::UnsafeContent));
    assert_eq!(SessionOutcome::Cancelled.error(), None);
}
