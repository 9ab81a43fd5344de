use std::cell::OnceCell;
use std::rc::Rc;
use std::sync::Arc;

use chatbot_ui::models::ConversationSummary;
use chatbot_ui::view::{
    MessageView, DELETED_NOTICE, EMPTY_CHAT_NOTICE, NO_MESSAGES_NOTICE, NO_SELECTION_TITLE,
};
use chatbot_ui::{
    AnswerSlot, AnswerStream, ChatController, ClientConfig, ClientError, ConversationStore,
    Delivery, DocumentEntry, DocumentLibrary, EntryKey, MarkdownRenderer, RagReply, SendError,
    SessionId, StreamEvent,
};
use gloo_timers::future::TimeoutFuture;
use leptos::prelude::*;
use leptos::task::spawn_local;

use crate::api::{FileUpload, HttpChatApi, HttpRagApi};
use crate::sse::EventSourceTransport;

pub type Controller = ChatController<HttpChatApi, EventSourceTransport, SignalSlot>;
pub type Library = DocumentLibrary<HttpRagApi>;

/// What the answer bubble under the last question shows.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveAnswer {
    /// Sanitized HTML, possibly still growing.
    Html(String),
    /// Inline error, shown as text.
    Error(String),
}

/// The bubble of one question's answer.
pub type Bubble = RwSignal<Option<LiveAnswer>>;

/// Answer slot backed by its own signal, so the bubble re-renders on every
/// update and a finished session can never write into a newer bubble.
pub struct SignalSlot(Bubble);

impl AnswerSlot for SignalSlot {
    fn show_html(&mut self, html: &str) {
        self.0.set(Some(LiveAnswer::Html(html.to_string())));
    }

    fn show_error(&mut self, message: &str) {
        self.0.set(Some(LiveAnswer::Error(message.to_string())));
    }
}

/// Shared application state, provided via Leptos context.
///
/// The controller and the document library own the actual state; the signals
/// mirror it after every operation so components can subscribe.
#[derive(Clone, Copy)]
pub struct AppState {
    // --- Chat ---
    pub conversations: RwSignal<Vec<ConversationSummary>>,
    pub current: RwSignal<Option<String>>,
    pub title: RwSignal<String>,
    pub messages: RwSignal<Vec<MessageView>>,
    /// Bubble of the latest question, while it is on screen.
    pub live_answer: RwSignal<Option<Bubble>>,
    pub notice: RwSignal<&'static str>,
    pub input_enabled: RwSignal<bool>,
    pub send_label: RwSignal<&'static str>,
    pub creating: RwSignal<bool>,

    // --- Documents ---
    pub documents: RwSignal<Vec<DocumentEntry>>,
    pub can_query: RwSignal<bool>,
    pub asking: RwSignal<bool>,
    pub rag_reply: RwSignal<Option<RagReply>>,
    pub rag_elapsed_ms: RwSignal<Option<u64>>,

    pub config: StoredValue<ClientConfig, LocalStorage>,
    controller: StoredValue<Rc<Controller>, LocalStorage>,
    library: StoredValue<Rc<Library>, LocalStorage>,
    renderer: StoredValue<Arc<MarkdownRenderer>, LocalStorage>,
}

impl AppState {
    /// Create a new `AppState` and provide it in the current Leptos context.
    pub fn provide(config: ClientConfig) -> Self {
        let renderer = Arc::new(MarkdownRenderer::new());
        let endpoints = config.endpoints();

        // The transport needs the state to dispatch into, and the state owns
        // the transport through the controller.
        let this: Rc<OnceCell<AppState>> = Rc::new(OnceCell::new());
        let target = this.clone();
        let transport = EventSourceTransport::new(move |id, event| {
            if let Some(state) = target.get() {
                state.deliver(id, event);
            }
        });

        let controller = ChatController::new(
            ConversationStore::new(HttpChatApi::new(endpoints.clone())),
            AnswerStream::new(transport, &config, renderer.clone()),
        );
        let library = DocumentLibrary::new(HttpRagApi::new(endpoints), renderer.clone(), config.top_k);

        let state = Self {
            conversations: RwSignal::new(Vec::new()),
            current: RwSignal::new(None),
            title: RwSignal::new(NO_SELECTION_TITLE.to_string()),
            messages: RwSignal::new(Vec::new()),
            live_answer: RwSignal::new(None),
            notice: RwSignal::new(EMPTY_CHAT_NOTICE),
            input_enabled: RwSignal::new(false),
            send_label: RwSignal::new("Send"),
            creating: RwSignal::new(false),
            documents: RwSignal::new(Vec::new()),
            can_query: RwSignal::new(false),
            asking: RwSignal::new(false),
            rag_reply: RwSignal::new(None),
            rag_elapsed_ms: RwSignal::new(None),
            config: StoredValue::new_local(config),
            controller: StoredValue::new_local(Rc::new(controller)),
            library: StoredValue::new_local(Rc::new(library)),
            renderer: StoredValue::new_local(renderer),
        };
        let _ = this.set(state);

        provide_context(state);
        state
    }

    fn controller(&self) -> Rc<Controller> {
        self.controller.get_value()
    }

    fn library(&self) -> Rc<Library> {
        self.library.get_value()
    }

    /// Copies the controller's state into the signals.
    fn sync_chat(&self) {
        let controller = self.controller();
        let store = controller.store();
        let renderer = self.renderer.get_value();

        self.conversations.set(store.conversations());
        self.current.set(store.current());
        self.title
            .set(store.current_title().unwrap_or_else(|| NO_SELECTION_TITLE.to_string()));
        self.messages
            .set(MessageView::render_all(&store.messages(), &renderer));
        self.input_enabled.set(controller.input_enabled());
        self.send_label.set(controller.send_label());
        self.creating.set(store.is_creating());
    }

    fn sync_documents(&self) {
        let library = self.library();
        self.documents.set(library.entries());
        self.can_query.set(library.can_query());
        self.asking.set(library.is_asking());
    }

    fn report(&self, error: &ClientError) {
        log::error!("{error}");
        let _ = window().alert_with_message(error.user_message());
    }

    // ── Chat ──────────────────────────────────────────────────────────────────

    /// Loads conversations and documents, then starts the document poller.
    pub fn bootstrap(&self) {
        let state = *self;
        spawn_local(async move {
            let controller = state.controller();
            if let Err(e) = controller.bootstrap().await {
                state.report(&e);
            }
            state.sync_chat();
        });
        spawn_local(async move {
            if state.library().refresh().await.is_ok() {
                state.sync_documents();
            }
        });
        self.poll_documents();
    }

    pub fn refresh_conversations(&self) {
        let state = *self;
        spawn_local(async move {
            if state.controller().refresh().await.is_ok() {
                state.sync_chat();
            }
        });
    }

    pub fn new_conversation(&self) {
        let state = *self;
        self.creating.set(true);
        spawn_local(async move {
            match state.controller().create_conversation().await {
                Ok(Some(id)) => {
                    log::info!("Created conversation {id}");
                    state.live_answer.set(None);
                    state.notice.set(EMPTY_CHAT_NOTICE);
                }
                Ok(None) => {}
                Err(e) => state.report(&e),
            }
            state.sync_chat();
        });
    }

    pub fn open_conversation(&self, id: String) {
        let state = *self;
        spawn_local(async move {
            match state.controller().open_conversation(&id).await {
                Ok(true) => {
                    state.live_answer.set(None);
                    state.notice.set(NO_MESSAGES_NOTICE);
                }
                Ok(false) => {}
                Err(e) => state.report(&e),
            }
            state.sync_chat();
        });
    }

    pub fn delete_conversation(&self, id: String) {
        let state = *self;
        spawn_local(async move {
            match state.controller().delete_conversation(&id).await {
                Ok(outcome) if outcome.cleared_current => {
                    state.live_answer.set(None);
                    state.notice.set(DELETED_NOTICE);
                }
                Ok(_) => {}
                Err(e) => state.report(&e),
            }
            state.sync_chat();
        });
    }

    /// Sends `draft` and starts streaming the answer into a fresh bubble.
    /// Returns whether the draft was taken, i.e. the prompt box should be
    /// cleared. A draft whose stream could not be opened stays in the box.
    pub fn send(&self, draft: &str) -> bool {
        let controller = self.controller();
        let bubble: Bubble = RwSignal::new(Some(LiveAnswer::Html(String::new())));
        let taken = match controller.send(draft, SignalSlot(bubble)) {
            Ok(id) => {
                log::debug!("{id}: question sent");
                self.live_answer.set(Some(bubble));
                true
            }
            Err(SendError::Rejected(reason)) => {
                log::debug!("draft not sent: {reason}");
                false
            }
            // The bubble already holds the inline error.
            Err(SendError::Client(e)) => {
                log::error!("{e}");
                self.live_answer.set(Some(bubble));
                false
            }
        };
        self.sync_chat();
        taken
    }

    fn deliver(&self, id: SessionId, event: StreamEvent) {
        let controller = self.controller();
        if let Delivery::Closed(report) = controller.deliver(id, event) {
            if let Some(e) = report.outcome.error() {
                log::warn!("{id}: {e}");
            }
            if report.outcome.is_success() {
                self.live_answer.set(None);
                self.refresh_conversations();
            }
            self.sync_chat();
        }
    }

    // ── Documents ─────────────────────────────────────────────────────────────

    fn poll_documents(&self) {
        let state = *self;
        let interval = self.config.with_value(|c| c.document_refresh_ms);
        spawn_local(async move {
            loop {
                TimeoutFuture::new(interval).await;
                let library = state.library();
                if library.needs_refresh() && library.refresh().await.is_ok() {
                    state.sync_documents();
                }
            }
        });
    }

    pub fn upload(&self, files: Vec<FileUpload>) {
        let state = *self;
        spawn_local(async move {
            let library = state.library();
            for file in &files {
                if let Err(e) = library.upload(file).await {
                    log::warn!("upload failed: {e}");
                }
                state.sync_documents();
            }
        });
    }

    pub fn delete_document(&self, key: EntryKey) {
        let state = *self;
        spawn_local(async move {
            if let Err(e) = state.library().delete(key).await {
                state.report(&e);
            }
            state.sync_documents();
        });
    }

    pub fn ask(&self, question: String) {
        let state = *self;
        self.asking.set(true);
        spawn_local(async move {
            let started = js_sys::Date::now();
            match state.library().ask(&question).await {
                Ok(Some(reply)) => {
                    state.rag_elapsed_ms.set(Some((js_sys::Date::now() - started) as u64));
                    state.rag_reply.set(Some(reply));
                }
                Ok(None) => {}
                Err(e) => state.report(&e),
            }
            state.sync_documents();
        });
    }
}
