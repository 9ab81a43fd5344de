use chatbot_ui::view::{format_file_size, CitationView};
use chatbot_ui::{DocumentEntry, EntryKey, RagReply};
use leptos::ev;
use leptos::prelude::*;
use web_sys::HtmlInputElement;

use crate::api::FileUpload;
use crate::state::AppState;

/// Uploaded documents and questions answered over them.
#[component]
pub fn DocumentsPanel() -> impl IntoView {
    let state = expect_context::<AppState>();

    let on_files = move |ev: ev::Event| {
        let input = event_target::<HtmlInputElement>(&ev);
        let Some(list) = input.files() else {
            return;
        };
        let files: Vec<FileUpload> = (0..list.length())
            .filter_map(|i| list.item(i))
            .map(FileUpload)
            .collect();
        // Allow picking the same file again
        input.set_value("");
        if !files.is_empty() {
            state.upload(files);
        }
    };

    view! {
        <section class="documents-panel">
            <div class="documents-header">
                <h2>"Documents"</h2>
                <span class="documents-count">{move || state.documents.with(Vec::len)}</span>
            </div>
            <label class="upload-btn">
                "Upload"
                <input type="file" multiple hidden on:change=on_files />
            </label>
            <div class="documents-list">
                {move || {
                    if state.documents.with(Vec::is_empty) {
                        view! { <div class="empty-state">"No documents uploaded yet"</div> }
                            .into_any()
                    } else {
                        view! {
                            <For
                                each=move || state.documents.get()
                                key=|entry| (entry.key, entry.record.status.as_str())
                                let:entry
                            >
                                <DocumentRow entry=entry />
                            </For>
                        }
                            .into_any()
                    }
                }}
            </div>
            <QuestionBox />
        </section>
    }
}

#[component]
fn DocumentRow(entry: DocumentEntry) -> impl IntoView {
    let state = expect_context::<AppState>();
    let key = entry.key;
    let record = entry.record;
    let size = record.file_size.map(format_file_size).unwrap_or_default();
    let chunks = record
        .chunk_count
        .filter(|n| *n > 0)
        .map(|n| format!("{n} chunks"))
        .unwrap_or_default();

    let on_delete = move |_| {
        if matches!(key, EntryKey::Stored(_)) {
            let confirmed = window()
                .confirm_with_message("Delete this document?")
                .unwrap_or(false);
            if !confirmed {
                return;
            }
        }
        state.delete_document(key);
    };

    view! {
        <div class="document-item">
            <div class="document-info">
                <div class="document-name">{record.filename}</div>
                <div class="document-meta">
                    <span>{size}</span>
                    <span>{chunks}</span>
                </div>
                {record.error_message.map(|m| view! { <div class="document-error">{m}</div> })}
            </div>
            <span class=format!("status-badge {}", record.status.css_class())>
                {record.status.as_str()}
            </span>
            <button class="delete-btn" title="Delete document" on:click=on_delete>
                "×"
            </button>
        </div>
    }
}

#[component]
fn QuestionBox() -> impl IntoView {
    let state = expect_context::<AppState>();
    let (question, set_question) = signal(String::new());

    let ask = move || {
        let text = question.get_untracked();
        if !text.trim().is_empty() {
            state.ask(text);
        }
    };

    view! {
        <div class="rag-query">
            <textarea
                rows="2"
                placeholder=move || {
                    if state.can_query.get() {
                        "Ask a question about your documents…"
                    } else {
                        "Upload a document to ask questions"
                    }
                }
                prop:value=question
                on:input=move |ev| set_question.set(event_target_value(&ev))
                on:keydown=move |ev: ev::KeyboardEvent| {
                    if ev.key() == "Enter" && !ev.shift_key() {
                        ev.prevent_default();
                        ask();
                    }
                }
                disabled=move || !state.can_query.get()
            />
            <button
                class="ask-btn"
                on:click=move |_| ask()
                disabled=move || {
                    !state.can_query.get() || state.asking.get()
                        || question.with(|q| q.trim().is_empty())
                }
            >
                {move || if state.asking.get() { "Searching…" } else { "Ask" }}
            </button>
            {move || state.rag_reply.get().map(|reply| view! { <RagAnswer reply=reply /> })}
        </div>
    }
}

#[component]
fn RagAnswer(reply: RagReply) -> impl IntoView {
    let state = expect_context::<AppState>();
    let citations: Vec<CitationView> = reply.citations.iter().map(CitationView::from).collect();

    view! {
        <div class="rag-answer">
            <div class="rag-question">{reply.question}</div>
            <div class="rag-answer-body" inner_html=reply.answer_html></div>
            {move || state.rag_elapsed_ms.get().map(|ms| view! { <div class="response-time">{format!("{ms}ms")}</div> })}
            <div class="citations">
                {citations
                    .into_iter()
                    .map(|c| {
                        view! {
                            <div class="citation">
                                <div class="citation-source">{c.source}</div>
                                <div class="citation-content">{c.content}</div>
                                {c.relevance.map(|r| view! { <div class="citation-relevance">{r}</div> })}
                            </div>
                        }
                    })
                    .collect_view()}
            </div>
        </div>
    }
}
