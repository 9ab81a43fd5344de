use chatbot_ui::view::{MessageBody, MessageView};
use chatbot_ui::{InputController, KeyAction};
use leptos::ev;
use leptos::html;
use leptos::prelude::*;

use crate::state::{AppState, LiveAnswer};

/// Main chat area with message history, the streaming answer, and input.
#[component]
pub fn ChatArea() -> impl IntoView {
    let state = expect_context::<AppState>();
    let container = NodeRef::<html::Div>::new();

    // Keep the newest content in view
    Effect::new(move |_| {
        state.messages.track();
        if let Some(bubble) = state.live_answer.get() {
            bubble.track();
        }
        if let Some(el) = container.get() {
            el.set_scroll_top(el.scroll_height());
        }
    });

    view! {
        <main class="chat-area">
            <div class="chat-header">{move || state.title.get()}</div>

            <div class="messages-container" node_ref=container>
                {move || {
                    let empty = state.messages.with(Vec::is_empty)
                        && state.live_answer.with(Option::is_none);
                    if empty {
                        view! { <div class="empty-state">{move || state.notice.get()}</div> }
                            .into_any()
                    } else {
                        view! {
                            {move || {
                                state
                                    .messages
                                    .get()
                                    .into_iter()
                                    .map(|message| view! { <MessageBubble message=message /> })
                                    .collect_view()
                            }}
                            {move || {
                                state
                                    .live_answer
                                    .get()
                                    .and_then(|bubble| bubble.get())
                                    .map(|answer| view! { <LiveBubble answer=answer /> })
                            }}
                        }
                            .into_any()
                    }
                }}
            </div>

            <ChatInput />
        </main>
    }
}

/// A finished message. User text is shown verbatim, assistant text as the
/// sanitized HTML it was rendered to.
#[component]
fn MessageBubble(message: MessageView) -> impl IntoView {
    let class = message.class;
    match message.body {
        MessageBody::Text(text) => view! { <div class=class>{text}</div> }.into_any(),
        MessageBody::Html(html) => view! { <div class=class inner_html=html></div> }.into_any(),
    }
}

/// The answer currently streaming in, or its inline error.
#[component]
fn LiveBubble(answer: LiveAnswer) -> impl IntoView {
    match answer {
        LiveAnswer::Html(html) if html.is_empty() => view! {
            <div class="message ai-message typing">"…"</div>
        }
        .into_any(),
        LiveAnswer::Html(html) => view! {
            <div class="message ai-message streaming" inner_html=html></div>
        }
        .into_any(),
        LiveAnswer::Error(message) => view! {
            <div class="message ai-message error">{message}</div>
        }
        .into_any(),
    }
}

/// Prompt box that grows with its content, and the send button.
#[component]
fn ChatInput() -> impl IntoView {
    let state = expect_context::<AppState>();
    let (draft, set_draft) = signal(String::new());
    let textarea = NodeRef::<html::Textarea>::new();
    let cap = state.config.with_value(|c| c.input_height_cap());

    let fit = move || {
        if let Some(el) = textarea.get() {
            let style = web_sys::HtmlElement::style(&el);
            let _ = style.set_property("height", "auto");
            let height = InputController::fit_height(el.scroll_height().max(0) as u32, cap);
            let _ = style.set_property("height", &format!("{height}px"));
        }
    };

    let send = move || {
        if state.send(&draft.get_untracked()) {
            set_draft.set(String::new());
            if let Some(el) = textarea.get() {
                let _ = web_sys::HtmlElement::style(&el).set_property("height", "auto");
            }
        }
    };

    let on_keydown = move |ev: ev::KeyboardEvent| {
        match InputController::key_action(&ev.key(), ev.shift_key()) {
            KeyAction::Submit => {
                ev.prevent_default();
                send();
            }
            KeyAction::Newline | KeyAction::Ignore => {}
        }
    };

    view! {
        <div class="input-area">
            <div class="input-row">
                <textarea
                    rows="1"
                    placeholder="Type a message… (Enter to send, Shift+Enter for newline)"
                    node_ref=textarea
                    prop:value=draft
                    on:input=move |ev| {
                        set_draft.set(event_target_value(&ev));
                        fit();
                    }
                    on:keydown=on_keydown
                    disabled=move || !state.input_enabled.get()
                />
                <button
                    class="send-btn"
                    on:click=move |_| send()
                    disabled=move || !state.input_enabled.get() || draft.with(|d| d.trim().is_empty())
                >
                    {move || state.send_label.get()}
                </button>
            </div>
        </div>
    }
}
