use chatbot_ui::view::{relative_time, NO_CONVERSATIONS_NOTICE};
use chrono::{DateTime, Utc};
use leptos::ev;
use leptos::prelude::*;

use crate::state::AppState;

fn now() -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(js_sys::Date::now() as i64)
}

/// Sidebar showing the conversation list and the "New Chat" button.
#[component]
pub fn Sidebar() -> impl IntoView {
    let state = expect_context::<AppState>();

    view! {
        <aside class="sidebar">
            <div class="sidebar-header">
                <h2>"Chatbot"</h2>
                <button
                    class="new-chat-btn"
                    on:click=move |_| state.new_conversation()
                    disabled=move || state.creating.get()
                >
                    "+ New Chat"
                </button>
            </div>
            <div class="conversation-list">
                {move || {
                    if state.conversations.with(Vec::is_empty) {
                        view! { <div class="no-conversations">{NO_CONVERSATIONS_NOTICE}</div> }
                            .into_any()
                    } else {
                        view! {
                            <For
                                each=move || state.conversations.get()
                                key=|c| c.conversation_id.clone()
                                let:conv
                            >
                                <ConversationItem
                                    id=conv.conversation_id.clone()
                                    title=conv.title.clone()
                                    when=conv.last_message_time.or(conv.first_message_time)
                                />
                            </For>
                        }
                            .into_any()
                    }
                }}
            </div>
        </aside>
    }
}

#[component]
fn ConversationItem(id: String, title: String, when: Option<DateTime<Utc>>) -> impl IntoView {
    let state = expect_context::<AppState>();
    let title = if title.trim().is_empty() { "New conversation".to_string() } else { title };
    let time = now().map(|now| relative_time(when, now)).unwrap_or_default();

    let id_active = id.clone();
    let id_open = id.clone();
    let on_delete = move |ev: ev::MouseEvent| {
        ev.stop_propagation();
        let confirmed = window()
            .confirm_with_message("Delete this conversation?")
            .unwrap_or(false);
        if confirmed {
            state.delete_conversation(id.clone());
        }
    };

    view! {
        <div
            class="conversation-item"
            class:active=move || state.current.get().as_deref() == Some(id_active.as_str())
            on:click=move |_| state.open_conversation(id_open.clone())
        >
            <div class="conversation-info">
                <div class="conversation-title">{title}</div>
                <div class="conversation-time">{time}</div>
            </div>
            <button class="delete-btn" title="Delete conversation" on:click=on_delete>
                "×"
            </button>
        </div>
    }
}
