mod api;
mod components;
mod sse;
mod state;

use chatbot_ui::ClientConfig;
use leptos::mount::mount_to_body;
use leptos::prelude::*;

use components::chat::ChatArea;
use components::documents::DocumentsPanel;
use components::sidebar::Sidebar;
use state::AppState;

/// Settings baked in at build time, e.g. `CHAT_API_BASE=/api/chat trunk build`.
fn load_config() -> ClientConfig {
    let lookup = |key: &str| {
        match key {
            "CHAT_API_BASE" => option_env!("CHAT_API_BASE"),
            "RAG_API_BASE" => option_env!("RAG_API_BASE"),
            "RAG_TOP_K" => option_env!("RAG_TOP_K"),
            "CHAT_UNSAFE_CONTENT" => option_env!("CHAT_UNSAFE_CONTENT"),
            "CHAT_INPUT_MAX_HEIGHT" => option_env!("CHAT_INPUT_MAX_HEIGHT"),
            "RAG_REFRESH_MS" => option_env!("RAG_REFRESH_MS"),
            _ => None,
        }
        .map(str::to_string)
    };

    ClientConfig::from_lookup(lookup).unwrap_or_else(|e| {
        log::error!("{e}; falling back to defaults");
        ClientConfig::default()
    })
}

/// Root application component.
#[component]
fn App() -> impl IntoView {
    let state = AppState::provide(load_config());

    // Load conversations and documents on mount
    state.bootstrap();

    view! {
        <div class="app-container">
            <Sidebar />
            <ChatArea />
            <DocumentsPanel />
        </div>
    }
}

fn main() {
    init_logging();
    mount_to_body(App);
}

fn init_logging() {
    if let Err(e) = console_log::init_with_level(log::Level::Debug) {
        web_sys::console::error_1(&format!("logger already set: {e}").into());
    }
}
