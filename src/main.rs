use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, RwLock};

use log::{info, warn};

use marktex_lib::modules::editor_store::EditorStore;
use marktex_lib::modules::events::EventBridge;
use marktex_lib::server;
use marktex_lib::settings::Settings;
use marktex_lib::state::AppState;

const DATA_DIR_REL: &str = "marktex";

/// Platform data directory, resolved from the environment.
fn data_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        if !xdg.is_empty() {
            return PathBuf::from(xdg).join(DATA_DIR_REL);
        }
    }
    if let Ok(appdata) = std::env::var("APPDATA") {
        if !appdata.is_empty() {
            return PathBuf::from(appdata).join(DATA_DIR_REL);
        }
    }
    match std::env::var("HOME") {
        Ok(home) => PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(DATA_DIR_REL),
        Err(_) => PathBuf::from(".").join(DATA_DIR_REL),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let data_dir = data_dir();
    let mut settings = Settings::load(&data_dir);

    // The bridge needs a concrete port before the frontend asks for it
    let events_port = match settings.events_port {
        0 => portpicker::pick_unused_port().unwrap_or(9351),
        port => port,
    };
    settings.events_port = events_port;

    let events = Arc::new(EventBridge::new(events_port));
    events.clone().start();

    let store = EditorStore::new(&data_dir);
    let editor = store.load();
    info!(
        "[Main] Restored {} document(s), active: {}",
        editor.documents.len(),
        editor.active_id
    );

    let port = if portpicker::is_free(settings.port) {
        settings.port
    } else {
        let fallback = portpicker::pick_unused_port().unwrap_or(settings.port);
        warn!("[Main] Port {} busy, using {}", settings.port, fallback);
        fallback
    };

    let state = Arc::new(AppState {
        editor: Mutex::new(editor),
        store,
        settings: RwLock::new(settings),
        exporting: AtomicBool::new(false),
        events,
        data_dir,
    });

    server::run(state, port);
}
