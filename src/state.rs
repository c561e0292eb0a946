// Shared state structs to avoid circular dependencies.
// These are used by main.rs and can be tested independently.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};

use crate::modules::editor_store::EditorStore;
use crate::modules::events::EventBridge;
use crate::settings::Settings;

/// One Markdown+LaTeX document, shown as a tab in the UI.
/// `id` is assigned at creation and never changes; `title` and `content`
/// are user-mutable; timestamps are Unix-epoch milliseconds.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// The whole editor session: open documents in tab order, plus the pointer
/// to the active one. This is both the in-memory shape and the persisted
/// shape (documents.json).
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct EditorState {
    pub documents: Vec<Document>,
    #[serde(default)]
    pub active_id: String,
}

pub struct AppState {
    pub editor: Mutex<EditorState>,
    pub store: EditorStore,
    pub settings: RwLock<Settings>,
    pub exporting: AtomicBool,
    pub events: Arc<EventBridge>,
    pub data_dir: PathBuf,
}
