// Documents persistence layer - whole-state JSON snapshots in the data dir.
// Load seeds or repairs; save is atomic (tmp + rename) and never fatal.

use std::fs;
use std::path::{Path, PathBuf};

use log::{error, info, warn};

use crate::modules::documents;
use crate::state::EditorState;

const STORE_FILE: &str = "documents.json";

pub struct EditorStore {
    path: PathBuf,
}

impl EditorStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(STORE_FILE),
        }
    }

    /// Restore the persisted session, seeding a fresh single-document state
    /// when nothing readable is on disk. The repair pass runs exactly once
    /// here, before any route reads the state.
    pub fn load(&self) -> EditorState {
        let mut state = if self.path.exists() {
            match fs::read_to_string(&self.path) {
                Ok(json) => match serde_json::from_str::<EditorState>(&json) {
                    Ok(state) => state,
                    Err(e) => {
                        warn!("[Store] Failed to parse {}: {}, seeding fresh state", STORE_FILE, e);
                        seed_state()
                    }
                },
                Err(e) => {
                    warn!("[Store] Failed to read {}: {}, seeding fresh state", STORE_FILE, e);
                    seed_state()
                }
            }
        } else {
            info!("[Store] No persisted documents, seeding first document");
            seed_state()
        };
        repair(&mut state);
        state
    }

    /// Persist the whole state. Failures are logged and swallowed - the
    /// in-memory state stays authoritative, there is no retry.
    pub fn save(&self, state: &EditorState) {
        if let Err(e) = self.write_snapshot(state) {
            error!("[Store] Failed to persist {}: {}", STORE_FILE, e);
        }
    }

    fn write_snapshot(&self, state: &EditorState) -> Result<(), String> {
        let tmp_path = self.path.with_extension("tmp");
        let parent = self.path.parent().ok_or("store path has no parent")?;

        fs::create_dir_all(parent).map_err(|e| e.to_string())?;

        let json = serde_json::to_string_pretty(state).map_err(|e| e.to_string())?;

        // Atomic write: tmp + rename, so a crash never leaves a half-written file
        fs::write(&tmp_path, json).map_err(|e| e.to_string())?;
        fs::rename(tmp_path, &self.path).map_err(|e| e.to_string())?;

        Ok(())
    }
}

/// First-run state: exactly one example document, active.
pub fn seed_state() -> EditorState {
    let mut state = EditorState::default();
    documents::add_document(&mut state);
    state
}

/// Consistency check applied to every loaded state: an empty collection is
/// re-seeded, an activeId that no longer resolves is reset to the first
/// document. Anything a past code path forgot to keep consistent converges
/// here.
pub fn repair(state: &mut EditorState) {
    if state.documents.is_empty() {
        warn!("[Store] Persisted state had no documents, re-seeding");
        *state = seed_state();
        return;
    }
    let resolves = state.documents.iter().any(|d| d.id == state.active_id);
    if state.active_id.is_empty() || !resolves {
        state.active_id = state.documents[0].id.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::documents::{add_document, set_active};

    #[test]
    fn test_load_without_file_seeds_one_active_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = EditorStore::new(dir.path());

        let state = store.load();

        assert_eq!(state.documents.len(), 1);
        assert_eq!(state.documents[0].title, "Document 1");
        assert_eq!(state.active_id, state.documents[0].id);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = EditorStore::new(dir.path());

        let mut state = EditorState::default();
        add_document(&mut state);
        add_document(&mut state);
        state.documents[0].content = "# hello".to_string();
        store.save(&state);

        let restored = store.load();
        assert_eq!(restored, state);
    }

    #[test]
    fn test_load_repairs_dangling_active_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = EditorStore::new(dir.path());

        let mut state = EditorState::default();
        add_document(&mut state);
        add_document(&mut state);
        set_active(&mut state, "doc-removed-elsewhere".to_string());
        store.save(&state);

        let restored = store.load();
        assert_eq!(restored.active_id, restored.documents[0].id);
        assert_eq!(restored.documents, state.documents);
    }

    #[test]
    fn test_load_repairs_empty_active_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = EditorStore::new(dir.path());

        let mut state = EditorState::default();
        add_document(&mut state);
        state.active_id = String::new();
        store.save(&state);

        let restored = store.load();
        assert_eq!(restored.active_id, restored.documents[0].id);
    }

    #[test]
    fn test_load_reseeds_empty_document_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = EditorStore::new(dir.path());
        store.save(&EditorState::default());

        let restored = store.load();
        assert_eq!(restored.documents.len(), 1);
        assert_eq!(restored.active_id, restored.documents[0].id);
    }

    #[test]
    fn test_load_with_corrupt_file_seeds_fresh_state() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(STORE_FILE), "{not json").unwrap();
        let store = EditorStore::new(dir.path());

        let state = store.load();
        assert_eq!(state.documents.len(), 1);
        assert_eq!(state.active_id, state.documents[0].id);
    }

    #[test]
    fn test_save_creates_missing_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("deeper").join("still");
        let store = EditorStore::new(&nested);

        store.save(&seed_state());
        assert!(nested.join(STORE_FILE).exists());
    }
}
