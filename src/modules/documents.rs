// Document collection logic - pure state transitions, no I/O.
// The HTTP layer in server.rs applies these one at a time under the store
// lock; everything here can be unit tested without a socket.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

use crate::state::{Document, EditorState};

/// Example content seeded into every new document.
pub const DEFAULT_CONTENT: &str = r#"# Markdown + LaTeX

Write Markdown with **math formulas**:

Inline: $E = mc^2$

Block:
$$
\int_{0}^{\infty} e^{-x^2} \, dx = \frac{\sqrt{\pi}}{2}
$$

Tables and lists work too:
- Live preview
- KaTeX math
- PDF export
"#;

// Process-wide sequence; combined with the millisecond clock this keeps ids
// unique even when several documents are created in the same millisecond.
static DOC_SEQUENCE: AtomicU64 = AtomicU64::new(0);

fn next_document_id() -> String {
    let seq = DOC_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("doc-{}-{}", now_millis(), seq)
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Create a new document with the default template, append it in tab order
/// and make it active. Returns the new document's id.
///
/// The default title numbers documents by collection size at creation time;
/// numbers are deliberately not reclaimed or renumbered after removals.
pub fn add_document(state: &mut EditorState) -> String {
    let now = now_millis();
    let document = Document {
        id: next_document_id(),
        title: format!("Document {}", state.documents.len() + 1),
        content: DEFAULT_CONTENT.to_string(),
        created_at: now,
        updated_at: now,
    };
    let id = document.id.clone();
    state.documents.push(document);
    state.active_id = id.clone();
    id
}

/// Remove a document by id. Returns true if the state changed.
///
/// Guards: removing the last remaining document is a no-op (the collection
/// must never become empty), and an unknown id is a no-op rather than an
/// error - close clicks on stale tabs are expected.
///
/// When the removed document was active, the document that preceded it in
/// the post-removal order becomes active (clamped to the first entry).
pub fn remove_document(state: &mut EditorState, id: &str) -> bool {
    if state.documents.len() <= 1 {
        return false;
    }
    let removed_index = match state.documents.iter().position(|d| d.id == id) {
        Some(index) => index,
        None => return false,
    };
    state.documents.remove(removed_index);

    if state.active_id == id {
        let fallback_index = removed_index.saturating_sub(1);
        state.active_id = state
            .documents
            .get(fallback_index)
            .or_else(|| state.documents.first())
            .map(|d| d.id.clone())
            .unwrap_or_default();
    }
    true
}

/// Replace a document's content and bump its updatedAt.
/// Returns true if a document matched; unknown ids are a no-op.
pub fn update_content(state: &mut EditorState, id: &str, content: String) -> bool {
    match state.documents.iter_mut().find(|d| d.id == id) {
        Some(document) => {
            document.content = content;
            document.updated_at = now_millis();
            true
        }
        None => false,
    }
}

/// Rename a document and bump its updatedAt.
/// Empty titles are rejected upstream by the HTTP layer, not here.
pub fn update_title(state: &mut EditorState, id: &str, title: String) -> bool {
    match state.documents.iter_mut().find(|d| d.id == id) {
        Some(document) => {
            document.title = title;
            document.updated_at = now_millis();
            true
        }
        None => false,
    }
}

/// Point the store at a document id, unconditionally.
/// Ids that do not (yet) resolve are tolerated; `active_document` falls
/// back to the first document until the pointer resolves again.
pub fn set_active(state: &mut EditorState, id: String) {
    state.active_id = id;
}

/// The active document, or the first document when the pointer does not
/// resolve. `None` only while the collection is empty.
pub fn active_document(state: &EditorState) -> Option<&Document> {
    state
        .documents
        .iter()
        .find(|d| d.id == state.active_id)
        .or_else(|| state.documents.first())
}
