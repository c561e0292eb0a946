// HTTP shell: routing, embedded frontend assets, and the glue between
// routes and the pure store logic in modules/. Requests are handled one at
// a time on the accept loop, so store mutations apply strictly in dispatch
// order; only PDF exports leave the loop (worker thread).

use std::io::Read;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use log::{error, info, warn};
use rust_embed::RustEmbed;
use serde::Deserialize;
use serde_json::json;
use tiny_http::{Header, Method, Request, Response, Server};
use url::Url;

use crate::modules::{documents, export};
use crate::settings::Settings;
use crate::state::AppState;

#[derive(RustEmbed)]
#[folder = "assets/"]
struct Assets;

// Export payloads carry the full rendered preview HTML
const MAX_BODY_BYTES: u64 = 8 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    State,
    ActiveDocument,
    CreateDocument,
    DeleteDocument(String),
    UpdateContent(String),
    UpdateTitle(String),
    SetActive,
    GetSettings,
    PutSettings,
    Export,
    Asset(String),
    ApiNotFound,
}

/// Map method + raw request target onto a route. Pure string logic so the
/// table can be tested without a socket.
pub fn resolve_route(method: &Method, raw_url: &str) -> Route {
    // tiny_http hands us the origin-form target; join onto a dummy base to
    // split path from query
    let path = match Url::parse("http://localhost/").and_then(|base| base.join(raw_url)) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => raw_url.to_string(),
    };
    let segments: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            urlencoding::decode(s)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| s.to_string())
        })
        .collect();
    let parts: Vec<&str> = segments.iter().map(|s| s.as_str()).collect();

    match (method, parts.as_slice()) {
        (&Method::Get, ["api", "state"]) => Route::State,
        (&Method::Get, ["api", "state", "active"]) => Route::ActiveDocument,
        (&Method::Put, ["api", "state", "active"]) => Route::SetActive,
        (&Method::Post, ["api", "documents"]) => Route::CreateDocument,
        (&Method::Delete, ["api", "documents", id]) => Route::DeleteDocument((*id).to_string()),
        (&Method::Put, ["api", "documents", id, "content"]) => Route::UpdateContent((*id).to_string()),
        (&Method::Put, ["api", "documents", id, "title"]) => Route::UpdateTitle((*id).to_string()),
        (&Method::Get, ["api", "settings"]) => Route::GetSettings,
        (&Method::Put, ["api", "settings"]) => Route::PutSettings,
        (&Method::Post, ["api", "export"]) => Route::Export,
        (_, rest) if rest.first() == Some(&"api") => Route::ApiNotFound,
        (&Method::Get, rest) => Route::Asset(rest.join("/")),
        _ => Route::ApiNotFound,
    }
}

#[derive(Deserialize)]
struct ContentBody {
    content: String,
}

#[derive(Deserialize)]
struct TitleBody {
    title: String,
}

#[derive(Deserialize)]
struct ActiveBody {
    id: String,
}

pub fn run(state: Arc<AppState>, port: u16) {
    let addr = format!("127.0.0.1:{}", port);
    let server = match Server::http(&addr) {
        Ok(server) => server,
        Err(e) => {
            error!("[Server] Failed to bind {}: {}", addr, e);
            return;
        }
    };
    info!("[Server] marktex running at http://{}", addr);

    loop {
        match server.recv() {
            Ok(request) => handle_request(&state, request),
            Err(e) => warn!("[Server] recv failed: {}", e),
        }
    }
}

fn handle_request(state: &Arc<AppState>, mut request: Request) {
    let route = resolve_route(request.method(), request.url());

    match route {
        Route::State => {
            let editor = state.editor.lock().unwrap().clone();
            respond_json(request, 200, to_json(&editor));
        }

        Route::ActiveDocument => {
            let document = {
                let editor = state.editor.lock().unwrap();
                documents::active_document(&editor).cloned()
            };
            respond_json(request, 200, to_json(&document));
        }

        Route::CreateDocument => {
            let document = {
                let mut editor = state.editor.lock().unwrap();
                documents::add_document(&mut editor);
                state.store.save(&editor);
                state.events.broadcast_state(&editor);
                editor.documents.last().cloned()
            };
            if let Some(ref document) = document {
                info!("[Documents] Created \"{}\"", document.title);
            }
            respond_json(request, 200, to_json(&document));
        }

        Route::DeleteDocument(id) => {
            let changed = {
                let mut editor = state.editor.lock().unwrap();
                let changed = documents::remove_document(&mut editor, &id);
                if changed {
                    state.store.save(&editor);
                    state.events.broadcast_state(&editor);
                }
                changed
            };
            respond_json(request, 200, json!({ "changed": changed }));
        }

        Route::UpdateContent(id) => {
            let body = match read_json::<ContentBody>(&mut request) {
                Ok(body) => body,
                Err(e) => return respond_json(request, 400, json!({ "error": e })),
            };
            let changed = {
                let mut editor = state.editor.lock().unwrap();
                let changed = documents::update_content(&mut editor, &id, body.content);
                if changed {
                    state.store.save(&editor);
                    state.events.broadcast_state(&editor);
                }
                changed
            };
            respond_json(request, 200, json!({ "changed": changed }));
        }

        Route::UpdateTitle(id) => {
            let body = match read_json::<TitleBody>(&mut request) {
                Ok(body) => body,
                Err(e) => return respond_json(request, 400, json!({ "error": e })),
            };
            // Titles are validated here, not in the store
            let title = body.title.trim().to_string();
            if title.is_empty() {
                return respond_json(request, 400, json!({ "error": "title must not be empty" }));
            }
            let changed = {
                let mut editor = state.editor.lock().unwrap();
                let changed = documents::update_title(&mut editor, &id, title);
                if changed {
                    state.store.save(&editor);
                    state.events.broadcast_state(&editor);
                }
                changed
            };
            respond_json(request, 200, json!({ "changed": changed }));
        }

        Route::SetActive => {
            let body = match read_json::<ActiveBody>(&mut request) {
                Ok(body) => body,
                Err(e) => return respond_json(request, 400, json!({ "error": e })),
            };
            {
                let mut editor = state.editor.lock().unwrap();
                documents::set_active(&mut editor, body.id);
                state.store.save(&editor);
                state.events.broadcast_state(&editor);
            }
            respond_json(request, 200, json!({ "changed": true }));
        }

        Route::GetSettings => {
            let settings = state.settings.read().unwrap().clone();
            respond_json(request, 200, to_json(&settings));
        }

        Route::PutSettings => {
            let new_settings = match read_json::<Settings>(&mut request) {
                Ok(settings) => settings,
                Err(e) => return respond_json(request, 400, json!({ "error": e })),
            };
            if let Err(e) = new_settings.save(&state.data_dir) {
                error!("[Settings] Failed to persist settings: {}", e);
                return respond_json(request, 500, json!({ "error": e }));
            }
            *state.settings.write().unwrap() = new_settings.clone();
            respond_json(request, 200, to_json(&new_settings));
        }

        Route::Export => handle_export(state, request),

        Route::Asset(path) => respond_asset(request, &path),

        Route::ApiNotFound => {
            respond_json(request, 404, json!({ "error": "not found" }));
        }
    }
}

/// Exports run on their own thread so the user can keep editing while the
/// render service works; the store lock is never held across the call. The
/// atomic flag rejects re-invocation until the in-flight request resolves.
fn handle_export(state: &Arc<AppState>, request: Request) {
    if state
        .exporting
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        respond_json(request, 409, json!({ "error": "an export is already in flight" }));
        return;
    }

    let state = state.clone();
    std::thread::spawn(move || {
        let mut request = request;
        let parsed = read_json::<export::ExportRequest>(&mut request);
        match parsed {
            Ok(export_request) => {
                let settings = state.settings.read().unwrap().clone();
                info!(
                    "[Export] Rendering \"{}\" ({} bytes of HTML)",
                    export_request.title,
                    export_request.html.len()
                );
                match export::render_remote(&export_request, &settings) {
                    Ok(pdf) => respond_pdf(request, pdf, &export_request.title),
                    Err(e) => {
                        error!("[Export] {}", e);
                        respond_json(request, 502, json!({ "error": e }));
                    }
                }
            }
            Err(e) => respond_json(request, 400, json!({ "error": e })),
        }
        state.exporting.store(false, Ordering::SeqCst);
    });
}

fn read_json<T: serde::de::DeserializeOwned>(request: &mut Request) -> Result<T, String> {
    let mut body = String::new();
    request
        .as_reader()
        .take(MAX_BODY_BYTES)
        .read_to_string(&mut body)
        .map_err(|e| format!("failed to read body: {}", e))?;
    serde_json::from_str(&body).map_err(|e| format!("invalid JSON body: {}", e))
}

fn to_json<T: serde::Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or_else(|_| json!(null))
}

fn respond_json(request: Request, status: u16, body: serde_json::Value) {
    let response = Response::from_string(body.to_string())
        .with_status_code(status)
        .with_header(
            Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap(),
        );
    if let Err(e) = request.respond(response) {
        warn!("[Server] Failed to send response: {}", e);
    }
}

fn respond_pdf(request: Request, pdf: Vec<u8>, title: &str) {
    let response = Response::from_data(pdf)
        .with_header(Header::from_bytes(&b"Content-Type"[..], &b"application/pdf"[..]).unwrap())
        .with_header(
            Header::from_bytes(
                &b"Content-Disposition"[..],
                export::content_disposition(title).as_bytes(),
            )
            .unwrap(),
        );
    if let Err(e) = request.respond(response) {
        warn!("[Server] Failed to send PDF response: {}", e);
    }
}

fn respond_asset(request: Request, path: &str) {
    let candidate = if path.is_empty() { "index.html" } else { path };
    let (name, file) = match Assets::get(candidate) {
        Some(file) => (candidate, file),
        // Unmatched paths fall back to the app shell, SPA-style
        None => match Assets::get("index.html") {
            Some(file) => ("index.html", file),
            None => {
                respond_json(request, 404, json!({ "error": "not found" }));
                return;
            }
        },
    };
    let mime = mime_guess::from_path(name).first_or_octet_stream();
    let response = Response::from_data(file.data.into_owned()).with_header(
        Header::from_bytes(&b"Content-Type"[..], mime.essence_str().as_bytes()).unwrap(),
    );
    if let Err(e) = request.respond(response) {
        warn!("[Server] Failed to send asset {}: {}", name, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    // --- resolve_route tests ---

    #[rstest]
    #[case(Method::Get, "/api/state", Route::State)]
    #[case(Method::Get, "/api/state?cached=0", Route::State)]
    #[case(Method::Get, "/api/state/active", Route::ActiveDocument)]
    #[case(Method::Put, "/api/state/active", Route::SetActive)]
    #[case(Method::Post, "/api/documents", Route::CreateDocument)]
    #[case(Method::Delete, "/api/documents/doc-1-0", Route::DeleteDocument("doc-1-0".into()))]
    #[case(Method::Put, "/api/documents/doc-1-0/content", Route::UpdateContent("doc-1-0".into()))]
    #[case(Method::Put, "/api/documents/doc-1-0/title", Route::UpdateTitle("doc-1-0".into()))]
    #[case(Method::Put, "/api/documents/doc%201/title", Route::UpdateTitle("doc 1".into()))]
    #[case(Method::Get, "/api/settings", Route::GetSettings)]
    #[case(Method::Put, "/api/settings", Route::PutSettings)]
    #[case(Method::Post, "/api/export", Route::Export)]
    fn test_api_routes(#[case] method: Method, #[case] url: &str, #[case] expected: Route) {
        assert_eq!(resolve_route(&method, url), expected);
    }

    #[rstest]
    #[case(Method::Get, "/", Route::Asset(String::new()))]
    #[case(Method::Get, "/index.html", Route::Asset("index.html".into()))]
    #[case(Method::Get, "/style.css", Route::Asset("style.css".into()))]
    #[case(Method::Get, "/app.js?v=2", Route::Asset("app.js".into()))]
    fn test_asset_routes(#[case] method: Method, #[case] url: &str, #[case] expected: Route) {
        assert_eq!(resolve_route(&method, url), expected);
    }

    #[rstest]
    // Unknown or mis-methoded api paths are 404s, never asset lookups
    #[case(Method::Get, "/api/unknown")]
    #[case(Method::Post, "/api/state")]
    #[case(Method::Delete, "/api/documents")]
    #[case(Method::Get, "/api/documents/doc-1-0/content")]
    fn test_api_misses(#[case] method: Method, #[case] url: &str) {
        assert_eq!(resolve_route(&method, url), Route::ApiNotFound);
    }

    #[test]
    fn test_non_get_outside_api_is_not_an_asset() {
        assert_eq!(resolve_route(&Method::Post, "/style.css"), Route::ApiNotFound);
    }

    #[test]
    fn test_embedded_shell_is_present() {
        assert!(Assets::get("index.html").is_some());
        assert!(Assets::get("app.js").is_some());
        assert!(Assets::get("style.css").is_some());
    }
}
