// WebSocket state bridge - pushes store snapshots to every connected UI
// window so multiple windows on the same session stay in sync.
// One-way: inbound frames are drained and ignored.

use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use log::{info, warn};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::state::EditorState;

struct SharedState {
    peers: Mutex<Vec<mpsc::UnboundedSender<Message>>>,
}

pub struct EventBridge {
    port: u16,
    state: Arc<SharedState>,
}

impl EventBridge {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            state: Arc::new(SharedState {
                peers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Accept loop on a dedicated thread with its own runtime; the HTTP
    /// side stays synchronous and just calls `broadcast_state`.
    pub fn start(self: Arc<Self>) {
        let bridge = self.clone();
        std::thread::spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    warn!("[Events] Failed to build runtime: {}", e);
                    return;
                }
            };

            runtime.block_on(async move {
                let addr = format!("127.0.0.1:{}", bridge.port);
                let listener = match TcpListener::bind(&addr).await {
                    Ok(listener) => listener,
                    Err(e) => {
                        warn!("[Events] Failed to bind {}: {}", addr, e);
                        return;
                    }
                };

                info!("[Events] Bridge listening on ws://{}", addr);

                while let Ok((stream, _addr)) = listener.accept().await {
                    let bridge = bridge.clone();
                    tokio::spawn(async move {
                        bridge.handle_connection(stream).await;
                    });
                }
            });
        });
    }

    async fn handle_connection(&self, stream: TcpStream) {
        let ws_stream = match tokio_tungstenite::accept_async(stream).await {
            Ok(ws_stream) => ws_stream,
            Err(_) => return, // not a websocket client
        };
        let (mut write, mut read) = ws_stream.split();

        // Channel for messages TO this peer
        let (tx, mut rx) = mpsc::unbounded_channel();

        {
            let mut peers = self.state.peers.lock().unwrap();
            peers.push(tx.clone());
        }

        let forward_task = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if write.send(msg).await.is_err() {
                    break;
                }
            }
        });

        // Drain inbound frames until the peer goes away
        while let Some(msg) = read.next().await {
            match msg {
                Ok(m) if m.is_close() => break,
                Ok(_) => {}
                Err(_) => break,
            }
        }

        {
            let mut peers = self.state.peers.lock().unwrap();
            peers.retain(|peer| !peer.same_channel(&tx));
        }
        forward_task.abort();
    }

    /// Fan the current state out to every connected window. Non-blocking
    /// (unbounded channel sends); peers that went away are pruned here.
    pub fn broadcast_state(&self, editor: &EditorState) {
        let payload = json!({ "type": "state", "state": editor });
        let text = match serde_json::to_string(&payload) {
            Ok(text) => text,
            Err(e) => {
                warn!("[Events] Failed to serialize state broadcast: {}", e);
                return;
            }
        };

        let mut peers = self.state.peers.lock().unwrap();
        peers.retain(|peer| peer.send(Message::text(text.clone())).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::documents::add_document;

    #[test]
    fn test_broadcast_without_peers_is_harmless() {
        let bridge = EventBridge::new(0);
        let mut editor = EditorState::default();
        add_document(&mut editor);
        bridge.broadcast_state(&editor);
    }
}
