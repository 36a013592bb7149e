//! Pathed WebSocket fan-out.
//!
//! One mutex guards the per-path connection lists. A broadcast snapshots
//! the list under the lock, sends without holding it, then reacquires
//! only to prune connections whose send failed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use axum::extract::ws::Message;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

struct Connection {
    id: u64,
    sender: UnboundedSender<Message>,
}

pub struct WsHub {
    connections: Mutex<HashMap<String, Vec<Connection>>>,
    next_id: AtomicU64,
}

impl WsHub {
    pub fn new() -> Self {
        Self { connections: Mutex::new(HashMap::new()), next_id: AtomicU64::new(0) }
    }

    /// Registers a connection under `path`; returns an id for `disconnect`.
    pub fn connect(&self, path: &str, sender: UnboundedSender<Message>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut connections = self.connections.lock().unwrap_or_else(|e| e.into_inner());
        connections.entry(path.to_string()).or_default().push(Connection { id, sender });
        id
    }

    pub fn disconnect(&self, path: &str, id: u64) {
        let mut connections = self.connections.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(list) = connections.get_mut(path) {
            list.retain(|c| c.id != id);
        }
    }

    pub async fn broadcast_to_path(&self, path: &str, text: String) {
        let senders: Vec<(u64, UnboundedSender<Message>)> = {
            let connections = self.connections.lock().unwrap_or_else(|e| e.into_inner());
            connections.get(path).map(|list| list.iter().map(|c| (c.id, c.sender.clone())).collect()).unwrap_or_default()
        };

        let mut dead = Vec::new();
        for (id, sender) in senders {
            if sender.send(Message::Text(text.clone())).is_err() {
                dead.push(id);
            }
        }

        if !dead.is_empty() {
            let mut connections = self.connections.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(list) = connections.get_mut(path) {
                list.retain(|c| !dead.contains(&c.id));
            }
            debug!(path, pruned = dead.len(), "pruned dead connections");
        }
    }

    pub async fn broadcast_json_to_path(&self, path: &str, value: impl Serialize) {
        match serde_json::to_string(&value) {
            Ok(text) => self.broadcast_to_path(path, text).await,
            Err(err) => tracing::warn!(%err, "failed to serialize broadcast payload"),
        }
    }

    /// Sends directly to one connection, bypassing the broadcast fan-out.
    /// Used for the control socket's per-request reply.
    pub fn send_to_connection(&self, path: &str, id: u64, message: Message) -> Result<(), ()> {
        let connections = self.connections.lock().unwrap_or_else(|e| e.into_inner());
        let Some(list) = connections.get(path) else { return Err(()) };
        match list.iter().find(|c| c.id == id) {
            Some(conn) => conn.sender.send(message).map_err(|_| ()),
            None => Err(()),
        }
    }

    pub fn connection_count(&self, path: &str) -> usize {
        let connections = self.connections.lock().unwrap_or_else(|e| e.into_inner());
        connections.get(path).map(Vec::len).unwrap_or(0)
    }
}

impl Default for WsHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn broadcast_prunes_closed_connections() {
        let hub = WsHub::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let id = hub.connect("/ws/subtitles", tx);
        drop(rx);

        hub.broadcast_to_path("/ws/subtitles", "hello".to_string()).await;
        assert_eq!(hub.connection_count("/ws/subtitles"), 0);
        let _ = id;
    }

    #[tokio::test]
    async fn disconnect_removes_connection() {
        let hub = WsHub::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = hub.connect("/ws/danmaku", tx);
        assert_eq!(hub.connection_count("/ws/danmaku"), 1);
        hub.disconnect("/ws/danmaku", id);
        assert_eq!(hub.connection_count("/ws/danmaku"), 0);
    }
}
