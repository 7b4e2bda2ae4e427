// =============================================================================
// WebSocket Fan-out — C8
// =============================================================================
//
// A user may have more than one tab open, so each user id maps to zero or
// more connection handles. `send_to_user`/`broadcast` push an envelope onto
// every matching handle's channel; the connection task owns turning that
// channel into actual socket writes (see api::ws_handler) and is
// responsible for pruning itself out of the registry on disconnect.
// =============================================================================

use std::collections::HashMap;

use axum::extract::ws::Message;
use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

/// One open socket belonging to a user. Sending is fire-and-forget: if the
/// receiving task has already dropped, the send silently fails and the
/// connection is left for the owning task to prune.
#[derive(Clone)]
pub struct ConnectionHandle {
    id: u64,
    sender: UnboundedSender<Message>,
}

impl ConnectionHandle {
    fn send(&self, message: &Envelope) -> bool {
        let Ok(text) = serde_json::to_string(message) else {
            return false;
        };
        self.sender.send(Message::Text(text)).is_ok()
    }
}

#[derive(Debug, Serialize)]
struct Envelope<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    channel: &'a str,
    timestamp: String,
    payload: serde_json::Value,
}

#[derive(Default)]
pub struct Registry {
    connections: Mutex<HashMap<i64, Vec<ConnectionHandle>>>,
    next_id: Mutex<u64>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection for `user_id` and return a handle that
    /// identifies it for later removal.
    pub fn connect(&self, user_id: i64, sender: UnboundedSender<Message>) -> u64 {
        let id = {
            let mut next_id = self.next_id.lock();
            let id = *next_id;
            *next_id += 1;
            id
        };
        self.connections
            .lock()
            .entry(user_id)
            .or_default()
            .push(ConnectionHandle { id, sender });
        debug!(user_id, connection_id = id, "websocket connected");
        id
    }

    pub fn disconnect(&self, user_id: i64, connection_id: u64) {
        let mut connections = self.connections.lock();
        if let Some(handles) = connections.get_mut(&user_id) {
            handles.retain(|h| h.id != connection_id);
            if handles.is_empty() {
                connections.remove(&user_id);
            }
        }
        debug!(user_id, connection_id, "websocket disconnected");
    }

    /// Push an envelope to every connection owned by `user_id`. Dead
    /// channels are pruned inline.
    pub fn send_to_user(&self, user_id: i64, message_type: &str, channel: &str, payload: serde_json::Value) {
        let envelope = Envelope {
            kind: message_type,
            channel,
            timestamp: Utc::now().to_rfc3339(),
            payload,
        };

        let mut connections = self.connections.lock();
        if let Some(handles) = connections.get_mut(&user_id) {
            handles.retain(|h| h.send(&envelope));
            if handles.is_empty() {
                connections.remove(&user_id);
            }
        }
    }

    /// Push an envelope to every connected user.
    pub fn broadcast(&self, message_type: &str, channel: &str, payload: serde_json::Value) {
        let user_ids: Vec<i64> = self.connections.lock().keys().copied().collect();
        for user_id in user_ids {
            self.send_to_user(user_id, message_type, channel, payload.clone());
        }
    }

    pub fn connection_count(&self, user_id: i64) -> usize {
        self.connections
            .lock()
            .get(&user_id)
            .map(|h| h.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_then_send_delivers_envelope() {
        let registry = Registry::new();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        registry.connect(1, tx);

        registry.send_to_user(1, "session.status", "trading", serde_json::json!({"ok": true}));

        let msg = rx.try_recv().expect("expected a queued message");
        let Message::Text(text) = msg else { panic!("expected text frame") };
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "session.status");
        assert_eq!(value["channel"], "trading");
        assert_eq!(value["payload"]["ok"], true);
    }

    // Invariant 7 — every user that has connected receives broadcasts.
    #[test]
    fn broadcast_reaches_every_connected_user() {
        let registry = Registry::new();
        let (tx1, mut rx1) = tokio::sync::mpsc::unbounded_channel();
        let (tx2, mut rx2) = tokio::sync::mpsc::unbounded_channel();
        registry.connect(1, tx1);
        registry.connect(2, tx2);

        registry.broadcast("system.notice", "system", serde_json::json!({"msg": "hi"}));

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn disconnect_removes_handle() {
        let registry = Registry::new();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let id = registry.connect(1, tx);
        assert_eq!(registry.connection_count(1), 1);

        registry.disconnect(1, id);
        assert_eq!(registry.connection_count(1), 0);
    }

    #[test]
    fn send_to_user_with_no_connections_is_a_no_op() {
        let registry = Registry::new();
        registry.send_to_user(99, "x", "y", serde_json::json!({}));
    }

    #[test]
    fn dead_receiver_is_pruned_on_send() {
        let registry = Registry::new();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        registry.connect(1, tx);
        drop(rx);

        registry.send_to_user(1, "x", "y", serde_json::json!({}));
        assert_eq!(registry.connection_count(1), 0);
    }
}
