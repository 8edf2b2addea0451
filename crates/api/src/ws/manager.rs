use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::ws::Message;
use onlyvalid_core::types::Timestamp;
use tokio::sync::{mpsc, RwLock};

/// Identifier of one WebSocket connection (a UUID v4 string).
pub type ConnId = String;

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// A registered connection.
pub struct WsConnection {
    /// Outbound queue, drained in order by the connection's writer task.
    pub sender: WsSender,
    pub connected_at: Timestamp,
}

/// Manages all active WebSocket connections.
///
/// Each connection owns one unbounded queue, so sends never wait on the
/// network and per-connection order is the order of `send` calls. Wrapped
/// in `Arc` and shared across the application.
pub struct WsManager {
    connections: RwLock<HashMap<ConnId, WsConnection>>,
}

impl WsManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection.
    ///
    /// Returns the receiver half of the message channel so the caller can
    /// forward messages to the WebSocket sink.
    pub async fn add(&self, conn_id: ConnId) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = WsConnection {
            sender: tx,
            connected_at: chrono::Utc::now(),
        };
        self.connections.write().await.insert(conn_id, conn);
        rx
    }

    /// Remove a connection, returning how long it was open.
    pub async fn remove(&self, conn_id: &str) -> Option<chrono::Duration> {
        self.connections
            .write()
            .await
            .remove(conn_id)
            .map(|conn| chrono::Utc::now() - conn.connected_at)
    }

    /// Queue the same message for each of `conn_ids`.
    ///
    /// Unknown or closed connections are skipped; they are cleaned up when
    /// their receive loop ends. Returns the number of queues that accepted
    /// the message.
    pub async fn send_to_many(&self, conn_ids: &[ConnId], message: Message) -> usize {
        let conns = self.connections.read().await;
        conn_ids
            .iter()
            .filter_map(|id| conns.get(id))
            .filter(|conn| conn.sender.send(message.clone()).is_ok())
            .count()
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a Close frame to every connection, then clear the map.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Send a Ping frame to every connected client.
    pub async fn ping_all(&self) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}
