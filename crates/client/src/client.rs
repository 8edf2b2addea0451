//! WebSocket connection to the relay endpoint.

use futures::{Sink, SinkExt};
use onlyvalid_core::job_events::ClientMessage;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// A live relay connection.
pub type RelayStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Connection settings for one relay endpoint.
///
/// Create a [`RelayStream`] by calling [`connect`](Self::connect).
#[derive(Debug, Clone)]
pub struct RelayClient {
    url: String,
}

impl RelayClient {
    /// `url` is the full WebSocket URL, e.g. `ws://host:3000/api/v1/ws`.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Open a new connection. No channel is joined yet.
    pub async fn connect(&self) -> Result<RelayStream, ClientError> {
        let (stream, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| ClientError::Connection(format!("{}: {e}", self.url)))?;

        tracing::info!(url = %self.url, "Connected to job relay");
        Ok(stream)
    }
}

/// Serialize and send one control message.
pub async fn send_control<S>(sink: &mut S, message: &ClientMessage) -> Result<(), ClientError>
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let text = serde_json::to_string(message)?;
    sink.send(Message::text(text))
        .await
        .map_err(|e| ClientError::Protocol(e.to_string()))
}

/// Errors of the relay client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Failed to establish the WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A send failed on an established connection.
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Failed to encode control message: {0}")]
    Encode(#[from] serde_json::Error),

    /// The watcher stopped; no further updates will arrive.
    #[error("Job watcher closed")]
    Closed,
}
