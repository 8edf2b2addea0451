use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use onlyvalid_core::job_events::{parse_client_message, ClientMessage};
use onlyvalid_events::ChannelRegistry;

use crate::state::AppState;
use crate::ws::manager::ConnId;

/// GET /api/v1/ws
///
/// Upgrades to a WebSocket. The client then sends `join-job` / `leave-job`
/// frames and receives the events of every job it has joined.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Manage a single WebSocket connection after upgrade.
///
///   1. Registers the connection with `WsManager`.
///   2. Spawns a writer task that drains the connection's queue in order.
///   3. Applies inbound control messages to the channel registry.
///   4. On disconnect releases every membership, then unregisters.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id: ConnId = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "WebSocket connected");

    let mut rx = state.ws_manager.add(conn_id.clone()).await;

    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                handle_client_message(&state.registry, &conn_id, text.as_str()).await;
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    let released = state.registry.leave_all(&conn_id).await;
    let connected_for = state.ws_manager.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(
        conn_id = %conn_id,
        released,
        connected_secs = connected_for.map(|d| d.num_seconds()),
        "WebSocket disconnected"
    );
}

/// Apply one inbound text frame. Malformed frames are logged and ignored.
async fn handle_client_message(registry: &ChannelRegistry<ConnId>, conn_id: &ConnId, text: &str) {
    match parse_client_message(text) {
        Ok(ClientMessage::JoinJob { job_id }) => {
            let added = registry.join(&job_id, conn_id.clone()).await;
            tracing::debug!(conn_id = %conn_id, job_id = %job_id, added, "Joined job channel");
        }
        Ok(ClientMessage::LeaveJob { job_id }) => {
            let removed = registry.leave(&job_id, conn_id).await;
            tracing::debug!(conn_id = %conn_id, job_id = %job_id, removed, "Left job channel");
        }
        Err(e) => {
            tracing::debug!(conn_id = %conn_id, error = %e, "Ignoring malformed client message");
        }
    }
}
