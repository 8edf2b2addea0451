//! `JobWatcher` against a local stand-in relay.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

use assert_matches::assert_matches;
use futures::{SinkExt, StreamExt};
use onlyvalid_client::{ClientError, JobState, JobWatcher, ReconnectConfig, RelayClient};
use onlyvalid_core::job::JobCounters;
use onlyvalid_core::job_events::{parse_client_message, ClientMessage, JobEvent};
use onlyvalid_core::types::JobId;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Server side of one accepted client connection.
struct Connection {
    /// Control messages received from the client.
    incoming: mpsc::UnboundedReceiver<ClientMessage>,
    /// Frames to push to the client. Dropping it closes the connection.
    outgoing: mpsc::UnboundedSender<Message>,
}

impl Connection {
    async fn next_control(&mut self) -> ClientMessage {
        tokio::time::timeout(WAIT, self.incoming.recv())
            .await
            .expect("timed out waiting for a control message")
            .expect("connection closed")
    }

    /// Assert the client sends nothing further for a short while.
    async fn assert_quiet(&mut self) {
        let extra = tokio::time::timeout(Duration::from_millis(200), self.incoming.recv()).await;
        assert!(extra.is_err(), "unexpected control message: {extra:?}");
    }

    fn push(&self, event: &JobEvent) {
        let text = serde_json::to_string(event).unwrap();
        self.outgoing.send(Message::text(text)).unwrap();
    }
}

/// Accept WebSocket clients and hand each connection to the test.
async fn spawn_relay() -> (SocketAddr, mpsc::UnboundedReceiver<Connection>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (conn_tx, conn_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            let (mut sink, mut source) = ws.split();
            let (in_tx, in_rx) = mpsc::unbounded_channel();
            let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();

            tokio::spawn(async move {
                while let Some(msg) = out_rx.recv().await {
                    if sink.send(msg).await.is_err() {
                        return;
                    }
                }
                let _ = sink.close().await;
            });
            tokio::spawn(async move {
                while let Some(Ok(msg)) = source.next().await {
                    if let Message::Text(text) = msg {
                        if let Ok(control) = parse_client_message(&text) {
                            let _ = in_tx.send(control);
                        }
                    }
                }
            });

            let _ = conn_tx.send(Connection {
                incoming: in_rx,
                outgoing: out_tx,
            });
        }
    });

    (addr, conn_rx)
}

async fn next_connection(connections: &mut mpsc::UnboundedReceiver<Connection>) -> Connection {
    tokio::time::timeout(WAIT, connections.recv())
        .await
        .expect("timed out waiting for a connection")
        .unwrap()
}

fn fast_reconnect() -> ReconnectConfig {
    ReconnectConfig {
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        factor: 2,
    }
}

fn start_watcher(addr: SocketAddr) -> JobWatcher {
    JobWatcher::start(
        RelayClient::new(format!("ws://{addr}/api/v1/ws")),
        fast_reconnect(),
    )
}

fn join(id: &str) -> ClientMessage {
    ClientMessage::JoinJob { job_id: id.into() }
}

fn leave(id: &str) -> ClientMessage {
    ClientMessage::LeaveJob { job_id: id.into() }
}

fn counters(processed: i64, total: i64) -> JobCounters {
    JobCounters {
        total,
        processed,
        valid: processed,
        invalid: 0,
        unknown: 0,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn subscription_tracks_progress_until_terminal() {
    let (addr, mut connections) = spawn_relay().await;
    let watcher = start_watcher(addr);
    let mut subscription = watcher.subscribe("job-42".into());

    let mut conn = next_connection(&mut connections).await;
    assert_eq!(conn.next_control().await, join("job-42"));

    conn.push(&JobEvent::progress(
        "job-42".into(),
        JobCounters {
            total: 3,
            processed: 2,
            valid: 2,
            invalid: 0,
            unknown: 1,
        },
    ));
    let view = tokio::time::timeout(WAIT, subscription.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(view.percentage(), Some(67));
    assert_eq!(view.counters().map(|c| c.unknown), Some(1));

    conn.push(&JobEvent::completed("job-42".into(), counters(3, 3)));
    conn.push(&JobEvent::progress("job-42".into(), counters(1, 3)));

    let view = tokio::time::timeout(WAIT, subscription.wait_terminal())
        .await
        .unwrap()
        .unwrap();
    assert_matches!(view.state(), JobState::Completed(_));

    // The late progress frame is ignored.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_matches!(subscription.current().state(), JobState::Completed(_));

    watcher.shutdown().await;
}

#[tokio::test]
async fn events_for_other_jobs_do_not_touch_the_view() {
    let (addr, mut connections) = spawn_relay().await;
    let watcher = start_watcher(addr);
    let mut first = watcher.subscribe("job-1".into());
    let second = watcher.subscribe("job-2".into());

    let mut conn = next_connection(&mut connections).await;
    conn.next_control().await;
    conn.next_control().await;

    conn.push(&JobEvent::progress("job-1".into(), counters(1, 4)));
    conn.push(&JobEvent::progress("job-3".into(), counters(1, 4)));

    let view = tokio::time::timeout(WAIT, first.changed()).await.unwrap().unwrap();
    assert_eq!(view.job_id(), &JobId::from("job-1"));
    assert_eq!(second.current().state(), &JobState::Waiting);

    watcher.shutdown().await;
}

#[tokio::test]
async fn dropping_last_subscription_sends_leave() {
    let (addr, mut connections) = spawn_relay().await;
    let watcher = start_watcher(addr);

    let a = watcher.subscribe("job-1".into());
    let b = watcher.subscribe("job-1".into());
    let mut conn = next_connection(&mut connections).await;
    assert_eq!(conn.next_control().await, join("job-1"));
    assert_eq!(watcher.watched_jobs(), 1);

    drop(a);
    assert_eq!(watcher.watched_jobs(), 1);

    drop(b);
    assert_eq!(watcher.watched_jobs(), 0);
    assert_eq!(conn.next_control().await, leave("job-1"));
    conn.assert_quiet().await;

    watcher.shutdown().await;
}

#[tokio::test]
async fn reconnect_rejoins_live_subscriptions() {
    let (addr, mut connections) = spawn_relay().await;
    let watcher = start_watcher(addr);
    let _one = watcher.subscribe("job-1".into());
    let mut two = watcher.subscribe("job-2".into());
    let dropped = watcher.subscribe("job-3".into());

    let mut conn = next_connection(&mut connections).await;
    for _ in 0..3 {
        conn.next_control().await;
    }
    drop(dropped);
    assert_eq!(conn.next_control().await, leave("job-3"));

    // Server goes away.
    drop(conn);

    let mut conn = next_connection(&mut connections).await;
    let rejoined: HashSet<ClientMessage> = [conn.next_control().await, conn.next_control().await]
        .into_iter()
        .collect();
    assert_eq!(rejoined, HashSet::from([join("job-1"), join("job-2")]));
    conn.assert_quiet().await;

    conn.push(&JobEvent::failed("job-2".into(), "engine crashed"));
    let view = tokio::time::timeout(WAIT, two.wait_terminal()).await.unwrap().unwrap();
    assert_eq!(view.error(), Some("engine crashed"));

    watcher.shutdown().await;
}

#[tokio::test]
async fn subscriptions_made_before_connecting_join_once() {
    let (addr, mut connections) = spawn_relay().await;
    let watcher = start_watcher(addr);
    let _one = watcher.subscribe("job-1".into());
    let _two = watcher.subscribe("job-2".into());
    drop(watcher.subscribe("job-3".into()));

    let mut conn = next_connection(&mut connections).await;
    let joined: HashSet<ClientMessage> = [conn.next_control().await, conn.next_control().await]
        .into_iter()
        .collect();
    assert_eq!(joined, HashSet::from([join("job-1"), join("job-2")]));
    conn.assert_quiet().await;

    watcher.shutdown().await;
}

#[tokio::test]
async fn subscription_made_across_a_reconnect_joins_once() {
    let (addr, mut connections) = spawn_relay().await;
    let watcher = start_watcher(addr);
    let _one = watcher.subscribe("job-1".into());

    let conn = next_connection(&mut connections).await;
    drop(conn);
    let _two = watcher.subscribe("job-2".into());

    let mut conn = next_connection(&mut connections).await;
    let joined: HashSet<ClientMessage> = [conn.next_control().await, conn.next_control().await]
        .into_iter()
        .collect();
    assert_eq!(joined, HashSet::from([join("job-1"), join("job-2")]));
    conn.assert_quiet().await;

    watcher.shutdown().await;
}

#[tokio::test]
async fn shutdown_closes_pending_subscriptions() {
    let (addr, mut connections) = spawn_relay().await;
    let watcher = start_watcher(addr);
    let mut subscription = watcher.subscribe("job-1".into());
    next_connection(&mut connections).await.next_control().await;

    watcher.shutdown().await;

    let result = tokio::time::timeout(WAIT, subscription.changed()).await.unwrap();
    assert_matches!(result, Err(ClientError::Closed));
}
