//! Long-lived relay connection with scoped job subscriptions.
//!
//! [`JobWatcher`] owns one background task that connects to the relay,
//! forwards `join-job` / `leave-job` control messages, and applies incoming
//! events to the [`JobView`] of each watched job. When the connection drops
//! it reconnects with exponential backoff and re-joins every job that still
//! has a live [`Subscription`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use onlyvalid_core::job_events::{parse_job_event, ClientMessage};
use onlyvalid_core::types::JobId;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::client::{send_control, ClientError, RelayClient, RelayStream};
use crate::reconnect::{Backoff, ReconnectConfig};
use crate::view::JobView;

/// Upper bound on waiting for the background task at shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Local listener of one job, shared by every subscription to it.
struct Listener {
    view: watch::Sender<JobView>,
    subscriptions: usize,
}

type Listeners = Arc<Mutex<HashMap<JobId, Listener>>>;

fn lock(listeners: &Listeners) -> MutexGuard<'_, HashMap<JobId, Listener>> {
    listeners.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to the background relay connection.
///
/// Dropping the watcher stops the background task; [`shutdown`](Self::shutdown)
/// additionally waits for it to close the socket.
pub struct JobWatcher {
    listeners: Listeners,
    commands: mpsc::UnboundedSender<ClientMessage>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl JobWatcher {
    /// Start the background connection task. Must be called within a Tokio
    /// runtime.
    pub fn start(client: RelayClient, config: ReconnectConfig) -> Self {
        let listeners: Listeners = Arc::new(Mutex::new(HashMap::new()));
        let (commands, command_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_connection_loop(
            client,
            config,
            Arc::clone(&listeners),
            command_rx,
            cancel.clone(),
        ));

        Self {
            listeners,
            commands,
            cancel,
            task: Some(task),
        }
    }

    /// Start watching `job_id`.
    ///
    /// The first subscription to a job registers its listener and sends
    /// `join-job`; further subscriptions share the listener.
    pub fn subscribe(&self, job_id: JobId) -> Subscription {
        let mut listeners = lock(&self.listeners);
        let receiver = match listeners.get_mut(&job_id) {
            Some(listener) => {
                listener.subscriptions += 1;
                listener.view.subscribe()
            }
            None => {
                let (view, receiver) = watch::channel(JobView::new(job_id.clone()));
                listeners.insert(
                    job_id.clone(),
                    Listener {
                        view,
                        subscriptions: 1,
                    },
                );
                let _ = self.commands.send(ClientMessage::JoinJob {
                    job_id: job_id.clone(),
                });
                receiver
            }
        };
        drop(listeners);

        tracing::debug!(job_id = %job_id, "Subscribed to job");
        Subscription {
            job_id,
            receiver,
            listeners: Arc::clone(&self.listeners),
            commands: self.commands.clone(),
        }
    }

    /// Number of jobs with at least one live subscription.
    pub fn watched_jobs(&self) -> usize {
        lock(&self.listeners).len()
    }

    /// Stop the background task and wait for it to close the connection.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await.is_err() {
                tracing::warn!("Job watcher did not stop in time");
            }
        }
        tracing::info!("Job watcher shut down");
    }
}

impl Drop for JobWatcher {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// A scoped subscription to one job.
///
/// Dropping it unregisters the local listener and then, if no other
/// subscription watches the job, sends `leave-job`.
pub struct Subscription {
    job_id: JobId,
    receiver: watch::Receiver<JobView>,
    listeners: Listeners,
    commands: mpsc::UnboundedSender<ClientMessage>,
}

impl Subscription {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Snapshot of the latest state.
    pub fn current(&self) -> JobView {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change and return the new state.
    pub async fn changed(&mut self) -> Result<JobView, ClientError> {
        self.receiver
            .changed()
            .await
            .map_err(|_| ClientError::Closed)?;
        Ok(self.receiver.borrow_and_update().clone())
    }

    /// Wait until the job completes or fails.
    pub async fn wait_terminal(&mut self) -> Result<JobView, ClientError> {
        loop {
            let view = self.receiver.borrow_and_update().clone();
            if view.is_terminal() {
                return Ok(view);
            }
            self.receiver
                .changed()
                .await
                .map_err(|_| ClientError::Closed)?;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut listeners = lock(&self.listeners);
        let Some(listener) = listeners.get_mut(&self.job_id) else {
            return;
        };
        listener.subscriptions -= 1;
        if listener.subscriptions > 0 {
            return;
        }
        listeners.remove(&self.job_id);
        // Sent while holding the lock; `run_session` drains commands under it.
        let _ = self.commands.send(ClientMessage::LeaveJob {
            job_id: self.job_id.clone(),
        });
        drop(listeners);

        tracing::debug!(job_id = %self.job_id, "Unsubscribed from job");
    }
}

// ---------------------------------------------------------------------------
// Background task
// ---------------------------------------------------------------------------

enum SessionEnd {
    /// The connection dropped; reconnect.
    Disconnected,
    /// Cancelled, or every handle is gone.
    Stopped,
}

/// Connect -> run session -> reconnect, until cancelled.
async fn run_connection_loop(
    client: RelayClient,
    config: ReconnectConfig,
    listeners: Listeners,
    mut commands: mpsc::UnboundedReceiver<ClientMessage>,
    cancel: CancellationToken,
) {
    let mut backoff = Backoff::new(config);

    loop {
        let connected = tokio::select! {
            _ = cancel.cancelled() => break,
            result = client.connect() => result,
        };

        match connected {
            Ok(stream) => {
                if backoff.failures() > 0 {
                    tracing::info!(
                        url = client.url(),
                        attempts = backoff.failures(),
                        "Reconnected to job relay",
                    );
                }
                backoff.reset();
                match run_session(stream, &listeners, &mut commands, &cancel).await {
                    SessionEnd::Stopped => break,
                    SessionEnd::Disconnected => {
                        tracing::info!(url = client.url(), "Relay connection lost, reconnecting");
                    }
                }
            }
            Err(e) => {
                let delay = backoff.fail();
                tracing::warn!(
                    url = client.url(),
                    attempt = backoff.failures(),
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "Relay connection failed",
                );
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    finish(&listeners);
}

/// Drop every listener so pending [`Subscription::changed`] calls fail.
fn finish(listeners: &Listeners) {
    lock(listeners).clear();
    tracing::info!("Job watcher stopped");
}

/// Serve one connection: join live jobs, then forward control messages
/// and apply events until the connection ends.
async fn run_session(
    stream: RelayStream,
    listeners: &Listeners,
    commands: &mut mpsc::UnboundedReceiver<ClientMessage>,
    cancel: &CancellationToken,
) -> SessionEnd {
    let (mut sink, mut source) = stream.split();

    // A fresh connection holds no memberships, so joining every live
    // listener supersedes whatever was queued before it opened.
    let live: Vec<JobId> = {
        let listeners = lock(listeners);
        while commands.try_recv().is_ok() {}
        listeners.keys().cloned().collect()
    };
    for job_id in live {
        if let Err(e) = send_control(&mut sink, &ClientMessage::JoinJob { job_id }).await {
            tracing::debug!(error = %e, "Failed to join job");
            return SessionEnd::Disconnected;
        }
    }

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.close().await;
                return SessionEnd::Stopped;
            }
            command = commands.recv() => match command {
                Some(message) => {
                    if let Err(e) = send_control(&mut sink, &message).await {
                        tracing::debug!(error = %e, job_id = %message.job_id(), "Failed to send control message");
                        return SessionEnd::Disconnected;
                    }
                }
                None => {
                    let _ = sink.close().await;
                    return SessionEnd::Stopped;
                }
            },
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => dispatch(listeners, &text),
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(?frame, "Relay closed the connection");
                    return SessionEnd::Disconnected;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Relay receive error");
                    return SessionEnd::Disconnected;
                }
                None => return SessionEnd::Disconnected,
            },
        }
    }
}

/// Apply one relay frame to the listener of its job, if any.
fn dispatch(listeners: &Listeners, text: &str) {
    let event = match parse_job_event(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring unrecognised relay frame");
            return;
        }
    };

    let listeners = lock(listeners);
    match listeners.get(event.job_id()) {
        Some(listener) => {
            listener.view.send_if_modified(|view| view.apply(&event));
        }
        None => {
            tracing::trace!(job_id = %event.job_id(), "Event for a job nobody watches");
        }
    }
}
