//! Fan-out of job events to the members of a job's channel.
//!
//! [`JobEmitter::emit`] is fire-and-forget: it snapshots the channel's
//! members, serializes the event once, and queues the same frame on each
//! member's connection. There is no acknowledgement, retry, or buffering
//! for subscribers that join later. The event is then published on the
//! [`EventBus`] for progress snapshots and webhooks.

use std::sync::Arc;

use axum::extract::ws::Message;
use onlyvalid_core::job::JobCounters;
use onlyvalid_core::job_events::JobEvent;
use onlyvalid_core::types::JobId;
use onlyvalid_events::{ChannelRegistry, EventBus};

use crate::ws::{ConnId, WsManager};

pub struct JobEmitter {
    registry: Arc<ChannelRegistry<ConnId>>,
    ws_manager: Arc<WsManager>,
    event_bus: Arc<EventBus>,
}

impl JobEmitter {
    pub fn new(
        registry: Arc<ChannelRegistry<ConnId>>,
        ws_manager: Arc<WsManager>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            registry,
            ws_manager,
            event_bus,
        }
    }

    /// Relay `event` to every current member of its job's channel.
    ///
    /// Returns the number of connections the frame was queued on. With no
    /// members the event is dropped for WebSocket subscribers.
    pub async fn emit(&self, event: JobEvent) -> usize {
        let job_id = event.job_id();
        let members = self.registry.members_of(job_id).await;

        let delivered = if members.is_empty() {
            tracing::debug!(job_id = %job_id, event = event.name(), "No subscribers, event dropped");
            0
        } else {
            match serde_json::to_string(&event) {
                Ok(text) => {
                    self.ws_manager
                        .send_to_many(&members, Message::Text(text.into()))
                        .await
                }
                Err(e) => {
                    tracing::error!(job_id = %job_id, error = %e, "Failed to serialize job event");
                    0
                }
            }
        };

        tracing::debug!(
            job_id = %job_id,
            event = event.name(),
            members = members.len(),
            delivered,
            "Job event emitted"
        );

        self.event_bus.publish(event);
        delivered
    }

    /// Emit a progress snapshot; the percentage is derived here.
    pub async fn progress(&self, job_id: JobId, counters: JobCounters) -> usize {
        self.emit(JobEvent::progress(job_id, counters)).await
    }
}
