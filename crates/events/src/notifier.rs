//! Completion webhooks.
//!
//! [`JobNotifier`] listens on the event bus for terminal events and, when
//! the job was created with a `webhook_url`, delivers the event there in a
//! detached task so slow endpoints never hold up the bus.

use std::sync::Arc;

use onlyvalid_core::job_events::JobEvent;
use onlyvalid_db::repositories::JobRepo;
use onlyvalid_db::DbPool;
use tokio::sync::broadcast;

use crate::delivery::webhook::WebhookDelivery;

pub struct JobNotifier {
    pool: DbPool,
    delivery: Arc<WebhookDelivery>,
}

impl JobNotifier {
    pub fn new(pool: DbPool, delivery: Arc<WebhookDelivery>) -> Self {
        Self { pool, delivery }
    }

    /// Run until the bus is dropped.
    pub async fn run(self, mut receiver: broadcast::Receiver<JobEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) if event.is_terminal() => self.dispatch(event).await,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Job notifier lagged, some webhooks were not sent");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, job notifier shutting down");
                    break;
                }
            }
        }
    }

    async fn dispatch(&self, event: JobEvent) {
        let job = match JobRepo::find_by_id(&self.pool, event.job_id()).await {
            Ok(Some(job)) => job,
            Ok(None) => return,
            Err(e) => {
                tracing::error!(error = %e, job_id = %event.job_id(), "Failed to load job for webhook");
                return;
            }
        };
        let (Some(url), Some(secret)) = (job.webhook_url, job.webhook_secret) else {
            return;
        };

        let delivery = Arc::clone(&self.delivery);
        tokio::spawn(async move {
            if delivery.deliver(&url, &secret, &event).await.is_ok() {
                tracing::info!(job_id = %event.job_id(), event = event.name(), "Webhook delivered");
            }
        });
    }
}
