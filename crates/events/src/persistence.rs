//! Mirrors relayed job events into the `verification_jobs` table.
//!
//! [`JobPersistence::persist`] applies one event as a status transition.
//! Terminal events are persisted by the ingest handlers before they are
//! relayed. [`JobPersistence::run`] follows the
//! [`EventBus`](crate::bus::EventBus) for progress snapshots only; a lagged
//! receiver loses snapshots that later ones supersede.

use onlyvalid_core::job_events::JobEvent;
use onlyvalid_db::repositories::JobRepo;
use onlyvalid_db::DbPool;
use tokio::sync::broadcast;

/// Background service that persists job snapshots.
pub struct JobPersistence;

impl JobPersistence {
    /// Store progress snapshots from the bus until it is dropped.
    pub async fn run(pool: DbPool, mut receiver: broadcast::Receiver<JobEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) if event.is_terminal() => {}
                Ok(event) => {
                    if let Err(e) = Self::persist(&pool, &event).await {
                        tracing::error!(
                            error = %e,
                            job_id = %event.job_id(),
                            event = event.name(),
                            "Failed to persist job event"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        skipped = n,
                        "Job persistence lagged, some progress snapshots were not stored"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, job persistence shutting down");
                    break;
                }
            }
        }
    }

    /// Apply one event. Events for unknown or already finished jobs change
    /// nothing and are logged at debug.
    pub async fn persist(pool: &DbPool, event: &JobEvent) -> Result<(), sqlx::Error> {
        let applied = match event {
            JobEvent::Progress(e) => {
                JobRepo::update_progress(pool, &e.job_id, &e.counters, e.percentage).await?
            }
            JobEvent::Completed(e) => {
                JobRepo::complete(pool, &e.job_id, &e.counters, e.percentage, e.completed_at)
                    .await?
            }
            JobEvent::Failed(e) => {
                let refund = JobRepo::fail_and_refund(pool, &e.job_id, &e.error, e.failed_at).await?;
                if let Some(credits) = refund.filter(|c| *c > 0) {
                    tracing::info!(job_id = %e.job_id, credits, "Refunded unprocessed credits");
                }
                refund.is_some()
            }
        };

        if !applied {
            tracing::debug!(
                job_id = %event.job_id(),
                event = event.name(),
                "Job unknown or already terminal, snapshot not stored"
            );
        }
        Ok(())
    }
}
