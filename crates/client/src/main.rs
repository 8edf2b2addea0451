//! `onlyvalid-watch`: print live progress of one verification job.
//!
//! Reads `RELAY_WS_URL` (default `ws://localhost:3000/api/v1/ws`) and
//! `JOB_ID` (or the first argument) and exits once the job completes or
//! fails.

use anyhow::Context;
use onlyvalid_client::{JobState, JobView, JobWatcher, ReconnectConfig, RelayClient};
use onlyvalid_core::types::JobId;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_RELAY_URL: &str = "ws://localhost:3000/api/v1/ws";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "onlyvalid_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let url = std::env::var("RELAY_WS_URL").unwrap_or_else(|_| DEFAULT_RELAY_URL.to_string());
    let job_id = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("JOB_ID").ok())
        .filter(|id| !id.trim().is_empty())
        .context("Pass a job id as the first argument or set JOB_ID")?;
    let job_id = JobId::new(job_id);

    let watcher = JobWatcher::start(RelayClient::new(url), ReconnectConfig::default());
    let mut subscription = watcher.subscribe(job_id.clone());
    tracing::info!(job_id = %job_id, "Watching job");

    let outcome = loop {
        let result = tokio::select! {
            result = subscription.changed() => result,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break None;
            }
        };
        let view = result?;
        println!("{}", describe(&view));
        if view.is_terminal() {
            break Some(view);
        }
    };

    drop(subscription);
    watcher.shutdown().await;

    if let Some(error) = outcome.as_ref().and_then(JobView::error) {
        anyhow::bail!("Job {job_id} failed: {error}");
    }
    Ok(())
}

fn describe(view: &JobView) -> String {
    match view.state() {
        JobState::Waiting => format!("{}: waiting", view.job_id()),
        JobState::Progress(p) => format!(
            "{}: {}% ({}/{} processed, {} valid, {} invalid, {} unknown)",
            p.job_id,
            p.percentage,
            p.counters.processed,
            p.counters.total,
            p.counters.valid,
            p.counters.invalid,
            p.counters.unknown,
        ),
        JobState::Completed(c) => format!(
            "{}: completed ({} valid, {} invalid, {} unknown of {})",
            c.job_id, c.counters.valid, c.counters.invalid, c.counters.unknown, c.counters.total,
        ),
        JobState::Failed(f) => format!("{}: failed: {}", f.job_id, f.error),
    }
}
