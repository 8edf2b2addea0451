//! Ingest endpoints for the verification engine.
//!
//! The engine reports progress, completion, failure and per-address results
//! here. Progress, completion and failure are relayed immediately to the
//! job's WebSocket subscribers; the job does not need to exist in the
//! database for relaying to work.
//!
//! Completion and failure are written to the job row (and a failure's
//! refund to the ledger) before they are relayed, so a terminal state is
//! never left to the lossy event bus. A database error fails the request
//! and nothing is relayed; the engine retries.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use onlyvalid_core::error::CoreError;
use onlyvalid_core::job::JobCounters;
use onlyvalid_core::job_events::JobEvent;
use onlyvalid_core::types::JobId;
use onlyvalid_db::models::job_result::NewJobResult;
use onlyvalid_db::repositories::{JobRepo, JobResultRepo};
use onlyvalid_events::JobPersistence;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::tokens::RequireEngine;
use crate::response::DataResponse;
use crate::state::AppState;

/// Largest batch accepted by the results endpoint.
const MAX_RESULTS_PER_BATCH: usize = 10_000;

/// Body of `POST .../failed`.
#[derive(Debug, Deserialize, Validate)]
pub struct FailureReport {
    #[validate(length(min = 1, max = 2000))]
    pub error: String,
}

/// How many connections an emitted event was queued on.
#[derive(Debug, Serialize)]
pub struct EmitResponse {
    pub delivered: usize,
}

#[derive(Debug, Serialize)]
pub struct StoredResults {
    pub stored: u64,
}

fn accepted(delivered: usize) -> impl IntoResponse {
    (
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: EmitResponse { delivered },
        }),
    )
}

/// POST /api/v1/engine/jobs/{id}/progress
pub async fn report_progress(
    _: RequireEngine,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(counters): Json<JobCounters>,
) -> AppResult<impl IntoResponse> {
    counters.validate()?;
    let delivered = state.emitter.progress(JobId::new(id), counters).await;
    Ok(accepted(delivered))
}

/// POST /api/v1/engine/jobs/{id}/completed
pub async fn report_completed(
    _: RequireEngine,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(counters): Json<JobCounters>,
) -> AppResult<impl IntoResponse> {
    counters.validate()?;
    let job_id = JobId::new(id);
    tracing::info!(job_id = %job_id, processed = counters.processed, "Job completed");
    let event = JobEvent::completed(job_id, counters);
    JobPersistence::persist(&state.pool, &event).await?;
    let delivered = state.emitter.emit(event).await;
    Ok(accepted(delivered))
}

/// POST /api/v1/engine/jobs/{id}/failed
pub async fn report_failed(
    _: RequireEngine,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(report): Json<FailureReport>,
) -> AppResult<impl IntoResponse> {
    report.validate()?;
    let job_id = JobId::new(id);
    tracing::warn!(job_id = %job_id, error = %report.error, "Job failed");
    let event = JobEvent::failed(job_id, report.error);
    JobPersistence::persist(&state.pool, &event).await?;
    let delivered = state.emitter.emit(event).await;
    Ok(accepted(delivered))
}

/// POST /api/v1/engine/jobs/{id}/results
///
/// Store a batch of per-address results for CSV export. Unlike the relay
/// endpoints this requires the job to exist.
pub async fn submit_results(
    _: RequireEngine,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(results): Json<Vec<NewJobResult>>,
) -> AppResult<impl IntoResponse> {
    if results.len() > MAX_RESULTS_PER_BATCH {
        return Err(AppError::BadRequest(format!(
            "At most {MAX_RESULTS_PER_BATCH} results per batch"
        )));
    }
    if let Some(bad) = results.iter().find(|r| r.email.trim().is_empty()) {
        return Err(AppError::BadRequest(format!(
            "Result with outcome '{}' has an empty email",
            bad.outcome
        )));
    }

    let job_id = JobId::new(id);
    if JobRepo::find_by_id(&state.pool, &job_id).await?.is_none() {
        return Err(AppError::Core(CoreError::not_found("Job", &job_id)));
    }

    let stored = JobResultRepo::insert_batch(&state.pool, &job_id, &results).await?;
    tracing::debug!(job_id = %job_id, stored, "Stored verification results");

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: StoredResults { stored },
        }),
    ))
}
