//! Handlers for the `/jobs` resource: creation with credit debit, listing,
//! and CSV export of results.

use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use onlyvalid_core::credits::credits_required;
use onlyvalid_core::error::CoreError;
use onlyvalid_core::export::{build_results_csv, export_filename};
use onlyvalid_core::job::{JobStatus, VerificationOutcome};
use onlyvalid_core::signing::generate_webhook_secret;
use onlyvalid_core::types::JobId;
use onlyvalid_db::models::job::{CreateJob, JobCreation, JobListQuery, VerificationJob};
use onlyvalid_db::repositories::{JobRepo, JobResultRepo};
use serde::Serialize;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::query::ExportParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// Response to job creation. The webhook secret is only ever shown here.
#[derive(Debug, Serialize)]
pub struct CreatedJob {
    #[serde(flatten)]
    pub job: VerificationJob,
    pub webhook_secret: Option<String>,
}

async fn find_job(pool: &sqlx::PgPool, id: &JobId) -> AppResult<VerificationJob> {
    JobRepo::find_by_id(pool, id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::not_found("Job", id)))
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Debit `total_emails` credits and create a `PENDING` job. Returns 201, or
/// 402 when the balance is too low (nothing is written in that case).
pub async fn create_job(
    State(state): State<AppState>,
    Json(input): Json<CreateJob>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let credits = credits_required(input.total_emails)?;
    let id = JobId::generate();
    let webhook_secret = input.webhook_url.as_ref().map(|_| generate_webhook_secret());

    let job = match JobRepo::create_with_debit(
        &state.pool,
        &id,
        &input,
        credits,
        webhook_secret.as_deref(),
    )
    .await?
    {
        JobCreation::Created(job) => job,
        JobCreation::InsufficientCredits {
            required,
            available,
        } => {
            return Err(AppError::Core(CoreError::InsufficientCredits {
                required,
                available,
            }))
        }
        JobCreation::UnknownUser => {
            return Err(AppError::Core(CoreError::not_found("User", input.user_id)))
        }
    };

    tracing::info!(
        job_id = %job.id,
        user_id = job.user_id,
        total = job.total,
        credits,
        "Verification job created",
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: CreatedJob {
                job,
                webhook_secret,
            },
        }),
    ))
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs
///
/// Supports `user_id`, `status`, `limit` and `offset` query parameters.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<JobListQuery>,
) -> AppResult<impl IntoResponse> {
    let status = params
        .status
        .as_deref()
        .map(str::parse::<JobStatus>)
        .transpose()?;
    let jobs = JobRepo::list(
        &state.pool,
        params.user_id,
        status,
        params.limit,
        params.offset,
    )
    .await?;
    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let job = find_job(&state.pool, &JobId::new(id)).await?;
    Ok(Json(DataResponse { data: job }))
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}/export
///
/// Download the stored per-address results as CSV, optionally filtered by
/// `?outcome=`.
pub async fn export_results(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ExportParams>,
) -> AppResult<impl IntoResponse> {
    let id = JobId::new(id);
    let outcome = params
        .outcome
        .as_deref()
        .map(str::parse::<VerificationOutcome>)
        .transpose()?;

    find_job(&state.pool, &id).await?;
    let results = JobResultRepo::list_for_job(&state.pool, &id, outcome).await?;
    let csv = build_results_csv(results.iter().map(|r| r.as_export_row()));

    tracing::info!(job_id = %id, rows = results.len(), "Results exported");

    let disposition = format!("attachment; filename=\"{}\"", export_filename(&id));
    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        csv,
    ))
}
