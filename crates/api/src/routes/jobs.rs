//! Route definitions for the `/jobs` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// GET    /              -> list_jobs
/// POST   /              -> create_job
/// GET    /{id}          -> get_job
/// GET    /{id}/export   -> export_results
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(jobs::list_jobs).post(jobs::create_job))
        .route("/{id}", get(jobs::get_job))
        .route("/{id}/export", get(jobs::export_results))
}
