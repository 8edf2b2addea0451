//! Route definitions for the verification engine ingest.
//!
//! All endpoints require the engine bearer token.

use axum::routing::post;
use axum::Router;

use crate::handlers::engine;
use crate::state::AppState;

/// Routes mounted at `/engine`.
///
/// ```text
/// POST   /jobs/{id}/progress    -> report_progress
/// POST   /jobs/{id}/completed   -> report_completed
/// POST   /jobs/{id}/failed      -> report_failed
/// POST   /jobs/{id}/results     -> submit_results
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/jobs/{id}/progress", post(engine::report_progress))
        .route("/jobs/{id}/completed", post(engine::report_completed))
        .route("/jobs/{id}/failed", post(engine::report_failed))
        .route("/jobs/{id}/results", post(engine::submit_results))
}
