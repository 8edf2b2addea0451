//! Aggregates for the admin dashboard.

use serde::Serialize;
use sqlx::FromRow;

/// Number of jobs in one status.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

/// Database-side part of `GET /api/v1/admin/stats`.
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStats {
    pub users: i64,
    pub jobs_by_status: Vec<StatusCount>,
    pub credits_outstanding: i64,
}
