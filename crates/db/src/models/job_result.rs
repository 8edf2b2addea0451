//! Per-address verification results reported by the engine.

use onlyvalid_core::export::ExportRow;
use onlyvalid_core::job::VerificationOutcome;
use onlyvalid_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `job_results` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobResult {
    pub id: DbId,
    pub job_id: String,
    pub email: String,
    pub outcome: String,
    pub reason: Option<String>,
    pub checked_at: Timestamp,
}

impl JobResult {
    pub fn as_export_row(&self) -> ExportRow<'_> {
        ExportRow {
            email: &self.email,
            outcome: &self.outcome,
            reason: self.reason.as_deref(),
            checked_at: self.checked_at,
        }
    }
}

/// One result in the body of `POST /api/v1/engine/jobs/{id}/results`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewJobResult {
    pub email: String,
    pub outcome: VerificationOutcome,
    pub reason: Option<String>,
    /// Defaults to the time of insertion.
    pub checked_at: Option<Timestamp>,
}
