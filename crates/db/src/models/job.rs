//! Verification job rows and DTOs.

use onlyvalid_core::credits::MAX_EMAILS_PER_JOB;
use onlyvalid_core::error::CoreError;
use onlyvalid_core::job::{JobCounters, JobStatus};
use onlyvalid_core::types::{DbId, JobId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A row from the `verification_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct VerificationJob {
    pub id: String,
    pub user_id: DbId,
    pub status: String,
    pub total: i64,
    pub processed: i64,
    pub valid: i64,
    pub invalid: i64,
    pub unknown: i64,
    pub percentage: i16,
    pub source_filename: Option<String>,
    pub webhook_url: Option<String>,
    /// Only returned once, in the response to job creation.
    #[serde(skip_serializing)]
    pub webhook_secret: Option<String>,
    pub error_message: Option<String>,
    pub credits_charged: i64,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl VerificationJob {
    pub fn job_id(&self) -> JobId {
        JobId::new(self.id.clone())
    }

    pub fn status(&self) -> Result<JobStatus, CoreError> {
        self.status.parse()
    }

    pub fn counters(&self) -> JobCounters {
        JobCounters {
            total: self.total,
            processed: self.processed,
            valid: self.valid,
            invalid: self.invalid,
            unknown: self.unknown,
        }
    }
}

/// DTO for `POST /api/v1/jobs`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateJob {
    pub user_id: DbId,
    #[validate(range(min = 1, max = MAX_EMAILS_PER_JOB))]
    pub total_emails: i64,
    #[validate(length(min = 1, max = 255))]
    pub source_filename: Option<String>,
    #[validate(url)]
    pub webhook_url: Option<String>,
}

/// Query parameters for `GET /api/v1/jobs`.
#[derive(Debug, Default, Deserialize)]
pub struct JobListQuery {
    pub user_id: Option<DbId>,
    /// Status name, case-insensitive (e.g. `processing`).
    pub status: Option<String>,
    /// Defaults to 50, capped at 100.
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Result of the debit-and-insert transaction behind job creation.
#[derive(Debug)]
pub enum JobCreation {
    Created(VerificationJob),
    InsufficientCredits { required: i64, available: i64 },
    UnknownUser,
}
