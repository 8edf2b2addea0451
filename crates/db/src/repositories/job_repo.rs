//! Repository for the `verification_jobs` table.
//!
//! Status transitions only move forward: progress and completion updates
//! are ignored once a job is `COMPLETED` or `FAILED`.

use onlyvalid_core::credits::{refund_for_failure, TransactionKind};
use onlyvalid_core::job::{JobCounters, JobStatus};
use onlyvalid_core::types::{DbId, JobId, Timestamp};
use sqlx::PgPool;

use super::credit_repo::{CreditRepo, LedgerEntry};
use crate::models::job::{CreateJob, JobCreation, VerificationJob};

/// Column list for `verification_jobs` queries.
const COLUMNS: &str = "\
    id, user_id, status, total, processed, valid, invalid, unknown, percentage, \
    source_filename, webhook_url, webhook_secret, error_message, credits_charged, \
    created_at, started_at, completed_at, updated_at";

/// SQL predicate matching jobs that can still change.
const NOT_TERMINAL: &str = "status IN ('PENDING', 'PROCESSING')";

pub struct JobRepo;

impl JobRepo {
    /// Debit `credits` from the owner and insert the job as `PENDING`.
    ///
    /// Runs in one transaction: when the balance is short nothing is
    /// written, neither job row nor ledger row.
    pub async fn create_with_debit(
        pool: &PgPool,
        id: &JobId,
        input: &CreateJob,
        credits: i64,
        webhook_secret: Option<&str>,
    ) -> Result<JobCreation, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let Some(available) = CreditRepo::lock_balance(&mut *tx, input.user_id).await? else {
            return Ok(JobCreation::UnknownUser);
        };
        if available < credits {
            return Ok(JobCreation::InsufficientCredits {
                required: credits,
                available,
            });
        }

        let query = format!(
            "INSERT INTO verification_jobs \
                (id, user_id, status, total, source_filename, webhook_url, webhook_secret, credits_charged) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        let job = sqlx::query_as::<_, VerificationJob>(&query)
            .bind(id.as_str())
            .bind(input.user_id)
            .bind(JobStatus::Pending.as_str())
            .bind(input.total_emails)
            .bind(&input.source_filename)
            .bind(&input.webhook_url)
            .bind(webhook_secret)
            .bind(credits)
            .fetch_one(&mut *tx)
            .await?;

        CreditRepo::apply(
            &mut *tx,
            LedgerEntry {
                user_id: input.user_id,
                kind: TransactionKind::VerificationDebit,
                amount: -credits,
                job_id: Some(id.as_str()),
                note: input.source_filename.as_deref(),
            },
        )
        .await?;

        tx.commit().await?;
        Ok(JobCreation::Created(job))
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: &JobId,
    ) -> Result<Option<VerificationJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM verification_jobs WHERE id = $1");
        sqlx::query_as::<_, VerificationJob>(&query)
            .bind(id.as_str())
            .fetch_optional(pool)
            .await
    }

    /// List jobs, newest first, optionally filtered by owner and status.
    pub async fn list(
        pool: &PgPool,
        user_id: Option<DbId>,
        status: Option<JobStatus>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<VerificationJob>, sqlx::Error> {
        let (limit, offset) = super::page(limit, offset);
        let query = format!(
            "SELECT {COLUMNS} FROM verification_jobs \
             WHERE ($1::BIGINT IS NULL OR user_id = $1) \
               AND ($2::TEXT IS NULL OR status = $2) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, VerificationJob>(&query)
            .bind(user_id)
            .bind(status.map(JobStatus::as_str))
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Record a progress snapshot and move the job to `PROCESSING`.
    ///
    /// Returns `false` when the job is unknown or already terminal.
    pub async fn update_progress(
        pool: &PgPool,
        id: &JobId,
        counters: &JobCounters,
        percentage: u8,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE verification_jobs \
             SET status = $2, total = $3, processed = $4, valid = $5, invalid = $6, \
                 unknown = $7, percentage = $8, started_at = COALESCE(started_at, NOW()) \
             WHERE id = $1 AND {NOT_TERMINAL}"
        );
        let result = sqlx::query(&query)
            .bind(id.as_str())
            .bind(JobStatus::Processing.as_str())
            .bind(counters.total)
            .bind(counters.processed)
            .bind(counters.valid)
            .bind(counters.invalid)
            .bind(counters.unknown)
            .bind(i16::from(percentage))
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Store the final counters and mark the job `COMPLETED`.
    pub async fn complete(
        pool: &PgPool,
        id: &JobId,
        counters: &JobCounters,
        percentage: u8,
        completed_at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE verification_jobs \
             SET status = $2, total = $3, processed = $4, valid = $5, invalid = $6, \
                 unknown = $7, percentage = $8, completed_at = $9, \
                 started_at = COALESCE(started_at, $9) \
             WHERE id = $1 AND {NOT_TERMINAL}"
        );
        let result = sqlx::query(&query)
            .bind(id.as_str())
            .bind(JobStatus::Completed.as_str())
            .bind(counters.total)
            .bind(counters.processed)
            .bind(counters.valid)
            .bind(counters.invalid)
            .bind(counters.unknown)
            .bind(i16::from(percentage))
            .bind(completed_at)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark the job `FAILED` and refund credits for unprocessed addresses.
    ///
    /// Returns the refunded amount, or `None` when the job is unknown or
    /// already terminal (in which case nothing changes).
    pub async fn fail_and_refund(
        pool: &PgPool,
        id: &JobId,
        error: &str,
        failed_at: Timestamp,
    ) -> Result<Option<i64>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "SELECT {COLUMNS} FROM verification_jobs WHERE id = $1 AND {NOT_TERMINAL} FOR UPDATE"
        );
        let job = sqlx::query_as::<_, VerificationJob>(&query)
            .bind(id.as_str())
            .fetch_optional(&mut *tx)
            .await?;
        let Some(job) = job else {
            return Ok(None);
        };

        sqlx::query(
            "UPDATE verification_jobs \
             SET status = $2, error_message = $3, completed_at = $4 \
             WHERE id = $1",
        )
        .bind(id.as_str())
        .bind(JobStatus::Failed.as_str())
        .bind(error)
        .bind(failed_at)
        .execute(&mut *tx)
        .await?;

        let refund = refund_for_failure(job.credits_charged, job.processed);
        if refund > 0 {
            CreditRepo::lock_balance(&mut *tx, job.user_id).await?;
            CreditRepo::apply(
                &mut *tx,
                LedgerEntry {
                    user_id: job.user_id,
                    kind: TransactionKind::Refund,
                    amount: refund,
                    job_id: Some(id.as_str()),
                    note: Some("Unprocessed addresses of failed job"),
                },
            )
            .await?;
        }

        tx.commit().await?;
        Ok(Some(refund))
    }
}
