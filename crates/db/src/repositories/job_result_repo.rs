//! Repository for the `job_results` table.

use chrono::Utc;
use onlyvalid_core::job::VerificationOutcome;
use onlyvalid_core::types::JobId;
use sqlx::PgPool;

use crate::models::job_result::{JobResult, NewJobResult};

const COLUMNS: &str = "id, job_id, email, outcome, reason, checked_at";

pub struct JobResultRepo;

impl JobResultRepo {
    /// Insert a batch of results for one job in a single transaction.
    pub async fn insert_batch(
        pool: &PgPool,
        job_id: &JobId,
        results: &[NewJobResult],
    ) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let now = Utc::now();
        let mut inserted = 0;

        for result in results {
            inserted += sqlx::query(
                "INSERT INTO job_results (job_id, email, outcome, reason, checked_at) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(job_id.as_str())
            .bind(&result.email)
            .bind(result.outcome.as_str())
            .bind(&result.reason)
            .bind(result.checked_at.unwrap_or(now))
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// All results of a job in insertion order, optionally one outcome only.
    pub async fn list_for_job(
        pool: &PgPool,
        job_id: &JobId,
        outcome: Option<VerificationOutcome>,
    ) -> Result<Vec<JobResult>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM job_results \
             WHERE job_id = $1 AND ($2::TEXT IS NULL OR outcome = $2) \
             ORDER BY id"
        );
        sqlx::query_as::<_, JobResult>(&query)
            .bind(job_id.as_str())
            .bind(outcome.map(VerificationOutcome::as_str))
            .fetch_all(pool)
            .await
    }
}
