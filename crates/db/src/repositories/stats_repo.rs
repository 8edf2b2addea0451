//! Aggregate queries for the admin dashboard.

use sqlx::PgPool;

use crate::models::stats::{DatabaseStats, StatusCount};

pub struct StatsRepo;

impl StatsRepo {
    pub async fn database_stats(pool: &PgPool) -> Result<DatabaseStats, sqlx::Error> {
        let (users, credits_outstanding) = sqlx::query_as::<_, (i64, i64)>(
            "SELECT COUNT(*), COALESCE(SUM(credits), 0)::BIGINT FROM users",
        )
        .fetch_one(pool)
        .await?;

        let jobs_by_status = sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*) AS count FROM verification_jobs GROUP BY status ORDER BY status",
        )
        .fetch_all(pool)
        .await?;

        Ok(DatabaseStats {
            users,
            jobs_by_status,
            credits_outstanding,
        })
    }
}
