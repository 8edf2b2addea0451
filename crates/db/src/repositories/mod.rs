//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument. Multi-statement writes run in a
//! single transaction and report business outcomes as enums rather than
//! errors; `sqlx::Error` is reserved for infrastructure failures.

pub mod credit_repo;
pub mod job_repo;
pub mod job_result_repo;
pub mod promo_code_repo;
pub mod stats_repo;
pub mod user_repo;

pub use credit_repo::CreditRepo;
pub use job_repo::JobRepo;
pub use job_result_repo::JobResultRepo;
pub use promo_code_repo::PromoCodeRepo;
pub use stats_repo::StatsRepo;
pub use user_repo::UserRepo;

/// Default page size for list endpoints.
pub const DEFAULT_LIMIT: i64 = 50;

/// Maximum page size for list endpoints.
pub const MAX_LIMIT: i64 = 100;

/// Resolve optional `limit` / `offset` query values into bounded ones.
pub(crate) fn page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    (
        limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        offset.unwrap_or(0).max(0),
    )
}
