//! PostgreSQL persistence for OnlyValidEmails.
//!
//! Models live in [`models`], queries in [`repositories`]. Every
//! repository is a zero-sized struct whose methods take `&PgPool`.

pub mod models;
pub mod repositories;

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub type DbPool = PgPool;

/// Maximum connections held by the API's pool.
const MAX_CONNECTIONS: u32 = 20;

/// How long to wait for a free connection before failing a query.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Open a connection pool against `database_url`.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to prove the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply the embedded migrations under `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
