//! Database access layer for poflow.
//!
//! Models map Postgres rows, repositories are unit structs with static
//! async methods over a shared [`DbPool`], and [`writer`] adapts the
//! purchase-order tables to the core orchestrator's persistence trait.

pub mod models;
pub mod repositories;
pub mod writer;

use sqlx::postgres::PgPoolOptions;

/// Shared Postgres connection pool.
pub type DbPool = sqlx::PgPool;

/// Create the connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

/// Cheap liveness probe used at startup and by the health endpoint.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}

/// Apply embedded migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
