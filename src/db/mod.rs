//! Persistent log store for request/response records.
//!
//! This module provides SQLite-based storage for one row per tracked
//! request/response cycle. The middleware performs a two-phase write around
//! handler dispatch (insert before, update after), so response columns are
//! nullable and a crash mid-request leaves a partially-filled row.
//!
//! # Architecture
//!
//! - `models`: Data structures that map to the `request_logs` table
//! - `repository`: CRUD operations used by the middleware
//! - Connection pooling with SQLite WAL mode for concurrency
//! - Migration system for schema versioning

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::error::TrackingError;

pub mod models;
pub mod repository;

/// Creates a SQLite connection pool with optimized settings.
///
/// # Configuration
///
/// - **WAL mode**: Enables concurrent readers during writes
/// - **Busy timeout**: 30 seconds to handle lock contention
/// - **Max connections**: 5 (two short writes per tracked request)
/// - **Min connections**: 1 (keep one connection warm)
///
/// # Example
///
/// ```no_run
/// use axum_request_tracking::db::create_pool;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = create_pool("sqlite:./request_logs.db").await?;
///     // Use pool for queries
///     Ok(())
/// }
/// ```
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, TrackingError> {
    info!(database_url, "Connecting to log store");

    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| {
            TrackingError::database(
                format!("Failed to parse database URL: {database_url}"),
                Some(Box::new(e)),
            )
        })?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await
        .map_err(|e| {
            TrackingError::database(
                format!("Failed to connect to database at {database_url}"),
                Some(Box::new(e)),
            )
        })?;

    info!("Running log store migrations");
    run_migrations(&pool).await?;
    verify_database(&pool).await?;
    info!("Log store migrations complete");

    Ok(pool)
}

/// Runs database migrations to ensure the schema is up-to-date.
///
/// This function applies all pending migrations from the `migrations/`
/// directory. Migrations are applied in order and are idempotent (safe to run
/// multiple times).
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), TrackingError> {
    sqlx::migrate!("./migrations").run(pool).await.map_err(|e| {
        TrackingError::database(
            "Failed to run database migrations".to_string(),
            Some(Box::new(e)),
        )
    })?;

    Ok(())
}

/// Verify that the request log table exists after migrations.
pub async fn verify_database(pool: &SqlitePool) -> Result<(), TrackingError> {
    let row: Option<(String,)> = sqlx::query_as(
        r#"
        SELECT name FROM sqlite_master
        WHERE type='table' AND name = 'request_logs'
        "#,
    )
    .fetch_optional(pool)
    .await
    .map_err(|e| {
        TrackingError::database(
            "Failed to verify database schema".to_string(),
            Some(Box::new(e)),
        )
    })?;

    if row.is_none() {
        return Err(TrackingError::database(
            "Database schema incomplete: request_logs table is missing".to_string(),
            None,
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_db_url(dir: &tempfile::TempDir) -> String {
        format!("sqlite:{}/logs.db", dir.path().display())
    }

    #[tokio::test]
    async fn test_create_pool_and_migrations() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let pool = create_pool(&temp_db_url(&dir))
            .await
            .expect("Failed to create pool");

        // Run migrations again; they must be idempotent
        run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let result: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type='table'")
                .fetch_one(&pool)
                .await
                .expect("Failed to query tables");

        // request_logs + migration history table
        assert!(result.0 >= 2, "Expected at least 2 tables, got {}", result.0);
    }

    #[tokio::test]
    async fn test_verify_database_after_migrations() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let pool = create_pool(&temp_db_url(&dir))
            .await
            .expect("Failed to create pool");

        verify_database(&pool)
            .await
            .expect("request_logs table should exist");
    }

    #[tokio::test]
    async fn test_wal_mode_on_file_database() {
        // WAL mode is not supported for :memory: databases, so use a temp file
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let pool = create_pool(&temp_db_url(&dir))
            .await
            .expect("Failed to create pool");

        let result: (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .expect("Failed to query journal mode");

        assert_eq!(result.0, "wal", "WAL mode expected for file database");
    }
}
