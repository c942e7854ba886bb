//! Repository pattern for log store operations.
//!
//! Provides the create/update capability the middleware needs (insert before
//! dispatch, two updates after), plus a small read and retention surface for
//! inspection and cleanup.

use sqlx::SqlitePool;
use tracing::{debug, instrument};

use super::models::{NewRequestLog, RequestLogRecord};
use crate::error::TrackingError;

/// Repository for request log operations.
///
/// Wraps a SQLite connection pool and provides type-safe methods for all
/// database interactions.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Creates a new repository with the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== WRITE OPERATIONS ====================

    /// Inserts the pre-dispatch fields of a new request log.
    ///
    /// Returns the row id, which the middleware carries through dispatch so
    /// the later writes can target the same record.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use axum_request_tracking::db::{create_pool, models::NewRequestLog, repository::Repository};
    /// use serde_json::Map;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let pool = create_pool("sqlite:./request_logs.db").await?;
    ///     let repo = Repository::new(pool);
    ///
    ///     let log = NewRequestLog::new(
    ///         chrono::Utc::now(),
    ///         "/api/items",
    ///         "1.2.3.4",
    ///         "api.example.com",
    ///         "GET",
    ///         &Map::new(),
    ///     );
    ///     let id = repo.insert_request_log(&log).await?;
    ///     println!("created log row {id}");
    ///
    ///     Ok(())
    /// }
    /// ```
    pub async fn insert_request_log(&self, log: &NewRequestLog) -> Result<i64, TrackingError> {
        let result = sqlx::query(
            r#"
            INSERT INTO request_logs (
                requested_at, path, remote_addr, host, method, query_params
            )
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(log.requested_at)
        .bind(&log.path)
        .bind(&log.remote_addr)
        .bind(&log.host)
        .bind(&log.method)
        .bind(&log.query_params)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            TrackingError::database("Failed to insert request log".to_string(), Some(Box::new(e)))
        })?;

        Ok(result.last_insert_rowid())
    }

    /// Stores the resolved principal and captured request body.
    ///
    /// This is the second pre-dispatch write: identity and body are unknown
    /// when the row is created because auth and body parsing run as part of
    /// handler dispatch. Either field may be NULL (anonymous request, body
    /// not captured).
    pub async fn update_request_identity(
        &self,
        id: i64,
        user_id: Option<i64>,
        username: Option<&str>,
        request_body: Option<&str>,
    ) -> Result<(), TrackingError> {
        sqlx::query(
            r#"
            UPDATE request_logs
            SET user_id = ?, username = ?, request_body = ?
            WHERE id = ?
            "#,
        )
        .bind(user_id)
        .bind(username)
        .bind(request_body)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            TrackingError::database(
                format!("Failed to update identity for request log {id}"),
                Some(Box::new(e)),
            )
        })?;

        Ok(())
    }

    /// Finalizes a request log with the response fields.
    #[instrument(skip(self, response_body), fields(id = id, status_code = status_code))]
    pub async fn finalize_request_log(
        &self,
        id: i64,
        response_body: Option<&str>,
        status_code: i32,
        response_ms: i64,
    ) -> Result<(), TrackingError> {
        debug!(response_ms, "Finalizing request log");

        sqlx::query(
            r#"
            UPDATE request_logs
            SET response_body = ?, status_code = ?, response_ms = ?
            WHERE id = ?
            "#,
        )
        .bind(response_body)
        .bind(status_code)
        .bind(response_ms)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            TrackingError::database(
                format!("Failed to finalize request log {id}"),
                Some(Box::new(e)),
            )
        })?;

        Ok(())
    }

    // ==================== READ OPERATIONS ====================

    /// Retrieves a request log by id.
    pub async fn get_request_log(
        &self,
        id: i64,
    ) -> Result<Option<RequestLogRecord>, TrackingError> {
        let record =
            sqlx::query_as::<_, RequestLogRecord>("SELECT * FROM request_logs WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    TrackingError::database(
                        format!("Failed to query request log {id}"),
                        Some(Box::new(e)),
                    )
                })?;

        Ok(record)
    }

    /// Retrieves the most recent request logs, newest first.
    pub async fn recent_request_logs(
        &self,
        limit: i64,
    ) -> Result<Vec<RequestLogRecord>, TrackingError> {
        let records = sqlx::query_as::<_, RequestLogRecord>(
            r#"
            SELECT * FROM request_logs
            ORDER BY requested_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            TrackingError::database(
                "Failed to query recent request logs".to_string(),
                Some(Box::new(e)),
            )
        })?;

        Ok(records)
    }

    /// Counts all stored request logs.
    pub async fn count_request_logs(&self) -> Result<i64, TrackingError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM request_logs")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                TrackingError::database(
                    "Failed to count request logs".to_string(),
                    Some(Box::new(e)),
                )
            })?;

        Ok(row.0)
    }

    // ==================== MAINTENANCE OPERATIONS ====================

    /// Deletes logs older than the given unix-millisecond timestamp.
    ///
    /// Returns the number of deleted rows. Intended for periodic retention
    /// cleanup by the host application.
    pub async fn delete_logs_before(&self, requested_at_ms: i64) -> Result<u64, TrackingError> {
        let result = sqlx::query("DELETE FROM request_logs WHERE requested_at < ?")
            .bind(requested_at_ms)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                TrackingError::database(
                    "Failed to delete old request logs".to_string(),
                    Some(Box::new(e)),
                )
            })?;

        Ok(result.rows_affected())
    }
}
