//! Error types for the request tracking middleware.
//!
//! This module provides a unified error type [`TrackingError`] that encompasses
//! all failures the library itself can produce: configuration loading, log
//! store access, and decoding of persisted fields.
//!
//! The middleware deliberately defines no error kinds for the request path:
//! handler, auth and body-parse failures belong to the host framework and pass
//! through the interceptor unmodified. [`TrackingError`] only covers the
//! library surfaces that are fallible in their own right.
//!
//! # Example
//!
//! ```
//! use axum_request_tracking::error::{TrackingError, TrackingResult};
//!
//! fn parse_latency(raw: &str) -> TrackingResult<i64> {
//!     raw.parse()
//!         .map_err(|e| TrackingError::decoding("latency is not a number", Some(Box::new(e))))
//! }
//! ```

use std::fmt;

/// Result type alias using [`TrackingError`].
pub type TrackingResult<T> = Result<T, TrackingError>;

/// Unified error type for the request tracking library.
///
/// This enum encompasses all error types that can occur during:
/// - Configuration loading
/// - Log store connection, migration, and persistence
/// - Decoding persisted record fields back into structured values
#[derive(Debug)]
pub enum TrackingError {
    /// Configuration or environment variable errors.
    ///
    /// Variants include:
    /// - Missing or invalid environment variables
    /// - Unrecognized method selector values
    /// - Malformed configuration values
    ConfigError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Log store operation errors.
    ///
    /// Variants include:
    /// - Connection failures
    /// - Query execution errors
    /// - Migration failures
    /// - Constraint violations
    DatabaseError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Decoding or parsing errors for persisted fields.
    ///
    /// Variants include:
    /// - Query-param JSON that does not parse back to a mapping
    /// - Timestamps outside the representable range
    DecodingError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl TrackingError {
    /// Create a new configuration error.
    ///
    /// # Example
    ///
    /// ```
    /// use axum_request_tracking::error::TrackingError;
    ///
    /// let err = TrackingError::config("LOG_METHODS contains an invalid method", None);
    /// assert!(matches!(err, TrackingError::ConfigError { .. }));
    /// ```
    #[must_use]
    pub fn config(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::ConfigError {
            message: message.into(),
            source,
        }
    }

    /// Create a new log store error.
    ///
    /// # Example
    ///
    /// ```
    /// use axum_request_tracking::error::TrackingError;
    ///
    /// let err = TrackingError::database("Failed to insert request log", None);
    /// assert!(matches!(err, TrackingError::DatabaseError { .. }));
    /// ```
    #[must_use]
    pub fn database(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::DatabaseError {
            message: message.into(),
            source,
        }
    }

    /// Create a new decoding error.
    ///
    /// # Example
    ///
    /// ```
    /// use axum_request_tracking::error::TrackingError;
    ///
    /// let err = TrackingError::decoding("query_params is not a JSON object", None);
    /// assert!(matches!(err, TrackingError::DecodingError { .. }));
    /// ```
    #[must_use]
    pub fn decoding(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::DecodingError {
            message: message.into(),
            source,
        }
    }
}

impl fmt::Display for TrackingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigError { message, .. } => write!(f, "Configuration error: {message}"),
            Self::DatabaseError { message, .. } => write!(f, "Database error: {message}"),
            Self::DecodingError { message, .. } => write!(f, "Decoding error: {message}"),
        }
    }
}

impl std::error::Error for TrackingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConfigError { source, .. }
            | Self::DatabaseError { source, .. }
            | Self::DecodingError { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &dyn std::error::Error),
        }
    }
}
