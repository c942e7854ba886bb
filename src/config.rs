//! Configuration management for the request tracking middleware.
//!
//! This module handles loading and validating configuration from environment
//! variables using the `dotenvy` crate. All operations return
//! [`TrackingResult`] for comprehensive error handling.
//!
//! ## Environment Variables
//!
//! Optional (with defaults):
//! - `DATABASE_URL`: SQLite connection string for the log store
//!   (default: "sqlite:./request_logs.db")
//! - `LOG_METHODS`: `__all__` or a comma-separated list of HTTP methods to
//!   log, e.g. "GET,POST" (default: `__all__`)
//! - `MAX_CAPTURE_BYTES`: upper bound for request/response body capture
//!   (default: 65536)
//! - `RUST_LOG`: Logging level (default: "info")
//!
//! ## Example
//!
//! ```no_run
//! use axum_request_tracking::config::Config;
//! use axum_request_tracking::error::TrackingResult;
//!
//! # fn main() -> TrackingResult<()> {
//! let config = Config::from_env()?;
//! println!("Log store: {}", config.database_url());
//! # Ok(())
//! # }
//! ```

use crate::error::{TrackingError, TrackingResult};
use crate::middleware::MethodSelector;
use std::env;

/// Default SQLite connection string for the log store.
pub const DEFAULT_DATABASE_URL: &str = "sqlite:./request_logs.db";

/// Default upper bound for body capture, in bytes.
pub const DEFAULT_MAX_CAPTURE_BYTES: usize = 65536;

/// Main configuration struct for the tracking middleware.
///
/// Contains all runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite connection string for the log store
    database_url: String,

    /// Which HTTP methods get logged
    method_selector: MethodSelector,

    /// Upper bound for request/response body capture
    max_capture_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This function:
    /// 1. Loads `.env` file using `dotenvy` (if present)
    /// 2. Reads all environment variables, applying defaults
    /// 3. Parses `LOG_METHODS` into a [`MethodSelector`]
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `LOG_METHODS` names an HTTP method that does not parse
    /// - `MAX_CAPTURE_BYTES` is not a valid number
    ///
    /// # Example
    ///
    /// ```no_run
    /// use axum_request_tracking::config::Config;
    /// use axum_request_tracking::error::TrackingResult;
    ///
    /// # fn main() -> TrackingResult<()> {
    /// let config = Config::from_env()?;
    /// println!("Configuration loaded successfully");
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_env() -> TrackingResult<Self> {
        // Load .env file if present (ignore error if file doesn't exist)
        dotenvy::dotenv().ok();

        // Optional: log store URL (default: local SQLite file)
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

        // Optional: method selector (default: log every method)
        let method_selector = match env::var("LOG_METHODS") {
            Ok(raw) => MethodSelector::parse(&raw)?,
            Err(_) => MethodSelector::All,
        };

        // Optional: body capture cap (default: 64 KiB)
        let max_capture_bytes = env::var("MAX_CAPTURE_BYTES")
            .unwrap_or_else(|_| DEFAULT_MAX_CAPTURE_BYTES.to_string())
            .parse::<usize>()
            .map_err(|e| {
                TrackingError::config(
                    "MAX_CAPTURE_BYTES must be a valid number",
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            database_url,
            method_selector,
            max_capture_bytes,
        })
    }

    /// Get the log store connection string.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Get the configured method selector.
    #[must_use]
    pub const fn method_selector(&self) -> &MethodSelector {
        &self.method_selector
    }

    /// Get the body capture cap in bytes.
    #[must_use]
    pub const fn max_capture_bytes(&self) -> usize {
        self.max_capture_bytes
    }
}
