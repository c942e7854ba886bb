//! # Axum Request Tracking
//!
//! Persistent request/response logging middleware for [axum](https://github.com/tokio-rs/axum) APIs.
//!
//! This library intercepts each inbound HTTP request, records its metadata
//! (timestamp, path, client address, host, method, query parameters, body,
//! authenticated principal), lets the inner pipeline execute, then records the
//! response (status code, rendered body, latency) into a SQLite log store.
//!
//! ## Features
//!
//! - **Two-phase persistence** - one row inserted before the handler runs,
//!   finalized after the response is rendered
//! - **Proxy-aware client addresses** via `X-Forwarded-For`
//! - **Configurable method selector** - log all methods or an explicit set
//! - **Guarded body capture** - JSON mappings stored structurally, other
//!   well-formed payloads stored as-is, framework parse errors never swallowed
//! - **Principal propagation** - the auth layer's resolved identity lands on
//!   the log row, with NULL for anonymous requests
//! - **Full async/await** support with Tokio
//!
//! ## Architecture
//!
//! The crate is organized into independent layers:
//!
//! 1. **Config Layer** ([`config`]) - Environment variable loading
//! 2. **Store Layer** ([`db`]) - SQLite pool, migrations, repository
//! 3. **Middleware Layer** ([`middleware`]) - the dispatch-hook interceptor
//! 4. **Principal Layer** ([`principal`]) - identity handoff from auth
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use axum::{middleware, routing::get, Router};
//! use axum_request_tracking::db::{create_pool, repository::Repository};
//! use axum_request_tracking::middleware::{track_requests, RequestLogger};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = create_pool("sqlite:./request_logs.db").await?;
//!     let logger = RequestLogger::new(Arc::new(Repository::new(pool)));
//!
//!     let app: Router = Router::new()
//!         .route("/hello", get(|| async { "hi" }))
//!         .layer(middleware::from_fn_with_state(logger, track_requests));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Library operations return [`error::TrackingResult<T>`](error::TrackingResult)
//! for consistent error propagation. The middleware itself introduces no error
//! kinds on the request path: handler, auth and body-parse failures pass
//! through unmodified, and log-store failures are logged without failing the
//! request.
//!
//! ## Testing
//!
//! Run the test suite:
//!
//! ```bash
//! # All tests
//! cargo test
//!
//! # Unit tests only
//! cargo test --lib
//!
//! # Integration tests
//! cargo test --test '*'
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod observability;
pub mod principal;
