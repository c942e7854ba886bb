//! The request tracking interceptor.
//!
//! [`RequestLogger`] wraps the host's dispatch pipeline at two points: before
//! the handler runs ([`RequestLogger::before_dispatch`]) and after it produced
//! a response ([`RequestLogger::after_dispatch`]). The two phases are composed
//! by axum's own middleware chain through [`track_requests`]; no inheritance
//! from a base handler type is involved.
//!
//! Per tracked request the interceptor performs a two-phase write against the
//! log store: an insert with the fields known up front (timestamp, path,
//! client address, host, method, query params), then updates with the fields
//! that only exist once dispatch has run (principal, captured body, response
//! status, rendered body, latency). Store failures never fail the request;
//! they are logged and the request proceeds untracked.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use axum::{middleware, routing::get, Router};
//! use axum_request_tracking::db::{create_pool, repository::Repository};
//! use axum_request_tracking::middleware::{track_requests, MethodSelector, RequestLogger};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = create_pool("sqlite:./request_logs.db").await?;
//!     let logger = RequestLogger::new(Arc::new(Repository::new(pool)))
//!         .with_methods(MethodSelector::only([axum::http::Method::GET]));
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

use axum::body::{to_bytes, Body, Bytes};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error};

use crate::config::{Config, DEFAULT_MAX_CAPTURE_BYTES};
use crate::db::models::NewRequestLog;
use crate::db::repository::Repository;
use crate::error::{TrackingError, TrackingResult};
use crate::principal::CurrentUser;

mod capture;

use capture::BodyCapture;

/// Which HTTP methods the interceptor logs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MethodSelector {
    /// Log every method (the default).
    #[default]
    All,
    /// Log only the listed methods; everything else passes through untracked.
    Only(HashSet<Method>),
}

impl MethodSelector {
    /// Builds a selector from an explicit method list.
    ///
    /// # Example
    ///
    /// ```
    /// use axum::http::Method;
    /// use axum_request_tracking::middleware::MethodSelector;
    ///
    /// let selector = MethodSelector::only([Method::GET, Method::POST]);
    /// assert!(selector.allows(&Method::GET));
    /// assert!(!selector.allows(&Method::DELETE));
    /// ```
    #[must_use]
    pub fn only(methods: impl IntoIterator<Item = Method>) -> Self {
        Self::Only(methods.into_iter().collect())
    }

    /// Parses a selector from its configuration string.
    ///
    /// `__all__` (or `all`, case-insensitive) selects every method; anything
    /// else is read as a comma-separated list of method names.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a listed method name is invalid.
    pub fn parse(raw: &str) -> TrackingResult<Self> {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("__all__") || trimmed.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }

        let mut methods = HashSet::new();
        for name in trimmed.split(',') {
            let name = name.trim().to_ascii_uppercase();
            if name.is_empty() {
                continue;
            }
            let method = Method::from_bytes(name.as_bytes()).map_err(|e| {
                TrackingError::config(
                    format!("Invalid HTTP method in selector: {name}"),
                    Some(Box::new(e)),
                )
            })?;
            methods.insert(method);
        }

        if methods.is_empty() {
            return Err(TrackingError::config(
                format!("Method selector is empty: {raw}"),
                None,
            ));
        }

        Ok(Self::Only(methods))
    }

    /// Whether the given method is logged under this selector.
    #[must_use]
    pub fn allows(&self, method: &Method) -> bool {
        match self {
            Self::All => true,
            Self::Only(methods) => methods.contains(method),
        }
    }
}

/// Request-extension key exposing the in-flight log row id to inner stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestLogId(pub i64);

/// Per-request context carrying the in-flight record between the two phases.
///
/// Created by [`RequestLogger::before_dispatch`] and consumed by
/// [`RequestLogger::after_dispatch`]; it holds the row id, the pre-dispatch
/// timestamp and the buffered request payload whose capture is deferred until
/// dispatch has run.
#[derive(Debug)]
pub struct DispatchLog {
    record_id: i64,
    requested_at: DateTime<Utc>,
    body: Option<Bytes>,
    content_type: Option<String>,
}

impl DispatchLog {
    /// The log row id this context points at.
    #[must_use]
    pub const fn record_id(&self) -> i64 {
        self.record_id
    }
}

/// Dispatch-hook interceptor that persists one log row per tracked request.
#[derive(Clone)]
pub struct RequestLogger {
    repository: Arc<Repository>,
    selector: MethodSelector,
    max_capture_bytes: usize,
}

impl RequestLogger {
    /// Creates a logger that tracks every method with the default capture cap.
    #[must_use]
    pub fn new(repository: Arc<Repository>) -> Self {
        Self {
            repository,
            selector: MethodSelector::All,
            max_capture_bytes: DEFAULT_MAX_CAPTURE_BYTES,
        }
    }

    /// Creates a logger configured from the environment-driven [`Config`].
    #[must_use]
    pub fn from_config(repository: Arc<Repository>, config: &Config) -> Self {
        Self {
            repository,
            selector: config.method_selector().clone(),
            max_capture_bytes: config.max_capture_bytes(),
        }
    }

    /// Restricts logging to the given method selector.
    #[must_use]
    pub fn with_methods(mut self, selector: MethodSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Overrides the body capture cap in bytes.
    #[must_use]
    pub fn with_max_capture_bytes(mut self, max_capture_bytes: usize) -> Self {
        self.max_capture_bytes = max_capture_bytes;
        self
    }

    /// Pre-dispatch phase: create and persist the log row, buffer the body.
    ///
    /// Returns the (possibly rebuilt) request together with the dispatch
    /// context, or `None` when the method selector excludes this request. A
    /// body-read failure short-circuits with the framework's error response;
    /// the already-persisted row then stays in its pre-dispatch state.
    ///
    /// Store failures are logged and the request proceeds untracked rather
    /// than failing the client call.
    pub async fn before_dispatch(
        &self,
        mut request: Request,
    ) -> Result<(Request, Option<DispatchLog>), Response> {
        if !self.selector.allows(request.method()) {
            return Ok((request, None));
        }

        let requested_at = Utc::now();
        let remote_addr = capture::client_addr(
            request.headers(),
            request.extensions().get::<ConnectInfo<SocketAddr>>(),
        );
        let host = capture::host(request.headers(), request.uri());
        let query_params = capture::query_params(request.uri().query());

        let log = NewRequestLog::new(
            requested_at,
            request.uri().path(),
            remote_addr,
            host,
            request.method().as_str(),
            &query_params,
        );

        let record_id = match self.repository.insert_request_log(&log).await {
            Ok(id) => id,
            Err(err) => {
                error!(error = %err, "Failed to create request log; request proceeds untracked");
                return Ok((request, None));
            }
        };

        request.extensions_mut().insert(RequestLogId(record_id));

        let content_type = request
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string);

        let (request, body) = self.buffer_request_body(request).await?;

        debug!(
            record_id,
            method = %log.method,
            path = %log.path,
            "Created request log"
        );

        Ok((
            request,
            Some(DispatchLog {
                record_id,
                requested_at,
                body,
                content_type,
            }),
        ))
    }

    /// Post-dispatch phase: record identity, captured body and the response.
    ///
    /// Runs after the inner pipeline returned. The identity/body write always
    /// happens, whichever capture branch ran; the finalizing write is skipped
    /// when the payload was malformed and the framework rejected the request,
    /// leaving the record in its pre-dispatch state.
    pub async fn after_dispatch(&self, ctx: DispatchLog, response: Response) -> Response {
        let user = response
            .extensions()
            .get::<CurrentUser>()
            .cloned()
            .unwrap_or_default();
        let (user_id, username) = user.as_log_fields();

        let body_capture = match &ctx.body {
            Some(bytes) => capture::capture_body(bytes, ctx.content_type.as_deref()),
            None => BodyCapture::Skipped,
        };

        // Guaranteed write: whichever branch the capture took, the record is
        // persisted with the fields known at this point.
        if let Err(err) = self
            .repository
            .update_request_identity(ctx.record_id, user_id, username, body_capture.as_stored())
            .await
        {
            error!(record_id = ctx.record_id, error = %err, "Failed to update request log identity");
        }

        if body_capture == BodyCapture::Malformed && response.status().is_client_error() {
            // The framework's own body parser rejected the payload and its
            // error response is propagating to the client. The record stays
            // in its pre-dispatch state.
            debug!(
                record_id = ctx.record_id,
                status = response.status().as_u16(),
                "Malformed payload rejected upstream; skipping finalization"
            );
            return response;
        }

        let response_ms = (Utc::now() - ctx.requested_at).num_milliseconds();
        let status_code = i32::from(response.status().as_u16());

        let (response, response_body) = self.buffer_response_body(response).await;

        if let Err(err) = self
            .repository
            .finalize_request_log(
                ctx.record_id,
                response_body.as_deref(),
                status_code,
                response_ms,
            )
            .await
        {
            error!(record_id = ctx.record_id, error = %err, "Failed to finalize request log");
        }

        response
    }

    /// Buffers the request body so capture can run after dispatch.
    ///
    /// Bodies with a missing `Content-Length` or one above the cap pass
    /// through unbuffered and are simply not captured. A read failure maps to
    /// the framework's bad-request response.
    async fn buffer_request_body(
        &self,
        request: Request,
    ) -> Result<(Request, Option<Bytes>), Response> {
        if !self.should_buffer(request.headers()) {
            return Ok((request, None));
        }

        let (parts, body) = request.into_parts();
        match to_bytes(body, self.max_capture_bytes).await {
            Ok(bytes) => {
                let request = Request::from_parts(parts, Body::from(bytes.clone()));
                Ok((request, Some(bytes)))
            }
            Err(err) => {
                debug!(error = %err, "Failed to read request body");
                Err(StatusCode::BAD_REQUEST.into_response())
            }
        }
    }

    /// Buffers the rendered response body for capture, within the cap.
    async fn buffer_response_body(&self, response: Response) -> (Response, Option<String>) {
        if !self.should_buffer(response.headers()) {
            return (response, None);
        }

        let (parts, body) = response.into_parts();
        match to_bytes(body, self.max_capture_bytes).await {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes).into_owned();
                let response = Response::from_parts(parts, Body::from(bytes));
                (response, Some(text))
            }
            Err(err) => {
                error!(error = %err, "Failed to read response body for capture");
                (Response::from_parts(parts, Body::empty()), None)
            }
        }
    }

    /// A body is buffered only when its declared length fits under the cap.
    fn should_buffer(&self, headers: &axum::http::HeaderMap) -> bool {
        headers
            .get(header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<usize>().ok())
            .is_some_and(|len| len > 0 && len <= self.max_capture_bytes)
    }
}

/// The middleware function composing the two phases around `next.run`.
///
/// Mount with `axum::middleware::from_fn_with_state(logger, track_requests)`
/// outside the host's auth layer, so the resolved [`CurrentUser`] is visible
/// in the response extensions by the time the post-dispatch phase runs.
pub async fn track_requests(
    State(logger): State<RequestLogger>,
    request: Request,
    next: Next,
) -> Response {
    match logger.before_dispatch(request).await {
        // Body read failed; the framework's error response propagates as-is.
        Err(response) => response,
        // Method excluded from logging (or store unavailable): pass through.
        Ok((request, None)) => next.run(request).await,
        Ok((request, Some(ctx))) => {
            let response = next.run(request).await;
            logger.after_dispatch(ctx, response).await
        }
    }
}
