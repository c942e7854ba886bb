//! End-to-end tests for the tracking middleware.
//!
//! Each test drives a real axum `Router` through `tower::ServiceExt::oneshot`
//! with the tracking layer mounted outside a small auth middleware, backed by
//! a temporary SQLite log store.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, Request},
    http::{header, Method, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use axum_request_tracking::db::models::RequestLogRecord;
use axum_request_tracking::db::{create_pool, repository::Repository};
use axum_request_tracking::middleware::{track_requests, MethodSelector, RequestLogger};
use axum_request_tracking::principal::CurrentUser;

/// Router plus the repository observing its log store. The temp dir must
/// outlive the pool, so the harness is kept whole for the test's duration.
struct TestApp {
    _dir: tempfile::TempDir,
    repo: Arc<Repository>,
    app: Router,
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> Response {
        self.app
            .clone()
            .oneshot(request)
            .await
            .expect("router call failed")
    }

    async fn latest_record(&self) -> RequestLogRecord {
        self.repo
            .recent_request_logs(1)
            .await
            .expect("Failed to query logs")
            .into_iter()
            .next()
            .expect("No log record found")
    }

    async fn count(&self) -> i64 {
        self.repo
            .count_request_logs()
            .await
            .expect("Failed to count logs")
    }
}

async fn hello() -> &'static str {
    "hello world"
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_millis(50)).await;
    "done"
}

async fn create_item(Json(payload): Json<Value>) -> Json<Value> {
    Json(json!({ "received": payload }))
}

/// Test auth stage: resolves a principal from the `x-test-user` header and
/// surfaces it to outer layers through the response extensions.
async fn resolve_user(request: Request, next: Next) -> Response {
    let user = request
        .headers()
        .get("x-test-user")
        .and_then(|value| value.to_str().ok())
        .map_or(CurrentUser::Anonymous, |name| {
            CurrentUser::authenticated(7, name)
        });

    let mut response = next.run(request).await;
    response.extensions_mut().insert(user);
    response
}

async fn build_app(selector: MethodSelector) -> TestApp {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let url = format!("sqlite:{}/logs.db", dir.path().display());
    let pool = create_pool(&url).await.expect("Failed to create pool");
    let repo = Arc::new(Repository::new(pool));

    let logger = RequestLogger::new(Arc::clone(&repo)).with_methods(selector);

    // track_requests is mounted outermost so the auth layer's resolved
    // principal is visible when the post-dispatch phase runs.
    let app = Router::new()
        .route("/hello", get(hello))
        .route("/slow", get(slow))
        .route("/items", post(create_item))
        .layer(middleware::from_fn(resolve_user))
        .layer(middleware::from_fn_with_state(logger, track_requests));

    TestApp {
        _dir: dir,
        repo,
        app,
    }
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(header::HOST, "api.example.com")
        .body(Body::empty())
        .expect("Failed to build request")
}

fn json_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::HOST, "api.example.com")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

#[tokio::test]
async fn test_logged_request_creates_and_finalizes_one_record() {
    let test = build_app(MethodSelector::All).await;

    let mut request = get_request("/hello?b=2&a=1");
    request
        .headers_mut()
        .insert("x-forwarded-for", "1.2.3.4, 5.6.7.8".parse().unwrap());

    let response = test.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(test.count().await, 1);

    let record = test.latest_record().await;
    assert_eq!(record.path, "/hello");
    assert_eq!(record.method, "GET");
    assert_eq!(record.host, "api.example.com");
    // First token of the forwarded chain is the original client
    assert_eq!(record.remote_addr, "1.2.3.4");
    assert_eq!(record.status_code, Some(200));
    assert_eq!(record.response_body, Some("hello world".to_string()));
    assert!(record.is_finalized());
}

#[tokio::test]
async fn test_excluded_method_is_not_logged() {
    let test = build_app(MethodSelector::only([Method::GET])).await;

    let response = test.send(json_request("/items", r#"{"k":"v"}"#)).await;

    // The response passes through unchanged and no record exists
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value, json!({ "received": { "k": "v" } }));

    assert_eq!(test.count().await, 0);
}

#[tokio::test]
async fn test_remote_addr_from_connection_when_no_forwarded_header() {
    let test = build_app(MethodSelector::All).await;

    let mut request = get_request("/hello");
    let addr: SocketAddr = "9.9.9.9:4242".parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));

    test.send(request).await;

    let record = test.latest_record().await;
    assert_eq!(record.remote_addr, "9.9.9.9");
}

#[tokio::test]
async fn test_remote_addr_empty_when_unavailable() {
    let test = build_app(MethodSelector::All).await;

    test.send(get_request("/hello")).await;

    let record = test.latest_record().await;
    assert_eq!(record.remote_addr, "");
}

#[tokio::test]
async fn test_anonymous_request_stores_null_user() {
    let test = build_app(MethodSelector::All).await;

    test.send(get_request("/hello")).await;

    let record = test.latest_record().await;
    // Auth ran (the resolver middleware is mounted) but resolved anonymous
    assert_eq!(record.user_id, None);
    assert_eq!(record.username, None);
}

#[tokio::test]
async fn test_authenticated_request_stores_principal() {
    let test = build_app(MethodSelector::All).await;

    let mut request = get_request("/hello");
    request
        .headers_mut()
        .insert("x-test-user", "alice".parse().unwrap());

    test.send(request).await;

    let record = test.latest_record().await;
    assert_eq!(record.user_id, Some(7));
    assert_eq!(record.username, Some("alice".to_string()));
}

#[tokio::test]
async fn test_latency_covers_handler_delay() {
    let test = build_app(MethodSelector::All).await;

    test.send(get_request("/slow")).await;

    let record = test.latest_record().await;
    let response_ms = record.response_ms.expect("latency not recorded");
    // The handler sleeps 50ms; allow generous headroom for CI machines
    assert!(response_ms >= 50, "latency {response_ms}ms below handler delay");
    assert!(response_ms < 5_000, "latency {response_ms}ms implausibly high");
}

#[tokio::test]
async fn test_json_object_body_captured_as_mapping() {
    let test = build_app(MethodSelector::All).await;

    let response = test.send(json_request("/items", r#"{"k":"v"}"#)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let record = test.latest_record().await;
    assert_eq!(record.request_body, Some(r#"{"k":"v"}"#.to_string()));
    assert_eq!(record.request_body_value(), Some(json!({ "k": "v" })));
    assert!(record.is_finalized());
}

#[tokio::test]
async fn test_non_mapping_json_body_stored_as_is() {
    let test = build_app(MethodSelector::All).await;

    let response = test.send(json_request("/items", "[1,2,3]")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let record = test.latest_record().await;
    assert_eq!(record.request_body, Some("[1,2,3]".to_string()));
}

#[tokio::test]
async fn test_malformed_body_propagates_and_record_stays_partial() {
    let test = build_app(MethodSelector::All).await;

    let response = test.send(json_request("/items", "{not json")).await;

    // The framework's own parse error reaches the client unchanged
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // The record was created but never finalized
    assert_eq!(test.count().await, 1);
    let record = test.latest_record().await;
    assert_eq!(record.request_body, None);
    assert_eq!(record.status_code, None);
    assert_eq!(record.response_ms, None);
    assert!(!record.is_finalized());
}

#[tokio::test]
async fn test_query_params_round_trip() {
    let test = build_app(MethodSelector::All).await;

    test.send(get_request("/hello?page=2&sort=name&q=hello%20world"))
        .await;

    let record = test.latest_record().await;
    let reloaded = test
        .repo
        .get_request_log(record.id)
        .await
        .unwrap()
        .expect("record missing");

    let params = reloaded.query_params_map().unwrap();
    assert_eq!(params.len(), 3);
    assert_eq!(params["page"], json!("2"));
    assert_eq!(params["sort"], json!("name"));
    assert_eq!(params["q"], json!("hello world"));
}
