//! Database models that map to the `request_logs` table.
//!
//! These structures represent rows in the log store and provide conversions
//! between HTTP types and their persisted representations.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{TrackingError, TrackingResult};

/// One logged HTTP request/response cycle.
///
/// Maps to the `request_logs` table. The pre-dispatch columns are always
/// present; identity, body and response columns are filled in by later writes
/// and stay NULL when the pipeline failed before reaching them.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RequestLogRecord {
    /// Database-assigned unique identifier
    pub id: i64,
    /// Unix timestamp in milliseconds, taken before the handler ran
    pub requested_at: i64,
    /// Request path (no query string)
    pub path: String,
    /// Derived client address; empty string when unavailable
    pub remote_addr: String,
    /// Request host
    pub host: String,
    /// HTTP method name
    pub method: String,
    /// Query parameters as a JSON object, insertion-ordered
    pub query_params: String,
    /// Authenticated principal id, NULL for anonymous requests
    pub user_id: Option<i64>,
    /// Authenticated principal name, NULL for anonymous requests
    pub username: Option<String>,
    /// Captured request payload (JSON mapping when convertible, raw otherwise)
    pub request_body: Option<String>,
    /// Rendered response body
    pub response_body: Option<String>,
    /// Response status code
    pub status_code: Option<i32>,
    /// Latency from `requested_at` to response finalization, whole ms
    pub response_ms: Option<i64>,
}

/// The pre-dispatch fields of a record, before the database assigns an id.
///
/// Built by the middleware at intercept time and handed to
/// [`Repository::insert_request_log`](super::repository::Repository::insert_request_log).
#[derive(Debug, Clone)]
pub struct NewRequestLog {
    /// Unix timestamp in milliseconds
    pub requested_at: i64,
    /// Request path
    pub path: String,
    /// Derived client address
    pub remote_addr: String,
    /// Request host
    pub host: String,
    /// HTTP method name
    pub method: String,
    /// Query parameters serialized as a JSON object
    pub query_params: String,
}

impl NewRequestLog {
    /// Creates the pre-dispatch fields for a new log row.
    ///
    /// `query_params` is serialized here so the database layer only ever sees
    /// TEXT; with `serde_json`'s `preserve_order` feature the mapping keeps
    /// the request's parameter order.
    pub fn new(
        requested_at: DateTime<Utc>,
        path: impl Into<String>,
        remote_addr: impl Into<String>,
        host: impl Into<String>,
        method: impl Into<String>,
        query_params: &Map<String, Value>,
    ) -> Self {
        Self {
            requested_at: requested_at.timestamp_millis(),
            path: path.into(),
            remote_addr: remote_addr.into(),
            host: host.into(),
            method: method.into(),
            query_params: Value::Object(query_params.clone()).to_string(),
        }
    }
}

impl RequestLogRecord {
    /// Parses the persisted query parameters back into an ordered mapping.
    pub fn query_params_map(&self) -> TrackingResult<Map<String, Value>> {
        let value: Value = serde_json::from_str(&self.query_params).map_err(|e| {
            TrackingError::decoding(
                format!("Failed to parse query_params: {}", self.query_params),
                Some(Box::new(e)),
            )
        })?;

        match value {
            Value::Object(map) => Ok(map),
            other => Err(TrackingError::decoding(
                format!("query_params is not a JSON object: {other}"),
                None,
            )),
        }
    }

    /// Parses the captured request body as JSON, if one was stored.
    ///
    /// Returns `None` when no body was captured. Non-JSON captures (raw text
    /// payloads) are returned as a JSON string value.
    #[must_use]
    pub fn request_body_value(&self) -> Option<Value> {
        self.request_body.as_ref().map(|raw| {
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()))
        })
    }

    /// Converts `requested_at` back to a UTC timestamp.
    pub fn requested_at_datetime(&self) -> TrackingResult<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.requested_at)
            .single()
            .ok_or_else(|| {
                TrackingError::decoding(
                    format!("requested_at out of range: {}", self.requested_at),
                    None,
                )
            })
    }

    /// Whether the record was finalized with response fields.
    ///
    /// `false` means the pipeline failed before the post-dispatch write ran.
    #[must_use]
    pub const fn is_finalized(&self) -> bool {
        self.status_code.is_some() && self.response_ms.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(query_params: &str) -> RequestLogRecord {
        RequestLogRecord {
            id: 1,
            requested_at: 1_706_745_600_123,
            path: "/api/items".to_string(),
            remote_addr: "1.2.3.4".to_string(),
            host: "api.example.com".to_string(),
            method: "GET".to_string(),
            query_params: query_params.to_string(),
            user_id: None,
            username: None,
            request_body: None,
            response_body: None,
            status_code: None,
            response_ms: None,
        }
    }

    #[test]
    fn test_new_request_log_serializes_params_in_order() {
        let mut params = Map::new();
        params.insert("b".to_string(), Value::String("2".to_string()));
        params.insert("a".to_string(), Value::String("1".to_string()));

        let log = NewRequestLog::new(
            Utc.timestamp_millis_opt(1_706_745_600_000).single().unwrap(),
            "/api/items",
            "1.2.3.4",
            "api.example.com",
            "GET",
            &params,
        );

        assert_eq!(log.requested_at, 1_706_745_600_000);
        // preserve_order keeps insertion order through serialization
        assert_eq!(log.query_params, r#"{"b":"2","a":"1"}"#);
    }

    #[test]
    fn test_query_params_round_trip() {
        let record = sample_record(r#"{"page":"2","sort":"name"}"#);
        let map = record.query_params_map().unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(map["page"], Value::String("2".to_string()));
        assert_eq!(map["sort"], Value::String("name".to_string()));
    }

    #[test]
    fn test_query_params_rejects_non_object() {
        let record = sample_record(r#"["not","a","map"]"#);
        assert!(record.query_params_map().is_err());
    }

    #[test]
    fn test_request_body_value_raw_fallback() {
        let mut record = sample_record("{}");
        record.request_body = Some("plain text payload".to_string());

        assert_eq!(
            record.request_body_value(),
            Some(Value::String("plain text payload".to_string()))
        );
    }

    #[test]
    fn test_requested_at_datetime_round_trip() {
        let record = sample_record("{}");
        let dt = record.requested_at_datetime().unwrap();
        assert_eq!(dt.timestamp_millis(), record.requested_at);
    }

    #[test]
    fn test_is_finalized() {
        let mut record = sample_record("{}");
        assert!(!record.is_finalized());

        record.status_code = Some(200);
        record.response_ms = Some(52);
        assert!(record.is_finalized());
    }
}
