//! Field capture helpers for the tracking middleware.
//!
//! Pure functions that derive log fields from request parts: client address
//! from proxy headers, query parameters as an ordered mapping, and the guarded
//! request-body capture.

use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap};
use serde_json::{Map, Value};
use std::net::SocketAddr;

/// Derives the client address for a request.
///
/// A non-empty `X-Forwarded-For` header wins: its first comma-separated token
/// is the original client in a `client, proxy1, proxy2, ...` chain. Otherwise
/// the direct connection's remote address is used, and an empty string when
/// neither is available.
pub(crate) fn client_addr(headers: &HeaderMap, connect_info: Option<&ConnectInfo<SocketAddr>>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    if let Some(chain) = forwarded {
        return chain
            .split(',')
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
    }

    connect_info
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default()
}

/// Derives the request host: `Host` header first, URI authority as fallback.
pub(crate) fn host(headers: &HeaderMap, uri: &axum::http::Uri) -> String {
    headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
        .or_else(|| uri.host().map(ToString::to_string))
        .unwrap_or_default()
}

/// Decodes the query string into an insertion-ordered string mapping.
///
/// Repeated keys keep the last value, matching flat key-value log semantics.
pub(crate) fn query_params(query: Option<&str>) -> Map<String, Value> {
    let mut params = Map::new();

    if let Some(raw) = query {
        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            params.insert(key.into_owned(), Value::String(value.into_owned()));
        }
    }

    params
}

/// Outcome of the guarded request-body capture.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum BodyCapture {
    /// No body to capture (empty, uncapturable, or over the cap).
    Skipped,
    /// The payload converted to a key-value mapping; stored as a JSON object.
    Mapping(String),
    /// The payload is a well-formed value that is not a mapping; stored as-is.
    Raw(String),
    /// The payload did not parse under its declared content type. The host
    /// framework's own parser surfaces this to the client; the capture stores
    /// nothing and must not swallow the failure.
    Malformed,
}

impl BodyCapture {
    /// The text to persist, if this capture produced one.
    pub(crate) fn as_stored(&self) -> Option<&str> {
        match self {
            Self::Mapping(text) | Self::Raw(text) => Some(text),
            Self::Skipped | Self::Malformed => None,
        }
    }
}

/// Attempts to capture a buffered request body as a key-value mapping.
///
/// JSON objects and form payloads become mappings. A well-formed JSON value
/// that is not an object is the one recognized fallback: it is stored as-is
/// rather than failing. Anything declared as JSON that does not parse is
/// [`BodyCapture::Malformed`]; other content types are kept as raw text.
pub(crate) fn capture_body(bytes: &[u8], content_type: Option<&str>) -> BodyCapture {
    if bytes.is_empty() {
        return BodyCapture::Skipped;
    }

    let content_type = content_type.unwrap_or_default();

    if content_type.starts_with("application/json") {
        return match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(map)) => BodyCapture::Mapping(Value::Object(map).to_string()),
            Ok(other) => BodyCapture::Raw(other.to_string()),
            Err(_) => BodyCapture::Malformed,
        };
    }

    if content_type.starts_with("application/x-www-form-urlencoded") {
        let mut map = Map::new();
        for (key, value) in form_urlencoded::parse(bytes) {
            map.insert(key.into_owned(), Value::String(value.into_owned()));
        }
        return BodyCapture::Mapping(Value::Object(map).to_string());
    }

    BodyCapture::Raw(String::from_utf8_lossy(bytes).into_owned())
}
