//! Authenticated principal propagation between the host's auth layer and the
//! tracking middleware.
//!
//! The logger runs outside routing and auth, so the resolved identity is not
//! known when the log record is created. The host's auth stage resolves a
//! [`CurrentUser`] during dispatch and places it in the **response**
//! extensions; the logger reads it back once the inner pipeline returns.
//!
//! A missing extension is treated the same as [`CurrentUser::Anonymous`]: the
//! record's user reference stays NULL.
//!
//! # Wiring example
//!
//! ```no_run
//! use axum::{extract::Request, middleware::Next, response::Response};
//! use axum_request_tracking::principal::CurrentUser;
//!
//! /// Host-side auth middleware, mounted inside the tracking layer.
//! async fn resolve_user(request: Request, next: Next) -> Response {
//!     let user = match request.headers().get("authorization") {
//!         Some(_) => CurrentUser::authenticated(42, "alice"),
//!         None => CurrentUser::Anonymous,
//!     };
//!
//!     let mut response = next.run(request).await;
//!     // Surface the resolved identity to outer layers.
//!     response.extensions_mut().insert(user);
//!     response
//! }
//! ```

use serde::{Deserialize, Serialize};

/// The identity resolved for a request, or the anonymous sentinel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurrentUser {
    /// No authenticated identity; the log record stores NULL.
    #[default]
    Anonymous,
    /// An authenticated principal.
    Authenticated {
        /// Stable identifier of the principal in the host's user store.
        id: i64,
        /// Login name, stored alongside the id for readable log rows.
        username: String,
    },
}

impl CurrentUser {
    /// Create an authenticated principal.
    #[must_use]
    pub fn authenticated(id: i64, username: impl Into<String>) -> Self {
        Self::Authenticated {
            id,
            username: username.into(),
        }
    }

    /// Whether this is the anonymous sentinel.
    #[must_use]
    pub const fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    /// The `(user_id, username)` pair to persist, NULL for anonymous.
    #[must_use]
    pub fn as_log_fields(&self) -> (Option<i64>, Option<&str>) {
        match self {
            Self::Anonymous => (None, None),
            Self::Authenticated { id, username } => (Some(*id), Some(username.as_str())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_maps_to_null_fields() {
        let user = CurrentUser::Anonymous;
        assert!(user.is_anonymous());
        assert_eq!(user.as_log_fields(), (None, None));
    }

    #[test]
    fn test_authenticated_fields() {
        let user = CurrentUser::authenticated(7, "alice");
        assert!(!user.is_anonymous());
        assert_eq!(user.as_log_fields(), (Some(7), Some("alice")));
    }

    #[test]
    fn test_default_is_anonymous() {
        assert!(CurrentUser::default().is_anonymous());
    }
}
