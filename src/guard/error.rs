//! Error kinds raised by the session guard.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::warn;

/// Why a request failed session authentication.
///
/// Every kind is terminal for the request and maps to the same client-facing
/// response; the variant only surfaces in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("no session")]
    NoSession,
    #[error("bad session signature")]
    BadSignature,
    #[error("session expired")]
    SessionExpired,
    #[error("idle timeout")]
    IdleTimeout,
    #[error("browser changed")]
    BrowserChanged,
    #[error("network changed")]
    NetworkChanged,
    #[error("session user missing")]
    SessionUserMissing,
}

impl AuthError {
    /// Stable identifier used as the `reason` field in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoSession => "no_session",
            Self::BadSignature => "bad_signature",
            Self::SessionExpired => "session_expired",
            Self::IdleTimeout => "idle_timeout",
            Self::BrowserChanged => "browser_changed",
            Self::NetworkChanged => "network_changed",
            Self::SessionUserMissing => "session_user_missing",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        warn!(reason = self.as_str(), "request rejected by session guard");
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Not authenticated" })),
        )
            .into_response()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    #[error("user profile must be a JSON object")]
    NotAMapping,
    #[error("no session to bind the user to")]
    UnknownSession,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("SESSION_SECRET is empty")]
    EmptySecret,
    #[error("invalid SameSite policy: {0}")]
    InvalidSameSite(String),
}
