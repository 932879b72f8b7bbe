pub mod auth;
pub mod health;
pub mod kv;
pub mod tenders;

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// `{"detail": ...}` error body with the given status.
pub(crate) fn detail(status: StatusCode, message: &str) -> axum::response::Response {
    (status, Json(json!({ "detail": message }))).into_response()
}
