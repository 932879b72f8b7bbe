//! Shared key/value endpoints. Reads are public, writes need the sync token.

use axum::{
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{error, instrument, warn};
use utoipa::{IntoParams, ToSchema};

use super::{auth::OkResponse, detail};
use crate::kv::KvStore;

pub const SYNC_TOKEN_HEADER: &str = "x-sync-token";

/// Token required for writes. `None` rejects every write.
#[derive(Clone, Default)]
pub struct SyncToken(Option<SecretString>);

impl SyncToken {
    #[must_use]
    pub fn new(token: Option<SecretString>) -> Self {
        Self(token.filter(|token| !token.expose_secret().is_empty()))
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.0.is_some()
    }

    fn accepts(&self, presented: Option<&str>) -> bool {
        match (&self.0, presented) {
            (Some(expected), Some(presented)) => expected
                .expose_secret()
                .as_bytes()
                .ct_eq(presented.as_bytes())
                .into(),
            _ => false,
        }
    }
}

impl std::fmt::Debug for SyncToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = if self.is_configured() { "***" } else { "unset" };
        f.debug_tuple("SyncToken").field(&value).finish()
    }
}

#[derive(Deserialize, IntoParams, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct TokenQuery {
    /// Alternative to the `x-sync-token` header.
    token: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct KvEntry {
    pub key: String,
    #[schema(value_type = Object)]
    pub value: Value,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct KvWrite {
    #[schema(value_type = Object)]
    pub value: Value,
}

fn authorize(sync_token: &SyncToken, headers: &HeaderMap, query: &TokenQuery) -> bool {
    let presented = headers
        .get(SYNC_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .or(query.token.as_deref());
    sync_token.accepts(presented)
}

#[utoipa::path(
    get,
    path = "/kv/{key}",
    params(("key" = String, Path, description = "Entry key")),
    responses(
        (status = 200, description = "Stored value, null when absent", body = KvEntry)
    ),
    tag = "kv"
)]
#[instrument(skip_all)]
pub async fn get_value(Path(key): Path<String>, kv: Extension<Arc<KvStore>>) -> Json<KvEntry> {
    let value = kv.get(&key).await.unwrap_or(Value::Null);
    Json(KvEntry { key, value })
}

#[utoipa::path(
    put,
    path = "/kv/{key}",
    params(("key" = String, Path, description = "Entry key"), TokenQuery),
    request_body = KvWrite,
    responses(
        (status = 200, description = "Value replaced", body = OkResponse),
        (status = 401, description = "Missing or wrong sync token"),
        (status = 500, description = "Store could not be loaded or written")
    ),
    tag = "kv"
)]
#[instrument(skip_all)]
pub async fn put_value(
    Path(key): Path<String>,
    Query(query): Query<TokenQuery>,
    kv: Extension<Arc<KvStore>>,
    sync_token: Extension<SyncToken>,
    headers: HeaderMap,
    Json(body): Json<KvWrite>,
) -> Response {
    write(&key, &query, &kv, &sync_token, &headers, body.value, false).await
}

#[utoipa::path(
    patch,
    path = "/kv/{key}",
    params(("key" = String, Path, description = "Entry key"), TokenQuery),
    request_body = KvWrite,
    responses(
        (status = 200, description = "Objects merged shallowly, anything else replaced", body = OkResponse),
        (status = 401, description = "Missing or wrong sync token"),
        (status = 500, description = "Store could not be loaded or written")
    ),
    tag = "kv"
)]
#[instrument(skip_all)]
pub async fn patch_value(
    Path(key): Path<String>,
    Query(query): Query<TokenQuery>,
    kv: Extension<Arc<KvStore>>,
    sync_token: Extension<SyncToken>,
    headers: HeaderMap,
    Json(body): Json<KvWrite>,
) -> Response {
    write(&key, &query, &kv, &sync_token, &headers, body.value, true).await
}

async fn write(
    key: &str,
    query: &TokenQuery,
    kv: &KvStore,
    sync_token: &SyncToken,
    headers: &HeaderMap,
    value: Value,
    merge: bool,
) -> Response {
    if !authorize(sync_token, headers, query) {
        warn!("kv write rejected: bad sync token");
        return detail(StatusCode::UNAUTHORIZED, "Unauthorized");
    }

    let result = if merge {
        kv.merge(key, value).await
    } else {
        kv.put(key, value).await
    };
    if let Err(err) = result {
        error!("kv write failed: {err:#}");
        return detail(StatusCode::INTERNAL_SERVER_ERROR, "write failed");
    }

    Json(OkResponse { ok: true }).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::{json_body, peer, TestApp, SYNC};
    use anyhow::Result;
    use axum::{
        body::Body,
        http::{header::CONTENT_TYPE, Method, Request},
    };
    use serde_json::json;

    fn write_request(method: Method, uri: &str, token: Option<&str>, value: &Value) -> Result<Request<Body>> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(SYNC_TOKEN_HEADER, token);
        }
        Ok(builder.body(Body::from(json!({ "value": value }).to_string()))?)
    }

    #[test]
    fn sync_token_comparison() {
        let token = SyncToken::new(Some(SecretString::from("abc")));
        assert!(token.accepts(Some("abc")));
        assert!(!token.accepts(Some("abd")));
        assert!(!token.accepts(Some("ab")));
        assert!(!token.accepts(None));

        let unset = SyncToken::new(None);
        assert!(!unset.accepts(Some("")));
        assert!(!SyncToken::new(Some(SecretString::from(""))).is_configured());
        assert_eq!(format!("{token:?}"), "SyncToken(\"***\")");
    }

    #[tokio::test]
    async fn get_missing_key_is_null() -> Result<()> {
        let app = TestApp::new().await?;
        let response = app
            .send(peer(), Request::builder().uri("/kv/none").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await?, json!({"key": "none", "value": null}));
        Ok(())
    }

    #[tokio::test]
    async fn put_then_patch_with_header_token() -> Result<()> {
        let app = TestApp::new().await?;
        let response = app
            .send(
                peer(),
                write_request(Method::PUT, "/kv/settings", Some(SYNC), &json!({"a": 1}))?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .send(
                peer(),
                write_request(Method::PATCH, "/kv/settings", Some(SYNC), &json!({"b": 2}))?,
            )
            .await?;
        assert_eq!(json_body(response).await?, json!({"ok": true}));
        assert_eq!(
            app.services.kv.get("settings").await,
            Some(json!({"a": 1, "b": 2}))
        );
        Ok(())
    }

    #[tokio::test]
    async fn write_over_unreadable_store_fails_without_clobbering() -> Result<()> {
        let app = TestApp::new().await?;
        let path = app.services.kv.path().to_path_buf();
        std::fs::write(&path, "{\"keep\": truncated")?;

        let response = app
            .send(
                peer(),
                write_request(Method::PUT, "/kv/k", Some(SYNC), &json!(1))?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await?, json!({"detail": "write failed"}));
        assert_eq!(std::fs::read_to_string(&path)?, "{\"keep\": truncated");
        Ok(())
    }

    #[tokio::test]
    async fn query_token_is_accepted() -> Result<()> {
        let app = TestApp::new().await?;
        let uri = format!("/kv/list?token={SYNC}");
        let response = app
            .send(peer(), write_request(Method::PUT, &uri, None, &json!([1, 2]))?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(app.services.kv.get("list").await, Some(json!([1, 2])));
        Ok(())
    }

    #[tokio::test]
    async fn writes_without_valid_token_are_rejected() -> Result<()> {
        let app = TestApp::new().await?;
        for token in [None, Some("wrong")] {
            let response = app
                .send(peer(), write_request(Method::PUT, "/kv/k", token, &json!(1))?)
                .await?;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
        assert_eq!(app.services.kv.get("k").await, None);
        Ok(())
    }
}
