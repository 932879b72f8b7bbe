//! Session endpoints: login, session check, logout and global revocation.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;

use super::detail;
use crate::guard::{ClientRequest, SessionGuard, SessionId};
use crate::users::{normalize_email, valid_email, UserDirectory, UserProfile};

const ADMIN_ROLE: &str = "admin";

#[derive(ToSchema, Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub ok: bool,
    pub user: UserProfile,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionCheck {
    pub ok: bool,
    pub session_id: String,
    #[schema(value_type = Object)]
    pub user: Value,
    /// Hex SHA-256 of the pinned user agent.
    pub ua: String,
    /// Pinned network prefix.
    pub ip: String,
    /// Unix seconds of the previous access.
    pub last: u64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Detail {
    pub detail: String,
}

fn internal_error() -> Response {
    detail(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session issued", body = LoginResponse),
        (status = 400, description = "Malformed email", body = Detail),
        (status = 401, description = "Invalid credentials", body = Detail),
        (status = 500, description = "Session could not be issued", body = Detail)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    guard: Extension<Arc<SessionGuard>>,
    users: Extension<Arc<dyn UserDirectory>>,
    client: ClientRequest,
    Json(request): Json<LoginRequest>,
) -> Response {
    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return detail(StatusCode::BAD_REQUEST, "Invalid email");
    }

    // Password hashing is CPU bound.
    let directory = users.0.clone();
    let password = request.password;
    let verified =
        tokio::task::spawn_blocking(move || directory.verify(&email, &password)).await;
    let profile = match verified {
        Ok(Ok(Some(profile))) => profile,
        Ok(Ok(None)) => {
            info!("Login rejected");
            return detail(StatusCode::UNAUTHORIZED, "Invalid credentials");
        }
        Ok(Err(err)) => {
            error!("User directory lookup failed: {err}");
            return internal_error();
        }
        Err(err) => {
            error!("Credential check task failed: {err}");
            return internal_error();
        }
    };

    let session_id = match SessionId::generate() {
        Ok(session_id) => session_id,
        Err(err) => {
            error!("Failed to generate session id: {err}");
            return internal_error();
        }
    };

    let mut headers = HeaderMap::new();
    if let Err(err) = guard.issue(&mut headers, &client, &session_id).await {
        error!("Failed to build session cookie: {err}");
        return internal_error();
    }

    let bound = match serde_json::to_value(&profile) {
        Ok(payload) => guard.bind_user(&session_id, payload).await.map_err(|err| err.to_string()),
        Err(err) => Err(err.to_string()),
    };
    if let Err(err) = bound {
        // Never leave an issued session without a user.
        guard.drop_session(&session_id).await;
        error!("Failed to bind user to session: {err}");
        return internal_error();
    }

    info!(user_id = profile.id, "Login succeeded");
    (
        StatusCode::OK,
        headers,
        Json(LoginResponse {
            ok: true,
            user: profile,
        }),
    )
        .into_response()
}

#[utoipa::path(
    get,
    path = "/api/auth/session-check",
    responses(
        (status = 200, description = "Session is active", body = SessionCheck),
        (status = 401, description = "Not authenticated", body = Detail)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn session_check(
    guard: Extension<Arc<SessionGuard>>,
    client: ClientRequest,
) -> Response {
    let user = match guard.require_active_user(&client).await {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };
    let session = user.session;

    Json(SessionCheck {
        ok: true,
        session_id: session.session_id.as_str().to_string(),
        user: Value::Object(user.profile),
        ua: session.fingerprint.user_agent_hex(),
        ip: session.fingerprint.network_prefix,
        last: session.previous_seen,
    })
    .into_response()
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Session cleared", body = OkResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn logout(guard: Extension<Arc<SessionGuard>>, client: ClientRequest) -> Response {
    if let Ok(session_id) = guard.session_id(&client) {
        guard.drop_session(&session_id).await;
    }

    // Always clear the cookie, even if the session record was missing.
    (cleared_cookie(&guard), Json(OkResponse { ok: true })).into_response()
}

#[utoipa::path(
    post,
    path = "/api/auth/logout_all",
    responses(
        (status = 200, description = "Every session revoked", body = OkResponse),
        (status = 401, description = "Not authenticated", body = Detail),
        (status = 403, description = "Caller is not an admin", body = Detail)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn logout_all(guard: Extension<Arc<SessionGuard>>, client: ClientRequest) -> Response {
    let user = match guard.require_active_user(&client).await {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };

    if user.profile.get("role").and_then(Value::as_str) != Some(ADMIN_ROLE) {
        warn!(
            session = user.session.session_id.short(),
            "logout_all refused for non-admin"
        );
        return detail(StatusCode::FORBIDDEN, "Forbidden");
    }

    let dropped = guard.rotate_all().await;
    info!(dropped, "logout_all completed");

    (cleared_cookie(&guard), Json(OkResponse { ok: true })).into_response()
}

fn cleared_cookie(guard: &SessionGuard) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Err(err) = guard.clear_cookie(&mut headers) {
        error!("Failed to build clearing cookie: {err}");
    }
    headers
}

#[cfg(test)]
mod tests {
    use crate::api::tests::{json_body, peer, session_pair, TestApp, T0, UA};
    use anyhow::Result;
    use axum::{
        body::Body,
        http::{
            header::{CONTENT_TYPE, COOKIE, SET_COOKIE, USER_AGENT},
            Method, Request, StatusCode,
        },
    };
    use serde_json::json;
    use std::net::{IpAddr, Ipv4Addr};

    fn login_request(email: &str, password: &str) -> Result<Request<Body>> {
        Ok(Request::builder()
            .method(Method::POST)
            .uri("/api/auth/login")
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, UA)
            .body(Body::from(
                json!({"email": email, "password": password}).to_string(),
            ))?)
    }

    fn with_cookie(method: Method, uri: &str, cookie: &str) -> Result<Request<Body>> {
        Ok(Request::builder()
            .method(method)
            .uri(uri)
            .header(USER_AGENT, UA)
            .header(COOKIE, cookie)
            .body(Body::empty())?)
    }

    #[tokio::test]
    async fn login_sets_cookie_and_returns_profile() -> Result<()> {
        let app = TestApp::new().await?;
        let response = app
            .send(peer(), login_request(" Admin@Nawafed.dev ", "admin-pass")?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);

        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(cookie.starts_with("nwgd_session="));
        assert!(cookie.contains("HttpOnly"));

        let body = json_body(response).await?;
        assert_eq!(body["ok"], true);
        assert_eq!(body["user"]["email"], "admin@nawafed.dev");
        assert_eq!(body["user"]["role"], "admin");
        assert_eq!(app.services.guard.session_count().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn login_rejects_bad_credentials() -> Result<()> {
        let app = TestApp::new().await?;
        for (email, password) in [
            ("admin@nawafed.dev", "wrong"),
            ("ghost@nawafed.dev", "admin-pass"),
        ] {
            let response = app.send(peer(), login_request(email, password)?).await?;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert!(response.headers().get(SET_COOKIE).is_none());
            assert_eq!(
                json_body(response).await?,
                json!({"detail": "Invalid credentials"})
            );
        }
        assert_eq!(app.services.guard.session_count().await, 0);
        Ok(())
    }

    #[tokio::test]
    async fn login_rejects_malformed_email() -> Result<()> {
        let app = TestApp::new().await?;
        let response = app
            .send(peer(), login_request("not-an-email", "admin-pass")?)
            .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn session_check_echoes_metadata() -> Result<()> {
        let app = TestApp::new().await?;
        let cookie = app.login("member@nawafed.dev", "member-pass").await?;
        app.clock.advance(5);

        let response = app
            .send(
                peer(),
                with_cookie(Method::GET, "/api/auth/session-check", &cookie)?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await?;
        assert_eq!(body["ok"], true);
        assert_eq!(body["user"]["id"], 2);
        assert_eq!(body["ip"], "10.1.2");
        assert_eq!(body["last"], T0);
        assert_eq!(body["ua"].as_str().map(str::len), Some(64));
        Ok(())
    }

    #[tokio::test]
    async fn session_check_failures_are_uniform() -> Result<()> {
        let app = TestApp::new().await?;
        let cookie = app.login("member@nawafed.dev", "member-pass").await?;

        let other_network = IpAddr::V4(Ipv4Addr::new(10, 9, 9, 9));
        let cases = [
            (peer(), with_cookie(Method::GET, "/api/auth/session-check", "a=b")?),
            (
                peer(),
                with_cookie(
                    Method::GET,
                    "/api/auth/session-check",
                    &format!("{cookie}tampered"),
                )?,
            ),
            (
                other_network,
                with_cookie(Method::GET, "/api/auth/session-check", &cookie)?,
            ),
        ];
        for (peer, request) in cases {
            let response = app.send(peer, request).await?;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(
                json_body(response).await?,
                json!({"detail": "Not authenticated"})
            );
        }
        Ok(())
    }

    #[tokio::test]
    async fn logout_drops_session_and_clears_cookie() -> Result<()> {
        let app = TestApp::new().await?;
        let cookie = app.login("member@nawafed.dev", "member-pass").await?;

        let response = app
            .send(peer(), with_cookie(Method::POST, "/api/auth/logout", &cookie)?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(session_pair(&response)?, "nwgd_session=");
        assert_eq!(json_body(response).await?, json!({"ok": true}));
        assert_eq!(app.services.guard.session_count().await, 0);

        let response = app
            .send(
                peer(),
                with_cookie(Method::GET, "/api/auth/session-check", &cookie)?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn logout_without_session_still_succeeds() -> Result<()> {
        let app = TestApp::new().await?;
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/auth/logout")
            .body(Body::empty())?;
        let response = app.send(peer(), request).await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(SET_COOKIE).is_some());
        Ok(())
    }

    #[tokio::test]
    async fn logout_all_requires_admin() -> Result<()> {
        let app = TestApp::new().await?;
        let member = app.login("member@nawafed.dev", "member-pass").await?;
        let admin = app.login("admin@nawafed.dev", "admin-pass").await?;

        let response = app
            .send(peer(), with_cookie(Method::POST, "/api/auth/logout_all", &member)?)
            .await?;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(app.services.guard.session_count().await, 2);

        let response = app
            .send(peer(), with_cookie(Method::POST, "/api/auth/logout_all", &admin)?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(app.services.guard.session_count().await, 0);

        let response = app
            .send(peer(), with_cookie(Method::POST, "/api/auth/logout_all", &admin)?)
            .await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }
}
