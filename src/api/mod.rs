use crate::{guard::SessionGuard, kv::KvStore, tenders::TenderService, users::UserDirectory};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, MatchedPath},
    http::{
        header::{CONTENT_TYPE, COOKIE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::{get, post},
    Extension, Router,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub(crate) mod handlers;
mod openapi;

pub use handlers::kv::SyncToken;
pub use openapi::ApiDoc;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

// Multipart uploads carry whole tender documents.
const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Everything the handlers reach through request extensions.
#[derive(Clone)]
pub struct Services {
    pub guard: Arc<SessionGuard>,
    pub users: Arc<dyn UserDirectory>,
    pub kv: Arc<KvStore>,
    pub tenders: Arc<TenderService>,
    pub sync_token: SyncToken,
}

/// Build the application router without the CORS and listener wiring.
pub fn router(services: Services) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/session-check", get(handlers::auth::session_check))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/auth/logout_all", post(handlers::auth::logout_all))
        .route(
            "/kv/:key",
            get(handlers::kv::get_value)
                .put(handlers::kv::put_value)
                .patch(handlers::kv::patch_value),
        )
        .route("/api/tenders/:tid/files", post(handlers::tenders::upload))
        .route("/api/tenders/:tid/analyze", post(handlers::tenders::analyze))
        .route(
            "/api/tenders/:tid/analysis",
            get(handlers::tenders::latest_analysis),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
                .layer(Extension(services.guard))
                .layer(Extension(services.users))
                .layer(Extension(services.kv))
                .layer(Extension(services.tenders))
                .layer(Extension(services.sync_token)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to bind or serve
pub async fn new(port: u16, frontend_origin: Option<&str>, services: Services) -> Result<()> {
    let app = router(services).layer(cors(frontend_origin)?);

    let listener = TcpListener::bind(format!("::0:{port}"))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;

    info!("Listening on [::]:{}", port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

// Credentials are only allowed together with an exact origin.
fn cors(frontend_origin: Option<&str>) -> Result<CorsLayer> {
    let cors = CorsLayer::new()
        .allow_headers([
            CONTENT_TYPE,
            COOKIE,
            HeaderName::from_static("x-sync-token"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH]);

    Ok(match frontend_origin {
        Some(origin) => {
            let origin = HeaderValue::from_str(origin.trim_end_matches('/'))
                .with_context(|| format!("Invalid frontend origin: {origin}"))?;
            cors.allow_origin(AllowOrigin::exact(origin))
                .allow_credentials(true)
        }
        None => cors.allow_origin(Any),
    })
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {err}");
        return;
    }
    info!("Gracefully shutdown");
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
