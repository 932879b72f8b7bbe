use axum::{
    extract::{Extension, Multipart, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, instrument};
use utoipa::ToSchema;

use super::detail;
use crate::guard::{AuthenticatedUser, ClientRequest, SessionGuard};
use crate::tenders::{TenderAnalysis, TenderService};

const UPLOAD_FIELD: &str = "f";

/// Multipart body of an upload.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    f: Vec<u8>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Uploaded {
    pub file_id: u64,
    pub filename: String,
    pub size: usize,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub file_ids: Option<Vec<u64>>,
    #[serde(default = "default_lang")]
    pub lang: String,
}

impl Default for AnalyzeRequest {
    fn default() -> Self {
        Self {
            file_ids: None,
            lang: default_lang(),
        }
    }
}

fn default_lang() -> String {
    "bi".to_string()
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Analyzed {
    pub analysis_id: u64,
    pub model: String,
}

// Stored as `uploaded_by` / `created_by`.
fn actor(user: &AuthenticatedUser) -> Value {
    user.profile.get("id").cloned().unwrap_or(Value::Null)
}

#[utoipa::path(
    post,
    path = "/api/tenders/{tid}/files",
    params(("tid" = i64, Path, description = "Tender id")),
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File stored", body = Uploaded),
        (status = 400, description = "Missing `f` field"),
        (status = 401, description = "Not authenticated")
    ),
    tag = "tenders"
)]
#[instrument(skip_all)]
pub async fn upload(
    Path(tid): Path<i64>,
    guard: Extension<Arc<SessionGuard>>,
    tenders: Extension<Arc<TenderService>>,
    client: ClientRequest,
    mut multipart: Multipart,
) -> Response {
    let user = match guard.require_active_user(&client).await {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };

    let mut upload = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some(UPLOAD_FIELD) {
                    continue;
                }
                let filename = field.file_name().unwrap_or("upload").to_string();
                let mime = field.content_type().map(str::to_string);
                match field.bytes().await {
                    Ok(bytes) => upload = Some((filename, mime, bytes)),
                    Err(err) => return (err.status(), err.body_text()).into_response(),
                }
                break;
            }
            Ok(None) => break,
            Err(err) => return (err.status(), err.body_text()).into_response(),
        }
    }

    let Some((filename, mime, bytes)) = upload else {
        return detail(StatusCode::BAD_REQUEST, "missing file field f");
    };

    match tenders
        .save_file(tid, &filename, mime, &bytes, actor(&user))
        .await
    {
        Ok(file) => Json(Uploaded {
            file_id: file.id,
            filename: file.filename,
            size: file.size,
        })
        .into_response(),
        Err(err) => {
            error!("Failed to store tender file: {err:#}");
            detail(StatusCode::INTERNAL_SERVER_ERROR, "upload failed")
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/tenders/{tid}/analyze",
    params(("tid" = i64, Path, description = "Tender id")),
    request_body = AnalyzeRequest,
    responses(
        (status = 200, description = "Analysis stored", body = Analyzed),
        (status = 401, description = "Not authenticated")
    ),
    tag = "tenders"
)]
#[instrument(skip_all)]
pub async fn analyze(
    Path(tid): Path<i64>,
    guard: Extension<Arc<SessionGuard>>,
    tenders: Extension<Arc<TenderService>>,
    client: ClientRequest,
    body: Option<Json<AnalyzeRequest>>,
) -> Response {
    let user = match guard.require_active_user(&client).await {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };

    let request = body.map(|Json(request)| request).unwrap_or_default();
    match tenders
        .analyze(tid, request.file_ids.as_deref(), &request.lang, actor(&user))
        .await
    {
        Ok(analysis) => Json(Analyzed {
            analysis_id: analysis.id,
            model: analysis.model,
        })
        .into_response(),
        Err(err) => {
            error!("Tender analysis failed: {err:#}");
            detail(StatusCode::INTERNAL_SERVER_ERROR, "analysis failed")
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/tenders/{tid}/analysis",
    params(("tid" = i64, Path, description = "Tender id")),
    responses(
        (status = 200, description = "Latest analysis", body = TenderAnalysis),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No analysis yet")
    ),
    tag = "tenders"
)]
#[instrument(skip_all)]
pub async fn latest_analysis(
    Path(tid): Path<i64>,
    guard: Extension<Arc<SessionGuard>>,
    tenders: Extension<Arc<TenderService>>,
    client: ClientRequest,
) -> Response {
    if let Err(err) = guard.require_active_user(&client).await {
        return err.into_response();
    }

    match tenders.latest_analysis(tid).await {
        Some(analysis) => Json(analysis).into_response(),
        None => detail(StatusCode::NOT_FOUND, "no analysis"),
    }
}
