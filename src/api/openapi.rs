use super::handlers::{auth, health, kv, tenders};
use crate::tenders::{
    analyzer::{FinRequirement, TechRequirement},
    TenderAnalysis,
};
use crate::users::UserProfile;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::login,
        auth::session_check,
        auth::logout,
        auth::logout_all,
        kv::get_value,
        kv::put_value,
        kv::patch_value,
        tenders::upload,
        tenders::analyze,
        tenders::latest_analysis,
    ),
    components(schemas(
        health::Health,
        auth::LoginRequest,
        auth::LoginResponse,
        auth::SessionCheck,
        auth::OkResponse,
        auth::Detail,
        kv::KvEntry,
        kv::KvWrite,
        tenders::UploadForm,
        tenders::Uploaded,
        tenders::AnalyzeRequest,
        tenders::Analyzed,
        TenderAnalysis,
        TechRequirement,
        FinRequirement,
        UserProfile,
    )),
    tags(
        (name = "health", description = "Liveness and build information"),
        (name = "auth", description = "Session login, check and revocation"),
        (name = "kv", description = "Shared JSON key/value store"),
        (name = "tenders", description = "Tender document upload and analysis"),
    )
)]
pub struct ApiDoc;
