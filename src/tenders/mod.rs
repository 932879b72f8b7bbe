//! Tender document intake.
//!
//! Uploaded files are written under `<data-path>/tenders/{tid}/uploads/`; file
//! and analysis records are kept in process memory with 1-based sequential ids.

pub mod analyzer;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{info, instrument};
use ulid::Ulid;
use utoipa::ToSchema;

use self::analyzer::{AnalysisResult, FinRequirement, TechRequirement};

const MAX_ANALYZED_BYTES: usize = 2_000_000;

#[derive(ToSchema, Serialize, Deserialize, Clone, Debug)]
pub struct TenderFile {
    pub id: u64,
    pub tender_id: i64,
    pub filename: String,
    pub mime: Option<String>,
    pub size: usize,
    pub storage_key: String,
    #[schema(value_type = Object)]
    pub uploaded_by: Value,
    pub uploaded_at: String,
}

#[derive(ToSchema, Serialize, Deserialize, Clone, Debug)]
pub struct TenderAnalysis {
    pub id: u64,
    pub tender_id: i64,
    pub file_id: Option<u64>,
    pub model: String,
    pub lang: String,
    pub summary_ar: String,
    pub summary_en: String,
    pub requirements_tech: Vec<TechRequirement>,
    pub requirements_fin: Vec<FinRequirement>,
    pub questions: Vec<String>,
    pub raw_json: String,
    #[schema(value_type = Object)]
    pub created_by: Value,
    pub created_at: String,
}

#[derive(Default)]
struct TenderDb {
    files: Vec<TenderFile>,
    analyses: Vec<TenderAnalysis>,
}

pub struct TenderService {
    data_path: PathBuf,
    db: Mutex<TenderDb>,
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Keep only the final path component and replace anything outside `[A-Za-z0-9._-]`.
fn sanitize_filename(filename: &str) -> String {
    let base = Path::new(filename)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

impl TenderService {
    #[must_use]
    pub fn new(data_path: PathBuf) -> Self {
        Self {
            data_path,
            db: Mutex::new(TenderDb::default()),
        }
    }

    /// Persist an uploaded file and record it.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    #[instrument(skip(self, bytes, uploaded_by))]
    pub async fn save_file(
        &self,
        tid: i64,
        filename: &str,
        mime: Option<String>,
        bytes: &[u8],
        uploaded_by: Value,
    ) -> Result<TenderFile> {
        let storage_key = format!(
            "tenders/{tid}/uploads/{}_{}_{}",
            Utc::now().timestamp(),
            Ulid::new(),
            sanitize_filename(filename)
        );
        let path = self.data_path.join(&storage_key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("failed to store {}", path.display()))?;

        let mut db = self.db.lock().await;
        let record = TenderFile {
            id: db.files.len() as u64 + 1,
            tender_id: tid,
            filename: filename.to_string(),
            mime,
            size: bytes.len(),
            storage_key,
            uploaded_by,
            uploaded_at: now_rfc3339(),
        };
        db.files.push(record.clone());
        info!(file_id = record.id, size = record.size, "tender file stored");
        Ok(record)
    }

    /// Run the analyzer over one file of the tender.
    ///
    /// Uses the first listed `file_ids` entry belonging to the tender, or the
    /// tender's latest upload when none are listed.
    ///
    /// # Errors
    /// Returns an error if the stored file cannot be read.
    #[instrument(skip(self, created_by))]
    pub async fn analyze(
        &self,
        tid: i64,
        file_ids: Option<&[u64]>,
        lang: &str,
        created_by: Value,
    ) -> Result<TenderAnalysis> {
        let file = {
            let db = self.db.lock().await;
            let mut files = db.files.iter().filter(|file| file.tender_id == tid);
            match file_ids {
                Some(ids) if !ids.is_empty() => files.find(|file| ids.contains(&file.id)),
                _ => files.last(),
            }
            .cloned()
        };

        let content = match &file {
            Some(file) => {
                let path = self.data_path.join(&file.storage_key);
                let mut bytes = tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("failed to read {}", path.display()))?;
                bytes.truncate(MAX_ANALYZED_BYTES);
                bytes
            }
            None => Vec::new(),
        };

        let result = analyzer::analyze_doc(&content);
        let raw_json = serde_json::to_string(&result).context("failed to encode analysis")?;
        let AnalysisResult {
            model,
            summary_ar,
            summary_en,
            requirements_tech,
            requirements_fin,
            questions,
        } = result;

        let mut db = self.db.lock().await;
        let record = TenderAnalysis {
            id: db.analyses.len() as u64 + 1,
            tender_id: tid,
            file_id: file.map(|file| file.id),
            model,
            lang: lang.to_string(),
            summary_ar,
            summary_en,
            requirements_tech,
            requirements_fin,
            questions,
            raw_json,
            created_by,
            created_at: now_rfc3339(),
        };
        db.analyses.push(record.clone());
        info!(analysis_id = record.id, "tender analyzed");
        Ok(record)
    }

    pub async fn latest_analysis(&self, tid: i64) -> Option<TenderAnalysis> {
        self.db
            .lock()
            .await
            .analyses
            .iter()
            .rev()
            .find(|analysis| analysis.tender_id == tid)
            .cloned()
    }
}
