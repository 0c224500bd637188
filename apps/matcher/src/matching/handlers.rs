//! Axum route handlers for the Match API.

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{AppError, MISSING_INPUT_MESSAGE};
use crate::matching::extract::{extract_text, DocumentKind, ExtractionError};
use crate::session::extract::LoggedInUser;
use crate::state::AppState;

pub const RESUME_FIELD: &str = "resume";
pub const JOB_DESCRIPTION_FIELD: &str = "job_description";

#[derive(Debug, Default, Deserialize)]
pub struct TextMatchRequest {
    #[serde(default)]
    pub resume_text: String,
    #[serde(default)]
    pub job_description: String,
}

#[derive(Debug, Serialize)]
pub struct MatchResponse {
    /// Percentage in [0, 100], 2 decimals.
    pub score: f64,
    pub scorer_backend: &'static str,
    pub document_kind: Option<DocumentKind>,
    pub resume_chars: usize,
}

struct UploadedResume {
    file_name: String,
    content_type: Option<String>,
    bytes: Bytes,
}

/// POST /api/v1/match
///
/// Multipart form: `resume` (PDF or DOCX file) and `job_description` (text).
/// Without both, answers with the missing-input warning and computes nothing.
pub async fn handle_match(
    State(state): State<AppState>,
    user: LoggedInUser,
    mut multipart: Multipart,
) -> Result<Json<MatchResponse>, AppError> {
    let mut resume: Option<UploadedResume> = None;
    let mut job_description = String::new();

    while let Some(field) = multipart.next_field().await.map_err(malformed_upload)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            RESUME_FIELD => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(String::from);
                let bytes = field.bytes().await.map_err(malformed_upload)?;
                if !bytes.is_empty() {
                    resume = Some(UploadedResume {
                        file_name,
                        content_type,
                        bytes,
                    });
                }
            }
            JOB_DESCRIPTION_FIELD => {
                job_description = field.text().await.map_err(malformed_upload)?;
            }
            _ => {}
        }
    }

    let Some(resume) = resume else {
        return Err(AppError::Validation(MISSING_INPUT_MESSAGE.to_string()));
    };
    if job_description.trim().is_empty() {
        return Err(AppError::Validation(MISSING_INPUT_MESSAGE.to_string()));
    }

    let kind = DocumentKind::detect(&resume.file_name, resume.content_type.as_deref())
        .map_err(|e| match e {
            ExtractionError::Unsupported(_) => AppError::Validation(e.to_string()),
            other => AppError::Extraction(other),
        })?;
    let resume_text =
        extract_text(resume.bytes, kind, state.config.max_extracted_bytes).await?;
    let result = state
        .scorer
        .compute_similarity(&resume_text, &job_description)
        .await?;

    info!(
        "Scored '{}' for '{}': {}%",
        resume.file_name, user.username, result.score
    );

    Ok(Json(MatchResponse {
        score: result.score,
        scorer_backend: state.scorer.backend(),
        document_kind: Some(kind),
        resume_chars: resume_text.chars().count(),
    }))
}

/// POST /api/v1/match/text
///
/// Scores already-extracted resume text against a job description.
pub async fn handle_match_text(
    State(state): State<AppState>,
    user: LoggedInUser,
    Json(request): Json<TextMatchRequest>,
) -> Result<Json<MatchResponse>, AppError> {
    if request.resume_text.trim().is_empty() || request.job_description.trim().is_empty() {
        return Err(AppError::Validation(MISSING_INPUT_MESSAGE.to_string()));
    }

    let result = state
        .scorer
        .compute_similarity(&request.resume_text, &request.job_description)
        .await?;

    info!("Scored pasted resume for '{}': {}%", user.username, result.score);

    Ok(Json(MatchResponse {
        score: result.score,
        scorer_backend: state.scorer.backend(),
        document_kind: None,
        resume_chars: request.resume_text.chars().count(),
    }))
}

/// Body-limit rejections keep their 413; anything else is a bad request.
fn malformed_upload(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::Validation(format!("Malformed upload: {e}"))
    }
}
