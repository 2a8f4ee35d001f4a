use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tokio_util::io::ReaderStream;

use crate::careers::input::NewApplication;
use crate::careers::workflow::{
    SubmitOutcome, APPLICATION_NOT_FOUND_MESSAGE, NOT_FOUND_MESSAGE, RESUME_NOT_FOUND_MESSAGE,
};
use crate::errors::AppError;
use crate::models::application::{ApplicationDetail, ApplicationSummary};
use crate::state::AppState;

pub const ALREADY_APPLIED_MESSAGE: &str =
    "You already applied for this job. We'll reach you if your skills match.";

#[derive(Debug, Serialize)]
pub struct SubmittedResponse {
    pub message: &'static str,
    pub id: i64,
}

#[derive(Debug, Serialize)]
pub struct AlreadyAppliedResponse {
    pub already_applied: bool,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// POST /api/careers/apply
pub async fn handle_apply(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let upload = state.resumes.receive(multipart).await?;

    let application = match NewApplication::from_form(&upload.fields) {
        Ok(application) => application,
        Err(e) => {
            if let Some(resume) = upload.resume {
                resume.abort().await;
            }
            return Err(e);
        }
    };

    let response = match state.workflow.submit(application, upload.resume).await? {
        SubmitOutcome::Created(id) => (
            StatusCode::CREATED,
            Json(SubmittedResponse {
                message: "Application submitted",
                id,
            }),
        )
            .into_response(),
        SubmitOutcome::AlreadyApplied => (
            StatusCode::OK,
            Json(AlreadyAppliedResponse {
                already_applied: true,
                message: ALREADY_APPLIED_MESSAGE,
            }),
        )
            .into_response(),
    };
    Ok(response)
}

/// GET /api/careers
pub async fn handle_list(
    State(state): State<AppState>,
) -> Result<Json<Vec<ApplicationSummary>>, AppError> {
    Ok(Json(state.workflow.list().await?))
}

/// GET /api/careers/:id
pub async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApplicationDetail>, AppError> {
    let id = parse_id(&id, NOT_FOUND_MESSAGE)?;
    Ok(Json(state.workflow.get(id).await?))
}

/// GET /api/careers/:id/resume
pub async fn handle_download_resume(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_id(&id, RESUME_NOT_FOUND_MESSAGE)?;
    let download = state.workflow.resume_download(id).await?;

    let content_type = HeaderValue::from_str(&download.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str(&content_disposition(&download.file_name))
        .map_err(|e| AppError::Internal(e.into()))?;

    let headers = [
        (header::CONTENT_TYPE, content_type),
        (header::CONTENT_DISPOSITION, disposition),
        (header::CONTENT_LENGTH, HeaderValue::from(download.size_bytes)),
    ];
    let body = Body::from_stream(ReaderStream::new(download.file));
    Ok((headers, body).into_response())
}

/// DELETE /api/careers/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = parse_id(&id, APPLICATION_NOT_FOUND_MESSAGE)?;
    state.workflow.delete(id).await?;
    Ok(Json(MessageResponse {
        message: "Application deleted",
    }))
}

/// An id that is not an integer names no application.
fn parse_id(raw: &str, not_found: &str) -> Result<i64, AppError> {
    raw.parse::<i64>()
        .map_err(|_| AppError::NotFound(not_found.to_string()))
}

/// `attachment` disposition with an ASCII `filename` and an RFC 5987
/// `filename*` carrying the exact UTF-8 name.
fn content_disposition(file_name: &str) -> String {
    let ascii: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();

    let mut encoded = String::with_capacity(file_name.len() * 3);
    for byte in file_name.bytes() {
        if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }

    format!("attachment; filename=\"{ascii}\"; filename*=UTF-8''{encoded}")
}
