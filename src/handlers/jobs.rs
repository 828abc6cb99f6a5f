//! # Job REST API Handlers
//!
//! Submission and polling of transcription and download jobs. Submissions
//! return the freshly created `queued` job immediately; the work happens in
//! the background and clients poll `GET /tasks/{id}/`.
//!
//! ## Available Endpoints:
//! - `POST /tasks/start_transcription/?lang=&model=` - Upload audio (multipart field "file")
//! - `POST /tasks/download_model/?lang=&model=` - Fetch a model
//! - `GET /tasks/list/` - Every job, sorted by id
//! - `GET /tasks/{id}/` - One job

use crate::{error::AppError, state::AppState};
use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpResponse};
use futures_util::stream::StreamExt;
use serde::Deserialize;
use uuid::Uuid;

/// Query string naming a (language, model) pair.
#[derive(Debug, Deserialize)]
pub struct ModelQuery {
    pub lang: String,
    pub model: String,
}

/// Uploaded audio file.
struct Upload {
    filename: String,
    bytes: Vec<u8>,
}

/// Start transcribing an uploaded audio file.
///
/// ## Endpoint: `POST /tasks/start_transcription/?lang=en&model=tiny`
///
/// ## Response:
/// ```json
/// {
///   "id": "5f0c...",
///   "state": "queued",
///   "type": "transcription",
///   "filename": "talk.wav",
///   "language": "en",
///   "model": "tiny",
///   "transcript": null,
///   "error": null,
///   ...
/// }
/// ```
pub async fn start_transcription(
    state: web::Data<AppState>,
    query: web::Query<ModelQuery>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let upload = read_upload(payload, state.config.max_upload_bytes()).await?;
    let ModelQuery { lang, model } = query.into_inner();

    let job = state
        .transcriptions
        .submit(upload.filename, lang, model, upload.bytes);
    Ok(HttpResponse::Ok().json(job))
}

/// Start downloading a model.
///
/// ## Endpoint: `POST /tasks/download_model/?lang=en&model=tiny`
pub async fn download_model(
    state: web::Data<AppState>,
    query: web::Query<ModelQuery>,
) -> Result<HttpResponse, AppError> {
    let ModelQuery { lang, model } = query.into_inner();
    let job = state.downloads.submit(lang, model);
    Ok(HttpResponse::Ok().json(job))
}

/// ## Endpoint: `GET /tasks/list/`
pub async fn list_jobs(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let mut jobs = state.jobs.list();
    jobs.sort_by_key(|job| job.id);
    Ok(HttpResponse::Ok().json(jobs))
}

/// ## Endpoint: `GET /tasks/{id}/`
///
/// An id that is not a UUID cannot name a job, so it is reported as not
/// found rather than malformed.
pub async fn get_job(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let raw = path.into_inner();
    let id = Uuid::parse_str(&raw).map_err(|_| AppError::NotFound(raw.clone()))?;
    let job = state.jobs.get(id)?;
    Ok(HttpResponse::Ok().json(job))
}

/// Read the "file" field of a multipart form, enforcing the size limit.
async fn read_upload(mut payload: Multipart, max_bytes: usize) -> Result<Upload, AppError> {
    let mut upload: Option<Upload> = None;

    while let Some(item) = payload.next().await {
        let mut field: Field =
            item.map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?;

        let content_disposition = field
            .content_disposition()
            .ok_or_else(|| AppError::BadRequest("Missing content disposition".to_string()))?;
        if content_disposition.get_name() != Some("file") {
            while let Some(chunk) = field.next().await {
                chunk.map_err(|e| AppError::BadRequest(format!("Chunk error: {}", e)))?;
            }
            continue;
        }
        let filename = content_disposition
            .get_filename()
            .filter(|name| !name.is_empty())
            .unwrap_or("unknown")
            .to_string();

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| AppError::BadRequest(format!("Chunk error: {}", e)))?;
            if bytes.len() + chunk.len() > max_bytes {
                return Err(AppError::BadRequest(format!(
                    "File too large (max: {} bytes)",
                    max_bytes
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        upload = Some(Upload { filename, bytes });
    }

    upload.ok_or_else(|| AppError::BadRequest("No audio file provided".to_string()))
}
