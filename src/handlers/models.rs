//! # Model Catalog REST API Handlers
//!
//! Read-only views of the model catalog. Downloads are started through
//! `POST /tasks/download_model/`.
//!
//! ## Available Endpoints:
//! - `GET /models/available` - Every recognized (language, model) pair
//! - `GET /models/downloaded` - Pairs whose files are on disk
//! - `GET /models/{lang}/{model}` - One pair and whether it is downloaded

use crate::{error::AppError, state::AppState};
use actix_web::{web, HttpResponse};

/// ## Response:
/// ```json
/// [
///   {
///     "language": "en",
///     "language_name": "English",
///     "model": "tiny",
///     "repo": "openai/whisper-tiny",
///     "description": "Fastest, basic accuracy",
///     "size_mb": 39
///   }
/// ]
/// ```
pub async fn available_models(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.catalog.available()))
}

pub async fn downloaded_models(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.catalog.downloaded()))
}

/// 404 with the catalog's message for an unknown language or model.
pub async fn model_entry(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, AppError> {
    let (language, model) = path.into_inner();
    let status = state.catalog.entry(&language, &model)?;
    Ok(HttpResponse::Ok().json(status))
}
