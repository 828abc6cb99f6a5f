//! # Error Handling
//!
//! One error type, [`AppError`], is shared by the job registry, the model
//! catalog, the background workflows and the HTTP handlers.
//!
//! ## Two ways an error reaches a client:
//! - **Synchronously**: a handler returns `Err(AppError)` and actix-web turns
//!   it into a plain-text response through [`ResponseError`].
//! - **Through a job**: a workflow records the error on the job as its
//!   terminal `failed` state (see `jobs::record::JobFailure`), because the
//!   submitting request has already returned.
//!
//! ## HTTP Status Code Mapping:
//! - NotFound / LanguageDoesNotExist / ModelDoesNotExist → 404
//! - ModelNotDownloaded → 412 (precondition failed)
//! - BadRequest → 400
//! - everything else → 500

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable name of an error, stored on failed jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    LanguageDoesNotExist,
    ModelDoesNotExist,
    ModelNotDownloaded,
    TranscriptionError,
    AcquisitionError,
    IllegalTransition,
    BadRequest,
    Internal,
    ConfigError,
}

/// Application error taxonomy.
///
/// ## Error Categories:
/// - **Lookup**: `NotFound` (unknown job id)
/// - **Catalog preconditions**: `LanguageDoesNotExist`, `ModelDoesNotExist`,
///   `ModelNotDownloaded`
/// - **External operations**: `Transcription`, `Acquisition`
/// - **Internal consistency**: `IllegalTransition`, `Internal`, `ConfigError`
/// - **Client input**: `BadRequest`
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// No job with this identifier was ever created
    NotFound(String),

    /// The language code is not part of the model catalog
    LanguageDoesNotExist(String),

    /// The language exists but has no model with this name
    ModelDoesNotExist { language: String, model: String },

    /// The pair is known but its files are not present locally
    ModelNotDownloaded { language: String, model: String },

    /// The speech recognizer failed
    Transcription(String),

    /// Fetching model files failed
    Acquisition(String),

    /// A workflow tried to move a job along an edge its state machine forbids
    IllegalTransition { from: String, to: String },

    /// Client sent an unusable request
    BadRequest(String),

    /// Unexpected server-side failure
    Internal(String),

    /// Configuration file or environment variable problems
    ConfigError(String),
}

impl AppError {
    /// Machine-readable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::LanguageDoesNotExist(_) => ErrorKind::LanguageDoesNotExist,
            AppError::ModelDoesNotExist { .. } => ErrorKind::ModelDoesNotExist,
            AppError::ModelNotDownloaded { .. } => ErrorKind::ModelNotDownloaded,
            AppError::Transcription(_) => ErrorKind::TranscriptionError,
            AppError::Acquisition(_) => ErrorKind::AcquisitionError,
            AppError::IllegalTransition { .. } => ErrorKind::IllegalTransition,
            AppError::BadRequest(_) => ErrorKind::BadRequest,
            AppError::Internal(_) => ErrorKind::Internal,
            AppError::ConfigError(_) => ErrorKind::ConfigError,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(id) => write!(f, "Job {} not found", id),
            AppError::LanguageDoesNotExist(language) => {
                write!(f, "Language {} does not exist", language)
            }
            AppError::ModelDoesNotExist { language, model } => {
                write!(f, "Model {} does not exist for language {}", model, language)
            }
            AppError::ModelNotDownloaded { language, model } => {
                write!(f, "Model {} for language {} is not downloaded", model, language)
            }
            AppError::Transcription(msg) => write!(f, "Transcription error: {}", msg),
            AppError::Acquisition(msg) => write!(f, "Model acquisition error: {}", msg),
            AppError::IllegalTransition { from, to } => {
                write!(f, "Illegal job state transition from {} to {}", from, to)
            }
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

/// Converts errors into plain-text HTTP responses.
///
/// The body is the `Display` text; clients that need the machine-readable
/// kind read it from the job record instead.
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_)
            | AppError::LanguageDoesNotExist(_)
            | AppError::ModelDoesNotExist { .. } => StatusCode::NOT_FOUND,
            AppError::ModelNotDownloaded { .. } => StatusCode::PRECONDITION_FAILED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Transcription(_)
            | AppError::Acquisition(_)
            | AppError::IllegalTransition { .. }
            | AppError::Internal(_)
            | AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .content_type("text/plain; charset=utf-8")
            .body(self.to_string())
    }
}

/// When you use `?` with an anyhow::Error, it becomes an AppError::Internal.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(format!("{:#}", err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

/// Shorthand for `Result<T, AppError>`.
pub type AppResult<T> = Result<T, AppError>;
