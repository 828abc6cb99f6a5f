//! # Job Records
//!
//! A job is either a transcription or a model download. Both kinds live in
//! one uniform [`Job`] struct; the kind-specific payload sits in the tagged
//! [`JobKind`] enum so the registry stores a single entity type and the
//! workflows pattern-match on the kind they drive.
//!
//! ## State Machines:
//! - **Transcription**: `queued → loading_model → transcribing → done`
//! - **Download**: `queued → downloading → done`
//!
//! Any non-terminal state may move to `failed`. Nothing moves backwards,
//! skips forward, or leaves a terminal state.

use crate::error::{AppError, ErrorKind};
use crate::progress::Progress;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    LoadingModel,
    Transcribing,
    Downloading,
    Done,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::LoadingModel => "loading_model",
            JobState::Transcribing => "transcribing",
            JobState::Downloading => "downloading",
            JobState::Done => "done",
            JobState::Failed => "failed",
        }
    }

    /// `done` and `failed` are final.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a job ended in `failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&AppError> for JobFailure {
    fn from(err: &AppError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Payload of a transcription job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionJob {
    /// Name of the uploaded file
    pub filename: String,
    pub language: String,
    pub model: String,
    /// Set when the job reaches `done`
    pub transcript: Option<String>,
    /// Set when the job reaches `failed`
    pub error: Option<JobFailure>,
}

/// Payload of a model download job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadJob {
    pub language: String,
    pub model: String,
    pub error: Option<JobFailure>,
}

/// Kind-specific part of a job, fixed at creation.
///
/// Serialized inline into the job with a `"type"` tag:
/// `{"type": "transcription", "filename": ..., ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobKind {
    Transcription(TranscriptionJob),
    Download(DownloadJob),
}

impl JobKind {
    pub fn transcription(
        filename: impl Into<String>,
        language: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        JobKind::Transcription(TranscriptionJob {
            filename: filename.into(),
            language: language.into(),
            model: model.into(),
            transcript: None,
            error: None,
        })
    }

    pub fn download(language: impl Into<String>, model: impl Into<String>) -> Self {
        JobKind::Download(DownloadJob {
            language: language.into(),
            model: model.into(),
            error: None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            JobKind::Transcription(_) => "transcription",
            JobKind::Download(_) => "download",
        }
    }

    /// Whether this kind's state machine has the edge `from → to`.
    pub fn allows(&self, from: JobState, to: JobState) -> bool {
        use JobState::*;

        match self {
            JobKind::Transcription(_) => matches!(
                (from, to),
                (Queued, LoadingModel)
                    | (LoadingModel, Transcribing)
                    | (Transcribing, Done)
                    | (Queued | LoadingModel | Transcribing, Failed)
            ),
            JobKind::Download(_) => matches!(
                (from, to),
                (Queued, Downloading) | (Downloading, Done) | (Queued | Downloading, Failed)
            ),
        }
    }
}

/// A job tracked by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub state: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: JobKind,
}

impl Job {
    /// New job in the `queued` state.
    pub fn new(id: Uuid, kind: JobKind) -> Self {
        let now = Utc::now();
        Self {
            id,
            state: JobState::Queued,
            progress: None,
            created_at: now,
            updated_at: now,
            kind,
        }
    }

    pub fn error(&self) -> Option<&JobFailure> {
        match &self.kind {
            JobKind::Transcription(job) => job.error.as_ref(),
            JobKind::Download(job) => job.error.as_ref(),
        }
    }

    pub fn transcript(&self) -> Option<&str> {
        match &self.kind {
            JobKind::Transcription(job) => job.transcript.as_deref(),
            JobKind::Download(_) => None,
        }
    }

    pub(crate) fn record_failure(&mut self, failure: JobFailure) {
        match &mut self.kind {
            JobKind::Transcription(job) => job.error = Some(failure),
            JobKind::Download(job) => job.error = Some(failure),
        }
    }

    /// Download jobs have no transcript; the call is a no-op for them.
    pub(crate) fn record_transcript(&mut self, text: String) {
        if let JobKind::Transcription(job) = &mut self.kind {
            job.transcript = Some(text);
        }
    }
}
