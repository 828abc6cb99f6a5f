//! # Transcription Pipeline
//!
//! Drives a transcription job from `queued` to a terminal state:
//!
//! 1. `queued → loading_model`
//! 2. Check the (language, model) pair is recognized and downloaded;
//!    otherwise `→ failed` with the catalog's error
//! 3. `→ transcribing`, then run the transcriber on the blocking pool
//! 4. `→ done` with the transcript, or `→ failed` with a generic
//!    transcription error (the underlying cause goes to the log only)

use crate::catalog::ModelCatalog;
use crate::error::{AppError, AppResult};
use crate::jobs::{Job, JobKind, JobRegistry, JobState};
use crate::transcription::Transcriber;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct TranscriptionPipeline {
    jobs: Arc<JobRegistry>,
    catalog: Arc<ModelCatalog>,
    transcriber: Arc<dyn Transcriber>,
}

impl TranscriptionPipeline {
    pub fn new(jobs: Arc<JobRegistry>, catalog: Arc<ModelCatalog>, transcriber: Arc<dyn Transcriber>) -> Self {
        Self {
            jobs,
            catalog,
            transcriber,
        }
    }

    /// Create a `queued` transcription job and start working on it in the
    /// background. Returns the job as created.
    pub fn submit(&self, filename: String, language: String, model: String, audio: Vec<u8>) -> Job {
        let job = self
            .jobs
            .add(JobKind::transcription(filename, language.clone(), model.clone()));
        info!(job_id = %job.id, %language, %model, bytes = audio.len(), "transcription submitted");

        let pipeline = self.clone();
        let id = job.id;
        tokio::spawn(async move {
            if let Err(err) = pipeline.run(id, &language, &model, audio).await {
                error!(job_id = %id, error = %err, "transcription job aborted");
            }
        });
        job
    }

    /// Run the pipeline for an existing `queued` job and return the job in
    /// its terminal state.
    ///
    /// Failures of the work itself are recorded on the job; an `Err` means
    /// the job could not be driven at all (unknown id, job not `queued`).
    pub async fn run(&self, id: Uuid, language: &str, model: &str, audio: Vec<u8>) -> AppResult<Job> {
        self.jobs.transition(id, JobState::LoadingModel)?;

        let handle = match self.catalog.ensure_downloaded(language, model) {
            Ok(handle) => handle,
            Err(err) => {
                warn!(job_id = %id, %language, %model, error = %err, "model unavailable for transcription");
                return self.jobs.fail(id, &err);
            }
        };

        self.jobs.transition(id, JobState::Transcribing)?;

        let transcriber = Arc::clone(&self.transcriber);
        let progress = self.jobs.progress_sink(id);
        let outcome =
            tokio::task::spawn_blocking(move || transcriber.transcribe(&handle, &audio, &progress)).await;

        match outcome {
            Ok(Ok(transcript)) => {
                let job = self
                    .jobs
                    .transition_with(id, JobState::Done, move |job| job.record_transcript(transcript))?;
                info!(job_id = %id, chars = job.transcript().map_or(0, str::len), "transcription finished");
                Ok(job)
            }
            Ok(Err(err)) => {
                error!(job_id = %id, "transcriber failed: {:#}", err);
                self.jobs.fail(id, &transcription_failed())
            }
            Err(join_err) => {
                error!(job_id = %id, error = %join_err, "transcriber panicked");
                self.jobs.fail(id, &transcription_failed())
            }
        }
    }
}

fn transcription_failed() -> AppError {
    AppError::Transcription("transcription failed".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{test_state, wait_until_terminal, FakeStore, FakeTranscriber};
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_not_downloaded_model_fails_without_transcribing() {
        let (state, _, transcriber) = test_state(FakeStore::new(), FakeTranscriber::new());

        let job = state
            .transcriptions
            .submit("a.wav".into(), "en".into(), "tiny".into(), b"hello".to_vec());
        let job = wait_until_terminal(&state.jobs, job.id).await;

        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.error().unwrap().kind, ErrorKind::ModelNotDownloaded);
        assert_eq!(job.transcript(), None);
        assert_eq!(transcriber.calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_language_fails() {
        let (state, _, transcriber) = test_state(FakeStore::new(), FakeTranscriber::new());

        let job = state
            .transcriptions
            .submit("a.wav".into(), "xx".into(), "tiny".into(), Vec::new());
        let job = wait_until_terminal(&state.jobs, job.id).await;

        assert_eq!(job.state, JobState::Failed);
        let failure = job.error().unwrap();
        assert_eq!(failure.kind, ErrorKind::LanguageDoesNotExist);
        assert_eq!(failure.message, "Language xx does not exist");
        assert_eq!(transcriber.calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_model_fails() {
        let (state, _, _) = test_state(FakeStore::new(), FakeTranscriber::new());

        let job = state.jobs.add(JobKind::transcription("a.wav", "de", "tiny.en"));
        let job = state.transcriptions.run(job.id, "de", "tiny.en", Vec::new()).await.unwrap();

        assert_eq!(job.error().unwrap().kind, ErrorKind::ModelDoesNotExist);
    }

    #[tokio::test]
    async fn test_downloaded_model_produces_transcript() {
        let store = FakeStore::new().with_downloaded("en", "tiny");
        let (state, _, transcriber) = test_state(store, FakeTranscriber::new());

        let job = state.jobs.add(JobKind::transcription("a.wav", "en", "tiny"));
        let job = state
            .transcriptions
            .run(job.id, "en", "tiny", b"hello world".to_vec())
            .await
            .unwrap();

        assert_eq!(job.state, JobState::Done);
        assert_eq!(job.transcript(), Some("en/tiny: hello world"));
        assert!(job.error().is_none());
        assert_eq!(transcriber.calls(), 1);
        assert_eq!(job.progress.map(|p| (p.done, p.total)), Some((1, 1)));
    }

    #[tokio::test]
    async fn test_transcriber_error_is_reported_generically() {
        let store = FakeStore::new().with_downloaded("en", "tiny");
        let (state, _, _) = test_state(store, FakeTranscriber::failing());

        let job = state.jobs.add(JobKind::transcription("a.wav", "en", "tiny"));
        let job = state.transcriptions.run(job.id, "en", "tiny", Vec::new()).await.unwrap();

        let failure = job.error().unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(failure.kind, ErrorKind::TranscriptionError);
        assert!(!failure.message.contains("decoder exploded"));
    }

    #[tokio::test]
    async fn test_transcriber_panic_fails_job() {
        let store = FakeStore::new().with_downloaded("en", "tiny");
        let (state, _, _) = test_state(store, FakeTranscriber::panicking());

        let job = state.jobs.add(JobKind::transcription("a.wav", "en", "tiny"));
        let job = state.transcriptions.run(job.id, "en", "tiny", Vec::new()).await.unwrap();

        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.error().unwrap().kind, ErrorKind::TranscriptionError);
    }

    #[tokio::test]
    async fn test_run_rejects_job_that_is_not_queued() {
        let store = FakeStore::new().with_downloaded("en", "tiny");
        let (state, _, transcriber) = test_state(store, FakeTranscriber::new());

        let job = state.jobs.add(JobKind::transcription("a.wav", "en", "tiny"));
        state.transcriptions.run(job.id, "en", "tiny", Vec::new()).await.unwrap();

        let err = state.transcriptions.run(job.id, "en", "tiny", Vec::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalTransition);
        assert_eq!(transcriber.calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_transcriptions_stay_on_their_own_record() {
        let store = FakeStore::new().with_downloaded("en", "tiny").with_downloaded("de", "base");
        let (state, _, _) = test_state(store, FakeTranscriber::new());

        let submitted: HashMap<Uuid, String> = (0..32)
            .map(|i| {
                let (language, model) = if i % 2 == 0 { ("en", "tiny") } else { ("de", "base") };
                let job = state.transcriptions.submit(
                    format!("clip-{}.wav", i),
                    language.into(),
                    model.into(),
                    format!("clip {}", i).into_bytes(),
                );
                (job.id, format!("{}/{}: clip {}", language, model, i))
            })
            .collect();

        for (id, expected) in &submitted {
            let job = wait_until_terminal(&state.jobs, *id).await;
            assert_eq!(job.state, JobState::Done);
            assert_eq!(job.transcript(), Some(expected.as_str()));
        }
        assert_eq!(state.jobs.len(), 32);
    }
}
