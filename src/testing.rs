//! In-memory stand-ins for the model store and the transcriber, plus
//! helpers shared by the workflow and handler tests.

use crate::catalog::{CatalogEntry, ModelHandle, ModelKey, ModelStore};
use crate::config::{AppConfig, LanguageConfig, ModelConfig};
use crate::jobs::{Job, JobRegistry};
use crate::progress::ProgressSink;
use crate::state::AppState;
use crate::transcription::Transcriber;
use anyhow::{anyhow, Result};
use futures_util::future::BoxFuture;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use uuid::Uuid;

/// Small catalog: German tiny/base, English tiny/base/tiny.en.
pub fn test_languages() -> Vec<LanguageConfig> {
    let model = |name: &str, repo: &str| ModelConfig {
        name: name.to_string(),
        repo: repo.to_string(),
        description: format!("{} test model", name),
        size_mb: 1,
    };
    vec![
        LanguageConfig {
            code: "en".into(),
            name: "English".into(),
            models: vec![
                model("tiny", "openai/whisper-tiny"),
                model("base", "openai/whisper-base"),
                model("tiny.en", "openai/whisper-tiny.en"),
            ],
        },
        LanguageConfig {
            code: "de".into(),
            name: "German".into(),
            models: vec![
                model("tiny", "openai/whisper-tiny"),
                model("base", "openai/whisper-base"),
            ],
        },
    ]
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.models.catalog = test_languages();
    config
}

fn fake_path(entry: &CatalogEntry) -> PathBuf {
    PathBuf::from("/models").join(&entry.language).join(&entry.model)
}

/// [`ModelStore`] that never touches the network or the disk.
#[derive(Debug, Default)]
pub struct FakeStore {
    downloaded: HashSet<ModelKey>,
    fail: bool,
    gate: Option<Arc<Semaphore>>,
    acquire_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report this pair as downloaded by an earlier run.
    pub fn with_downloaded(mut self, language: &str, model: &str) -> Self {
        self.downloaded.insert(ModelKey::new(language, model));
        self
    }

    /// Every acquisition fails.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Acquisitions wait for [`FakeStore::release`] before finishing.
    pub fn paused(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Let one paused acquisition finish.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub fn acquire_calls(&self) -> usize {
        self.acquire_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl ModelStore for FakeStore {
    fn acquire<'a>(
        &'a self,
        entry: &'a CatalogEntry,
        progress: ProgressSink,
    ) -> BoxFuture<'a, Result<PathBuf>> {
        Box::pin(async move {
            self.acquire_calls.fetch_add(1, Ordering::SeqCst);
            let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(running, Ordering::SeqCst);

            progress.report(0, 2);
            match &self.gate {
                Some(gate) => {
                    if let Ok(permit) = gate.acquire().await {
                        permit.forget();
                    }
                }
                None => tokio::time::sleep(Duration::from_millis(5)).await,
            }
            progress.report(2, 2);

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if self.fail {
                Err(anyhow!("network unreachable"))
            } else {
                Ok(fake_path(entry))
            }
        })
    }

    fn locate(&self, entry: &CatalogEntry) -> Option<PathBuf> {
        self.downloaded.contains(&entry.key()).then(|| fake_path(entry))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Behavior {
    Echo,
    Fail,
    Panic,
}

/// [`Transcriber`] that echoes the uploaded bytes back as text.
///
/// The transcript is `"<language>/<model>: <audio as UTF-8>"`.
#[derive(Debug)]
pub struct FakeTranscriber {
    behavior: Behavior,
    calls: AtomicUsize,
}

impl FakeTranscriber {
    pub fn new() -> Self {
        Self {
            behavior: Behavior::Echo,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            behavior: Behavior::Fail,
            ..Self::new()
        }
    }

    pub fn panicking() -> Self {
        Self {
            behavior: Behavior::Panic,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transcriber for FakeTranscriber {
    fn transcribe(&self, model: &ModelHandle, audio: &[u8], progress: &ProgressSink) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        progress.report(0, 1);
        std::thread::sleep(Duration::from_millis(2));

        match self.behavior {
            Behavior::Echo => {
                progress.report(1, 1);
                Ok(format!(
                    "{}/{}: {}",
                    model.entry.language,
                    model.entry.model,
                    String::from_utf8_lossy(audio)
                ))
            }
            Behavior::Fail => Err(anyhow!("decoder exploded")),
            Behavior::Panic => panic!("decoder panicked"),
        }
    }
}

/// Application state wired to fakes, with the fakes handed back for
/// inspection.
pub fn test_state(
    store: FakeStore,
    transcriber: FakeTranscriber,
) -> (AppState, Arc<FakeStore>, Arc<FakeTranscriber>) {
    let store = Arc::new(store);
    let transcriber = Arc::new(transcriber);
    let state = AppState::new(test_config(), store.clone(), transcriber.clone());
    (state, store, transcriber)
}

/// Poll until the job reaches `done` or `failed`.
pub async fn wait_until_terminal(jobs: &JobRegistry, id: Uuid) -> Job {
    wait_for(jobs, id, |job| job.state.is_terminal()).await
}

/// Poll until `ready` holds for the job, giving up after five seconds.
pub async fn wait_for(jobs: &JobRegistry, id: Uuid, ready: impl Fn(&Job) -> bool) -> Job {
    for _ in 0..1000 {
        let job = jobs.get(id).unwrap();
        if ready(&job) {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job {} did not reach the expected state: {:?}", id, jobs.get(id));
}
