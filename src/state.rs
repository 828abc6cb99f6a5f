//! # Application State
//!
//! Everything the HTTP handlers share, constructed once in `main` (or by a
//! test with fakes) and handed to actix-web through `web::Data`.
//!
//! ## Shared Mutable State:
//! Only the job registry and the catalog's downloaded set change at
//! runtime, and both synchronize internally. `AppState` itself is a bundle
//! of `Arc`s, so cloning it per worker is cheap.

use crate::catalog::{ModelCatalog, ModelStore};
use crate::config::AppConfig;
use crate::jobs::JobRegistry;
use crate::transcription::Transcriber;
use crate::workflows::{DownloadWorkflow, TranscriptionPipeline};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct AppState {
    /// Configuration as loaded at startup
    pub config: Arc<AppConfig>,

    /// Every job submitted since startup
    pub jobs: Arc<JobRegistry>,

    /// Recognized and downloaded models
    pub catalog: Arc<ModelCatalog>,

    pub transcriptions: TranscriptionPipeline,
    pub downloads: DownloadWorkflow,

    /// When the server started
    pub start_time: Instant,
}

impl AppState {
    /// Wire the registry, catalog and workflows together.
    ///
    /// ## Parameters:
    /// - **config**: Validated application configuration
    /// - **store**: Where model files are fetched to
    /// - **transcriber**: Speech recognizer run by transcription jobs
    pub fn new(config: AppConfig, store: Arc<dyn ModelStore>, transcriber: Arc<dyn Transcriber>) -> Self {
        let jobs = Arc::new(JobRegistry::new());
        let catalog = Arc::new(ModelCatalog::new(&config.models.catalog, store));

        Self {
            transcriptions: TranscriptionPipeline::new(Arc::clone(&jobs), Arc::clone(&catalog), transcriber),
            downloads: DownloadWorkflow::new(Arc::clone(&jobs), Arc::clone(&catalog)),
            config: Arc::new(config),
            jobs,
            catalog,
            start_time: Instant::now(),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}
