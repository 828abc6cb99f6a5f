//! # Download Workflow
//!
//! Drives a model download job: `queued → downloading → done`, or
//! `→ failed` when the pair is unknown (straight from `queued`) or the
//! files cannot be fetched (from `downloading`).

use crate::catalog::ModelCatalog;
use crate::error::AppResult;
use crate::jobs::{Job, JobKind, JobRegistry, JobState};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct DownloadWorkflow {
    jobs: Arc<JobRegistry>,
    catalog: Arc<ModelCatalog>,
}

impl DownloadWorkflow {
    pub fn new(jobs: Arc<JobRegistry>, catalog: Arc<ModelCatalog>) -> Self {
        Self { jobs, catalog }
    }

    /// Create a `queued` download job and start it in the background.
    pub fn submit(&self, language: String, model: String) -> Job {
        let job = self.jobs.add(JobKind::download(language.clone(), model.clone()));
        info!(job_id = %job.id, %language, %model, "download submitted");

        let workflow = self.clone();
        let id = job.id;
        tokio::spawn(async move {
            if let Err(err) = workflow.run(id, &language, &model).await {
                error!(job_id = %id, error = %err, "download job aborted");
            }
        });
        job
    }

    /// Run the workflow for an existing `queued` job and return the job in
    /// its terminal state.
    pub async fn run(&self, id: Uuid, language: &str, model: &str) -> AppResult<Job> {
        if let Err(err) = self.catalog.ensure_available(language, model) {
            warn!(job_id = %id, %language, %model, error = %err, "rejecting download");
            return self.jobs.fail(id, &err);
        }

        self.jobs.transition(id, JobState::Downloading)?;

        match self.catalog.download(language, model, self.jobs.progress_sink(id)).await {
            Ok(_) => self.jobs.transition(id, JobState::Done),
            Err(err) => self.jobs.fail(id, &err),
        }
    }
}
