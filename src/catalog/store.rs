//! # Model Store
//!
//! Physical storage of model files. The catalog decides *whether* a pair may
//! be downloaded; a [`ModelStore`] does the actual fetching and later tells
//! the catalog which pairs are already on disk.
//!
//! ## On-disk Layout:
//! - `<data_dir>/hub/`: Hugging Face cache holding the fetched files
//! - `<data_dir>/<language>/<model>.json`: download marker pointing at the
//!   snapshot directory, written only after every file arrived

use crate::catalog::CatalogEntry;
use crate::progress::ProgressSink;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use hf_hub::api::tokio::{Api, ApiBuilder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Files a Whisper checkpoint needs for inference.
pub const MODEL_FILES: [&str; 3] = ["config.json", "tokenizer.json", "model.safetensors"];

/// Fetches model files and locates previously fetched ones.
pub trait ModelStore: Send + Sync {
    /// Fetch every file of `entry`, reporting one unit of progress per file.
    ///
    /// Returns the directory holding the files.
    fn acquire<'a>(
        &'a self,
        entry: &'a CatalogEntry,
        progress: ProgressSink,
    ) -> BoxFuture<'a, Result<PathBuf>>;

    /// Directory of a completed earlier download, if any.
    fn locate(&self, entry: &CatalogEntry) -> Option<PathBuf>;
}

/// Contents of a download marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DownloadMarker {
    repo: String,
    path: PathBuf,
    downloaded_at: DateTime<Utc>,
}

/// [`ModelStore`] backed by the Hugging Face Hub.
#[derive(Debug, Clone)]
pub struct HubModelStore {
    data_dir: PathBuf,
    endpoint: Option<String>,
}

impl HubModelStore {
    /// ## Parameters:
    /// - **data_dir**: Root of the hub cache and the download markers
    /// - **endpoint**: Optional Hub mirror, e.g. `https://hf-mirror.com`
    pub fn new(data_dir: impl Into<PathBuf>, endpoint: Option<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            endpoint,
        }
    }

    pub fn marker_path(&self, entry: &CatalogEntry) -> PathBuf {
        self.data_dir
            .join(&entry.language)
            .join(format!("{}.json", entry.model))
    }

    fn api(&self) -> Result<Api> {
        let mut builder = ApiBuilder::new()
            .with_cache_dir(self.data_dir.join("hub"))
            .with_token(std::env::var("HF_TOKEN").ok())
            .with_progress(false);

        if let Some(endpoint) = &self.endpoint {
            debug!(%endpoint, "using Hugging Face mirror");
            builder = builder.with_endpoint(endpoint.clone());
        }

        builder.build().context("Failed to build Hugging Face API client")
    }

    async fn fetch(&self, entry: &CatalogEntry, progress: ProgressSink) -> Result<PathBuf> {
        let repo = self.api()?.model(entry.repo.clone());
        let total = MODEL_FILES.len() as u64;
        progress.report(0, total);

        let mut snapshot = None;
        for (i, file) in MODEL_FILES.iter().enumerate() {
            debug!(repo = %entry.repo, %file, "fetching model file");
            let path = repo
                .get(file)
                .await
                .with_context(|| format!("Failed to download {} from {}", file, entry.repo))?;
            snapshot = path.parent().map(Path::to_path_buf);
            progress.report(i as u64 + 1, total);
        }
        let snapshot = snapshot.ok_or_else(|| anyhow!("No snapshot directory for {}", entry.repo))?;

        let marker = DownloadMarker {
            repo: entry.repo.clone(),
            path: snapshot.clone(),
            downloaded_at: Utc::now(),
        };
        let marker_path = self.marker_path(entry);
        if let Some(parent) = marker_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&marker_path, serde_json::to_vec_pretty(&marker)?)
            .await
            .with_context(|| format!("Failed to write {}", marker_path.display()))?;

        info!(
            language = %entry.language,
            model = %entry.model,
            path = %snapshot.display(),
            "model files stored"
        );
        Ok(snapshot)
    }
}

impl ModelStore for HubModelStore {
    fn acquire<'a>(
        &'a self,
        entry: &'a CatalogEntry,
        progress: ProgressSink,
    ) -> BoxFuture<'a, Result<PathBuf>> {
        Box::pin(self.fetch(entry, progress))
    }

    fn locate(&self, entry: &CatalogEntry) -> Option<PathBuf> {
        let marker_path = self.marker_path(entry);
        let raw = std::fs::read(&marker_path).ok()?;

        let marker: DownloadMarker = match serde_json::from_slice(&raw) {
            Ok(marker) => marker,
            Err(err) => {
                warn!(path = %marker_path.display(), error = %err, "ignoring unreadable download marker");
                return None;
            }
        };

        // A marker whose files were removed from the cache no longer counts.
        let complete = marker.repo == entry.repo
            && MODEL_FILES.iter().all(|file| marker.path.join(file).is_file());
        complete.then_some(marker.path)
    }
}
