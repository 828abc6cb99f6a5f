//! # Model Catalog
//!
//! Tracks which (language, model) pairs the service recognizes and which of
//! them are physically present on disk.
//!
//! ## Two Facts per Pair:
//! - **Available**: static, fixed by configuration at startup
//! - **Downloaded**: set by a successful [`ModelCatalog::download`], or
//!   discovered at startup from a marker left by an earlier run
//!
//! A pair can only become downloaded if it is available; unknown pairs are
//! rejected before anything is touched.

use crate::catalog::{CatalogEntry, CatalogStatus, ModelHandle, ModelKey, ModelStore};
use crate::config::LanguageConfig;
use crate::error::{AppError, AppResult};
use crate::progress::ProgressSink;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

/// A catalog entry and the lock serializing its downloads.
struct Listing {
    entry: CatalogEntry,
    gate: tokio::sync::Mutex<()>,
}

/// Process-wide registry of recognized and downloaded models.
///
/// ## Thread Safety:
/// - The set of available pairs never changes after construction.
/// - The downloaded set sits behind a `RwLock` that is only held for map
///   reads and inserts, never across an `.await`.
/// - Each pair has its own async lock, so two downloads of the same pair
///   run one after the other while different pairs download in parallel.
pub struct ModelCatalog {
    listings: BTreeMap<String, BTreeMap<String, Listing>>,
    downloaded: RwLock<BTreeMap<ModelKey, PathBuf>>,
    store: Arc<dyn ModelStore>,
}

impl ModelCatalog {
    /// Build the catalog from configuration and pick up earlier downloads.
    ///
    /// ## Parameters:
    /// - **languages**: Catalog section of the configuration
    /// - **store**: Where model files are fetched to and located from
    pub fn new(languages: &[LanguageConfig], store: Arc<dyn ModelStore>) -> Self {
        let mut listings: BTreeMap<String, BTreeMap<String, Listing>> = BTreeMap::new();
        for language in languages {
            let models = listings.entry(language.code.clone()).or_default();
            for model in &language.models {
                let entry = CatalogEntry {
                    language: language.code.clone(),
                    language_name: language.name.clone(),
                    model: model.name.clone(),
                    repo: model.repo.clone(),
                    description: model.description.clone(),
                    size_mb: model.size_mb,
                };
                models.insert(
                    model.name.clone(),
                    Listing {
                        entry,
                        gate: tokio::sync::Mutex::new(()),
                    },
                );
            }
        }

        let downloaded: BTreeMap<ModelKey, PathBuf> = listings
            .values()
            .flat_map(BTreeMap::values)
            .filter_map(|listing| {
                let path = store.locate(&listing.entry)?;
                Some((listing.entry.key(), path))
            })
            .collect();

        info!(
            available = listings.values().map(BTreeMap::len).sum::<usize>(),
            downloaded = downloaded.len(),
            "model catalog ready"
        );

        Self {
            listings,
            downloaded: RwLock::new(downloaded),
            store,
        }
    }

    /// Every recognized pair, sorted by language then model.
    pub fn available(&self) -> Vec<CatalogEntry> {
        self.listings
            .values()
            .flat_map(BTreeMap::values)
            .map(|listing| listing.entry.clone())
            .collect()
    }

    /// Pairs whose files are present locally, in the same order.
    pub fn downloaded(&self) -> Vec<CatalogEntry> {
        let downloaded = self.downloaded.read().unwrap_or_else(PoisonError::into_inner);
        self.listings
            .values()
            .flat_map(BTreeMap::values)
            .filter(|listing| downloaded.contains_key(&listing.entry.key()))
            .map(|listing| listing.entry.clone())
            .collect()
    }

    /// The entry for this pair, or why the pair is not recognized.
    pub fn ensure_available(&self, language: &str, model: &str) -> AppResult<&CatalogEntry> {
        self.listing(language, model).map(|listing| &listing.entry)
    }

    /// Like [`ensure_available`](Self::ensure_available), but also requires
    /// the pair's files to be on disk.
    pub fn ensure_downloaded(&self, language: &str, model: &str) -> AppResult<ModelHandle> {
        let entry = self.ensure_available(language, model)?;
        let downloaded = self.downloaded.read().unwrap_or_else(PoisonError::into_inner);

        match downloaded.get(&entry.key()) {
            Some(path) => Ok(ModelHandle {
                entry: entry.clone(),
                path: path.clone(),
            }),
            None => Err(AppError::ModelNotDownloaded {
                language: language.to_string(),
                model: model.to_string(),
            }),
        }
    }

    /// Entry metadata plus its downloaded flag.
    pub fn entry(&self, language: &str, model: &str) -> AppResult<CatalogStatus> {
        let entry = self.ensure_available(language, model)?.clone();
        let downloaded = self
            .downloaded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&entry.key());
        Ok(CatalogStatus { entry, downloaded })
    }

    /// Fetch the pair's files and mark it downloaded.
    ///
    /// Fails with the catalog precondition errors for unknown pairs and with
    /// [`AppError::Acquisition`] when the store fails; in both cases the
    /// downloaded set is left as it was. A pair that is already downloaded
    /// is fetched again.
    pub async fn download(
        &self,
        language: &str,
        model: &str,
        progress: ProgressSink,
    ) -> AppResult<PathBuf> {
        let listing = self.listing(language, model)?;
        let _gate = listing.gate.lock().await;

        info!(%language, %model, repo = %listing.entry.repo, "downloading model");
        match self.store.acquire(&listing.entry, progress).await {
            Ok(path) => {
                self.downloaded
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(listing.entry.key(), path.clone());
                info!(%language, %model, path = %path.display(), "model downloaded");
                Ok(path)
            }
            Err(err) => {
                let reason = format!("{:#}", err);
                warn!(%language, %model, error = %reason, "model download failed");
                Err(AppError::Acquisition(reason))
            }
        }
    }

    /// Number of (available, downloaded) pairs.
    pub fn counts(&self) -> (usize, usize) {
        let available = self.listings.values().map(BTreeMap::len).sum();
        let downloaded = self.downloaded.read().unwrap_or_else(PoisonError::into_inner).len();
        (available, downloaded)
    }

    fn listing(&self, language: &str, model: &str) -> AppResult<&Listing> {
        let models = self
            .listings
            .get(language)
            .ok_or_else(|| AppError::LanguageDoesNotExist(language.to_string()))?;
        models.get(model).ok_or_else(|| AppError::ModelDoesNotExist {
            language: language.to_string(),
            model: model.to_string(),
        })
    }
}

impl fmt::Debug for ModelCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (available, downloaded) = self.counts();
        f.debug_struct("ModelCatalog")
            .field("available", &available)
            .field("downloaded", &downloaded)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{test_languages, FakeStore};

    fn catalog(store: FakeStore) -> (ModelCatalog, Arc<FakeStore>) {
        let store = Arc::new(store);
        let catalog = ModelCatalog::new(&test_languages(), store.clone());
        (catalog, store)
    }

    #[test]
    fn test_available_is_sorted() {
        let (catalog, _) = catalog(FakeStore::new());
        let pairs: Vec<String> = catalog
            .available()
            .iter()
            .map(|e| e.key().to_string())
            .collect();
        assert_eq!(pairs, vec!["de/base", "de/tiny", "en/base", "en/tiny", "en/tiny.en"]);
        assert!(catalog.downloaded().is_empty());
    }

    #[test]
    fn test_ensure_available_errors() {
        let (catalog, _) = catalog(FakeStore::new());

        let err = catalog.ensure_available("xx", "tiny").unwrap_err();
        assert_eq!(err, AppError::LanguageDoesNotExist("xx".into()));

        let err = catalog.ensure_available("en", "huge").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelDoesNotExist);

        assert_eq!(catalog.ensure_available("en", "tiny").unwrap().repo, "openai/whisper-tiny");
    }

    #[test]
    fn test_ensure_downloaded_checks_availability_first() {
        let (catalog, _) = catalog(FakeStore::new());

        let err = catalog.ensure_downloaded("xx", "tiny").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LanguageDoesNotExist);

        let err = catalog.ensure_downloaded("en", "tiny").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelNotDownloaded);
    }

    #[test]
    fn test_startup_discovers_earlier_downloads() {
        let (catalog, _) = catalog(FakeStore::new().with_downloaded("de", "base"));

        let downloaded: Vec<String> = catalog.downloaded().iter().map(|e| e.key().to_string()).collect();
        assert_eq!(downloaded, vec!["de/base"]);
        assert!(catalog.ensure_downloaded("de", "base").is_ok());
        assert!(catalog.entry("de", "base").unwrap().downloaded);
        assert!(!catalog.entry("en", "base").unwrap().downloaded);
        assert_eq!(catalog.counts(), (5, 1));
    }

    #[tokio::test]
    async fn test_download_marks_pair_downloaded() {
        let (catalog, store) = catalog(FakeStore::new());

        let path = catalog.download("en", "tiny", ProgressSink::noop()).await.unwrap();
        let handle = catalog.ensure_downloaded("en", "tiny").unwrap();

        assert_eq!(handle.path, path);
        assert_eq!(handle.entry.model, "tiny");
        assert_eq!(store.acquire_calls(), 1);
        assert_eq!(catalog.available().len(), 5);
    }

    #[tokio::test]
    async fn test_download_rejects_unknown_pair_without_calling_store() {
        let (catalog, store) = catalog(FakeStore::new());

        let err = catalog.download("en", "huge", ProgressSink::noop()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelDoesNotExist);
        assert_eq!(store.acquire_calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_download_leaves_state_unchanged() {
        let (catalog, _) = catalog(FakeStore::new().failing());

        let err = catalog.download("en", "tiny", ProgressSink::noop()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AcquisitionError);
        assert!(err.to_string().contains("network unreachable"));
        assert!(catalog.downloaded().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_downloads_of_one_pair_are_serialized() {
        let (catalog, store) = catalog(FakeStore::new());
        let catalog = Arc::new(catalog);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let catalog = Arc::clone(&catalog);
                tokio::spawn(async move { catalog.download("en", "base", ProgressSink::noop()).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.acquire_calls(), 4);
        assert_eq!(store.max_in_flight(), 1);
        assert_eq!(catalog.downloaded().len(), 1);
    }
}
