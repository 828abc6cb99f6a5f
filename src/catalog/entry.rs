//! # Catalog Entries
//!
//! Value types describing (language, model) pairs: the static metadata of
//! an entry, the key it is looked up by, and the handle given to the
//! transcriber once the entry's files are on disk.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Whisper checkpoint sizes used to build the default catalog.
///
/// ## Trade-offs:
/// - **Size vs Accuracy**: Larger models are more accurate but slower
/// - **English-only variants**: `tiny.en` and `base.en` beat their
///   multilingual siblings on English audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelSize {
    Tiny,
    Base,
    Small,
    Medium,
    Large,
}

impl ModelSize {
    pub const ALL: [ModelSize; 5] = [
        ModelSize::Tiny,
        ModelSize::Base,
        ModelSize::Small,
        ModelSize::Medium,
        ModelSize::Large,
    ];

    /// Sizes that also ship an English-only checkpoint.
    pub const ENGLISH_ONLY: [ModelSize; 2] = [ModelSize::Tiny, ModelSize::Base];

    pub fn name(&self) -> &'static str {
        match self {
            ModelSize::Tiny => "tiny",
            ModelSize::Base => "base",
            ModelSize::Small => "small",
            ModelSize::Medium => "medium",
            ModelSize::Large => "large",
        }
    }

    /// Hugging Face repository holding the checkpoint.
    pub fn repo_name(&self, english_only: bool) -> String {
        match (self, english_only) {
            (ModelSize::Large, _) => "openai/whisper-large-v2".to_string(),
            (size, true) => format!("openai/whisper-{}.en", size.name()),
            (size, false) => format!("openai/whisper-{}", size.name()),
        }
    }

    /// Approximate download size in MB.
    pub fn size_mb(&self) -> u32 {
        match self {
            ModelSize::Tiny => 39,
            ModelSize::Base => 74,
            ModelSize::Small => 244,
            ModelSize::Medium => 769,
            ModelSize::Large => 1550,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ModelSize::Tiny => "Fastest, basic accuracy",
            ModelSize::Base => "Fast, good for drafts",
            ModelSize::Small => "Balanced speed and accuracy",
            ModelSize::Medium => "Good accuracy, handles technical vocabulary",
            ModelSize::Large => "Best accuracy, slower processing",
        }
    }
}

impl fmt::Display for ModelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lookup key of a catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelKey {
    pub language: String,
    pub model: String,
}

impl ModelKey {
    pub fn new(language: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            model: model.into(),
        }
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.language, self.model)
    }
}

/// A recognized (language, model) pair and its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Language code, e.g. "en"
    pub language: String,
    /// Human-readable language name, e.g. "English"
    pub language_name: String,
    /// Model name within the language, e.g. "tiny.en"
    pub model: String,
    /// Hugging Face repository id
    pub repo: String,
    pub description: String,
    pub size_mb: u32,
}

impl CatalogEntry {
    pub fn key(&self) -> ModelKey {
        ModelKey::new(&self.language, &self.model)
    }
}

/// Answer to a single-entry catalog query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogStatus {
    #[serde(flatten)]
    pub entry: CatalogEntry,
    pub downloaded: bool,
}

/// A downloaded entry together with the directory holding its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelHandle {
    pub entry: CatalogEntry,
    pub path: PathBuf,
}
