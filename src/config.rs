//! # Configuration Management
//!
//! Loads the application configuration from layered sources:
//! - Default values (built into the code, including the model catalog)
//! - TOML configuration file (config.toml)
//! - Environment variables (with APP_ prefix)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. `HOST` / `PORT` (deployment platforms)
//! 2. Environment variables (`APP_SERVER__PORT`, `APP_MODELS__DATA_DIR`, ...)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)
//!
//! Nested keys are joined with a double underscore so that field names
//! containing a single underscore (`data_dir`, `max_upload_mb`) survive.

use crate::catalog::ModelSize;
use crate::transcription::DevicePreference;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub models: ModelsConfig,
    pub uploads: UploadsConfig,
}

/// Server-specific configuration settings.
///
/// ## Common values:
/// - `host = "127.0.0.1"`: Only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: Accept connections from any IP address (production)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed by the CORS layer
    pub cors_origins: Vec<String>,
}

/// Model catalog and storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Root directory for downloaded models and download markers
    pub data_dir: String,
    /// Hugging Face mirror to download from instead of huggingface.co
    pub hub_endpoint: Option<String>,
    /// Compute device for inference: "auto", "cpu", "cuda" or "metal"
    pub device: String,
    /// Every (language, model) pair the service recognizes
    pub catalog: Vec<LanguageConfig>,
}

/// One language of the catalog and the models offered for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageConfig {
    /// Language code, e.g. "en"
    pub code: String,
    /// Display name, e.g. "English"
    pub name: String,
    pub models: Vec<ModelConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    /// Hugging Face repository id
    pub repo: String,
    pub description: String,
    pub size_mb: u32,
}

impl ModelConfig {
    fn whisper(size: ModelSize, english_only: bool) -> Self {
        let name = if english_only {
            format!("{}.en", size.name())
        } else {
            size.name().to_string()
        };
        Self {
            name,
            repo: size.repo_name(english_only),
            description: size.description().to_string(),
            size_mb: size.size_mb(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadsConfig {
    /// Largest accepted audio upload in megabytes
    pub max_upload_mb: usize,
}

/// Languages offered by the default catalog.
const DEFAULT_LANGUAGES: [(&str, &str); 8] = [
    ("de", "German"),
    ("en", "English"),
    ("es", "Spanish"),
    ("fr", "French"),
    ("it", "Italian"),
    ("ja", "Japanese"),
    ("nl", "Dutch"),
    ("pt", "Portuguese"),
];

/// Multilingual Whisper checkpoints for every default language, plus the
/// English-only variants for English.
pub fn default_catalog() -> Vec<LanguageConfig> {
    DEFAULT_LANGUAGES
        .iter()
        .map(|&(code, name)| {
            let mut models: Vec<ModelConfig> = ModelSize::ALL
                .iter()
                .map(|&size| ModelConfig::whisper(size, false))
                .collect();
            if code == "en" {
                models.extend(
                    ModelSize::ENGLISH_ONLY
                        .iter()
                        .map(|&size| ModelConfig::whisper(size, true)),
                );
            }
            LanguageConfig {
                code: code.to_string(),
                name: name.to_string(),
                models,
            }
        })
        .collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(), // Localhost only (safe for development)
                port: 8000,
                cors_origins: vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost".to_string(),
                ],
            },
            models: ModelsConfig {
                data_dir: "data".to_string(),
                hub_endpoint: None,
                device: "auto".to_string(),
                catalog: default_catalog(),
            },
            uploads: UploadsConfig { max_upload_mb: 100 },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__PORT=3000`: Override server port
    /// - `APP_SERVER__CORS_ORIGINS=http://a.test,http://b.test`: Comma-separated list
    /// - `APP_MODELS__DATA_DIR=/var/lib/models`: Override the model directory
    /// - `HOST=0.0.0.0` / `PORT=3000`: Special case for deployment platforms
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins")
                    .try_parsing(true),
            );

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Server port is not 0
    /// - Data directory and upload limit are set
    /// - Device preference is one of the known names
    /// - The catalog is non-empty, with unique language codes and unique
    ///   model names within each language
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow!("Server port cannot be 0"));
        }

        if self.models.data_dir.trim().is_empty() {
            return Err(anyhow!("Model data directory cannot be empty"));
        }

        if self.uploads.max_upload_mb == 0 {
            return Err(anyhow!("Max upload size must be greater than 0"));
        }

        self.models
            .device
            .parse::<DevicePreference>()
            .map_err(|e| anyhow!(e))?;

        if self.models.catalog.is_empty() {
            return Err(anyhow!("Model catalog cannot be empty"));
        }

        let mut codes = HashSet::new();
        for language in &self.models.catalog {
            if !codes.insert(language.code.as_str()) {
                return Err(anyhow!("Duplicate language code in catalog: {}", language.code));
            }

            let mut names = HashSet::new();
            for model in &language.models {
                if !names.insert(model.name.as_str()) {
                    return Err(anyhow!(
                        "Duplicate model {} for language {}",
                        model.name,
                        language.code
                    ));
                }
            }
        }

        Ok(())
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.uploads.max_upload_mb.saturating_mul(1024 * 1024)
    }

    pub fn device_preference(&self) -> DevicePreference {
        self.models.device.parse().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.max_upload_bytes(), 100 * 1024 * 1024);
        assert_eq!(config.device_preference(), DevicePreference::Auto);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_catalog_contents() {
        let catalog = default_catalog();
        assert_eq!(catalog.len(), 8);

        let english = catalog.iter().find(|l| l.code == "en").unwrap();
        let names: Vec<&str> = english.models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["tiny", "base", "small", "medium", "large", "tiny.en", "base.en"]);
        assert_eq!(english.models[5].repo, "openai/whisper-tiny.en");

        let german = catalog.iter().find(|l| l.code == "de").unwrap();
        assert_eq!(german.models.len(), 5);
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.uploads.max_upload_mb = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.models.device = "tpu".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.models.catalog.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_catalog_entries_rejected() {
        let mut config = AppConfig::default();
        let english = config.models.catalog[1].clone();
        config.models.catalog.push(english);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate language code"));

        let mut config = AppConfig::default();
        let tiny = config.models.catalog[0].models[0].clone();
        config.models.catalog[0].models.push(tiny);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate model tiny"));
    }
}
