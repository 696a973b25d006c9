//! Generation configuration persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use campusdesk_core::{Error, Result};

use crate::retry::RetryPolicy;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-flash-latest";
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Stored generation configuration (persisted to llm-config.json).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Path to config file for saving.
    #[serde(skip)]
    pub config_path: PathBuf,
}

fn default_model() -> String {
    DEFAULT_GEMINI_MODEL.into()
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            retry: RetryPolicy::default(),
            config_path: PathBuf::new(),
        }
    }
}

impl GenerationConfig {
    /// Load config from file, falling back to the environment and defaults.
    pub fn load(config_path: &Path) -> Self {
        let mut config: GenerationConfig = std::fs::read_to_string(config_path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();

        config.config_path = config_path.to_path_buf();

        if config.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            config.api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty());
        }

        config
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&self.config_path, json)?;
        info!("Saved generation config to {}", self.config_path.display());
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// The API key, or a configuration error naming where to set it.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            Error::Config(format!(
                "no API key: set {} or add api_key to {}",
                API_KEY_ENV,
                self.config_path.display()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = GenerationConfig::load(&dir.path().join("llm-config.json"));
        assert_eq!(config.model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.retry, RetryPolicy::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("llm-config.json");
        let mut config = GenerationConfig::load(&path);
        config.api_key = Some("k-123".into());
        config.model = "gemini-pro".into();
        config.retry = RetryPolicy::immediate(2);
        config.save().unwrap();

        let loaded = GenerationConfig::load(&path);
        assert_eq!(loaded.api_key.as_deref(), Some("k-123"));
        assert_eq!(loaded.model, "gemini-pro");
        assert_eq!(loaded.retry.max_attempts, 2);
        assert_eq!(loaded.require_api_key().unwrap(), "k-123");
    }

    #[test]
    fn test_require_api_key_reports_config_error() {
        let config = GenerationConfig::default();
        assert!(matches!(config.require_api_key(), Err(Error::Config(_))));
        assert!(!config.is_configured());
    }
}
