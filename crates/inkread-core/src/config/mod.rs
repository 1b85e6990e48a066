//! Configuration management for Inkread.
//!
//! Configuration is loaded from `config.toml` in the platform config
//! directory, with defaults for every field so a missing file is fine.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for Inkread.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model selection and per-attempt timeout
    pub recognition: RecognitionConfig,

    /// Quota backoff settings
    pub retry: RetryConfig,

    /// Result cache settings
    pub cache: CacheConfig,

    /// Caller-side cooldown after quota exhaustion
    pub cooldown: CooldownConfig,

    /// Input limits
    pub limits: LimitsConfig,

    /// Output settings
    pub output: OutputConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Gemini backend settings
    pub gemini: GeminiConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
        let content = std::fs::read_to_string(expanded)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.inkread.inkread/config.toml
    /// - Linux: ~/.config/inkread/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\inkread\config\config.toml
    ///
    /// Falls back to ~/.inkread/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "inkread", "inkread")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = shellexpand::tilde("~").into_owned();
                PathBuf::from(home).join(".inkread").join("config.toml")
            })
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.recognition.primary_model, "gemini-3-flash-preview");
        assert_eq!(config.recognition.fallback_model, "gemini-flash-lite-latest");
        assert_eq!(config.recognition.fallback_after, 3);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.initial_delay_ms, 3000);
        assert_eq!(config.retry.max_jitter_ms, 2000);
        assert_eq!(config.cache.capacity, 50);
        assert_eq!(config.cooldown.seconds, 45);
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[recognition]"));
        assert!(toml.contains("[cooldown]"));
        assert!(toml.contains("${GEMINI_API_KEY}"));
    }

    #[test]
    fn test_load_from_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[cache]\ncapacity = 8\n\n[cooldown]\nseconds = 10").unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.cache.capacity, 8);
        assert_eq!(config.cooldown.seconds, 10);
        // Unspecified sections keep their defaults
        assert_eq!(config.retry.max_retries, 5);
    }

    #[test]
    fn test_load_from_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[cache]\ncapacity = 0").unwrap();

        let err = Config::load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("cache.capacity"));
    }

    #[test]
    fn test_load_from_rejects_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[cache\ncapacity = ").unwrap();

        let err = Config::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }
}
