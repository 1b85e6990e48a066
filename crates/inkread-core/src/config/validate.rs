//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.recognition.primary_model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "recognition.primary_model must not be empty".into(),
            ));
        }
        if self.recognition.fallback_model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "recognition.fallback_model must not be empty".into(),
            ));
        }
        if self.recognition.request_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "recognition.request_timeout_ms must be > 0".into(),
            ));
        }
        if self.retry.initial_delay_ms == 0 {
            return Err(ConfigError::ValidationError(
                "retry.initial_delay_ms must be > 0".into(),
            ));
        }
        if self.cache.capacity == 0 {
            return Err(ConfigError::ValidationError(
                "cache.capacity must be > 0".into(),
            ));
        }
        if self.cooldown.seconds == 0 {
            return Err(ConfigError::ValidationError(
                "cooldown.seconds must be > 0".into(),
            ));
        }
        if self.cooldown.tick_ms == 0 {
            return Err(ConfigError::ValidationError(
                "cooldown.tick_ms must be > 0".into(),
            ));
        }
        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_file_size_mb must be > 0".into(),
            ));
        }
        Ok(())
    }
}
