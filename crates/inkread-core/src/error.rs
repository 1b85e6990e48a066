//! Error types for the Inkread recognition client.
//!
//! Remote failures are split into two classes that callers must treat
//! differently: quota exhaustion (enter a cooldown and retry later) and
//! everything else (show "service unavailable" and stop).

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for Inkread operations.
#[derive(Error, Debug)]
pub enum InkreadError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Recognition failures surfaced by the client
    #[error("Recognition error: {0}")]
    Recognition(#[from] RecognitionError),

    /// Image input errors
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// A single failed attempt against the remote recognition service.
///
/// Only `Http` errors can be quota failures; every other variant is
/// non-retriable by construction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// Transport failure or non-2xx response
    #[error("{message}")]
    Http {
        message: String,
        status_code: Option<u16>,
    },

    /// The model answered with an empty body
    #[error("Empty response from {model}")]
    EmptyResponse { model: String },

    /// The body did not match the recognition schema
    #[error("Malformed response from {model}: {message}")]
    Schema { model: String, message: String },

    /// The attempt exceeded the per-request timeout
    #[error("Request to {model} timed out after {timeout_ms}ms")]
    Timeout { model: String, timeout_ms: u64 },

    /// The caller supplied an image that cannot be forwarded
    #[error("Invalid image payload: {0}")]
    InvalidImage(String),
}

/// Classified failure returned by [`crate::Recognizer::recognize`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecognitionError {
    /// Rate limit or quota still exhausted after the retry budget
    #[error("Quota exceeded: {message}")]
    Quota { message: String },

    /// Any other remote or parse failure
    #[error("Service unavailable: {0}")]
    Service(#[from] ServiceError),
}

impl RecognitionError {
    /// Whether the caller should enter a cooldown instead of failing.
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::Quota { .. })
    }
}

/// Errors raised while loading image files for recognition.
#[derive(Error, Debug)]
pub enum InputError {
    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// File exceeds size limit
    #[error("File too large: {path} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge {
        path: PathBuf,
        size_mb: u64,
        max_mb: u64,
    },

    /// Content is not a supported image format
    #[error("Unsupported format for {path}: {message}")]
    UnsupportedFormat { path: PathBuf, message: String },

    /// Reading the file failed
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience type alias for Inkread results.
pub type Result<T> = std::result::Result<T, InkreadError>;
