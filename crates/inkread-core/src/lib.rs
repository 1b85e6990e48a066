//! Inkread Core - handwriting recognition orchestration.
//!
//! Sits between a capture surface (a canvas, a scanner, a directory of
//! images) and a remote multimodal model. Submitted images are fingerprinted
//! and cached, rate limits are retried with exponential backoff and a cheaper
//! fallback model, and a caller-side cooldown queues the latest capture once
//! the retry budget is spent.
//!
//! # Architecture
//!
//! ```text
//! capture → CooldownController → Recognizer → cache? → retry(primary | fallback) → validate → result
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use inkread_core::{Config, Recognizer};
//!
//! #[tokio::main]
//! async fn main() -> inkread_core::Result<()> {
//!     let config = Config::load()?;
//!     let recognizer = Recognizer::from_config(&config).map_err(inkread_core::RecognitionError::from)?;
//!
//!     let result = recognizer.recognize("data:image/png;base64,iVBORw0...").await?;
//!     println!("{} ({:.0}%)", result.text, result.confidence * 100.0);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod cooldown;
pub mod error;
pub mod input;
pub mod llm;
pub mod output;
pub mod types;

// Re-exports for convenient access
pub use cache::{Fingerprint, ResultCache};
pub use config::Config;
pub use cooldown::{CooldownController, CooldownState, QueueCommand, QueueEvent, QueueRunner};
pub use error::{
    ConfigError, InkreadError, InputError, RecognitionError, Result, ServiceError,
};
pub use input::{ImageDiscovery, ImageLoader, LoadedImage};
pub use llm::{QuotaSignal, RecognizeOptions, Recognizer, RetryPolicy};
pub use output::{OutputFormat, RecordWriter};
pub use types::{PredictionRecord, Probability, RecognitionResult};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
