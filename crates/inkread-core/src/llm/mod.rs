//! Remote model integration for handwriting recognition.
//!
//! Provides a backend abstraction over the multimodal inference API (Gemini),
//! the quota-aware retry engine, and the caching, single-flight recognition
//! client built on top of both.

pub(crate) mod gemini;
pub(crate) mod provider;
pub(crate) mod recognizer;
pub(crate) mod retry;

pub use gemini::GeminiBackend;
pub use provider::{
    BackendResponse, ImagePayload, ModelSelection, RecognitionBackend, RecognitionRequest,
};
pub use recognizer::{RecognizeOptions, Recognizer};
pub use retry::{is_quota_failure, QuotaSignal, RetryPolicy};
