//! Core data types for handwriting recognition.
//!
//! `RecognitionResult` is what the remote model returns once it has passed
//! schema validation. `PredictionRecord` is the output row the CLI writes for
//! every recognized image.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// The validated answer for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    /// Recognized text
    pub text: String,

    /// Overall confidence from 0.0 to 1.0
    pub confidence: f64,

    /// Detected language (short code or name)
    pub language: String,

    /// Per-class probability breakdown, in model order
    pub probabilities: Vec<Probability>,
}

/// One entry of the probability breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Probability {
    /// Class label (a character, word or candidate reading)
    pub label: String,

    /// Probability mass assigned to the label
    pub value: f64,
}

impl Probability {
    pub fn new(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

impl RecognitionResult {
    /// Parse a model response body and check it against the recognition schema.
    ///
    /// Returns a human-readable reason on failure; the caller attaches the
    /// model name and classifies it.
    pub fn from_json(body: &str) -> Result<Self, String> {
        let result: RecognitionResult =
            serde_json::from_str(body.trim()).map_err(|e| e.to_string())?;
        result.validate()?;
        Ok(result)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!(
                "confidence must be within [0, 1], got {}",
                self.confidence
            ));
        }
        if self.probabilities.is_empty() {
            return Err("probabilities must not be empty".to_string());
        }
        if let Some(bad) = self.probabilities.iter().find(|p| !p.value.is_finite()) {
            return Err(format!("probability for '{}' is not a number", bad.label));
        }
        Ok(())
    }

    /// The most likely class in the breakdown.
    pub fn top_probability(&self) -> Option<&Probability> {
        self.probabilities
            .iter()
            .max_by(|a, b| a.value.total_cmp(&b.value))
    }
}

/// A recognition outcome ready to be written out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    /// Random 9-character base-36 identifier
    pub id: String,

    /// Milliseconds since the Unix epoch when the result arrived
    pub timestamp_ms: u64,

    /// Where the image came from (file path or caller-supplied name)
    pub source: String,

    /// BLAKE3 fingerprint of the submitted image
    pub image_fingerprint: String,

    pub predicted_text: String,
    pub confidence: f64,
    pub language: String,
    pub probabilities: Vec<Probability>,
}

impl PredictionRecord {
    /// Build a record from a recognition result.
    pub fn from_result(
        source: impl Into<String>,
        image_fingerprint: impl Into<String>,
        result: &RecognitionResult,
    ) -> Self {
        Self {
            id: random_id(),
            timestamp_ms: now_millis(),
            source: source.into(),
            image_fingerprint: image_fingerprint.into(),
            predicted_text: result.text.clone(),
            confidence: result.confidence,
            language: result.language.clone(),
            probabilities: result.probabilities.clone(),
        }
    }
}

fn random_id() -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    (0..9)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
