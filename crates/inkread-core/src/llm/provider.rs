//! Recognition backend trait and request/response types.
//!
//! Defines the interface the remote multimodal model is reached through,
//! plus the image payload parsing and model selection shared by all backends.

use crate::config::RecognitionConfig;
use crate::error::ServiceError;
use async_trait::async_trait;
use serde_json::{json, Value};

/// Media type assumed when the image prefix does not name one.
const DEFAULT_MEDIA_TYPE: &str = "image/png";

/// Fixed OCR instruction sent with every image.
pub const RECOGNITION_PROMPT: &str = "OCR Handwriting Analysis. Detect text and language. \
     Return JSON ONLY: {text: string, confidence: float, language: string, \
     probabilities: Array<{label: string, value: float}>}";

/// Base64 image data extracted from a `"<prefix>,<payload>"` string.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePayload {
    /// Base64-encoded image bytes (the second comma-separated segment)
    pub data: String,
    /// MIME type (e.g., "image/png")
    pub media_type: String,
}

impl ImagePayload {
    /// Split an encoded image on its commas and take the second segment.
    ///
    /// The media type is taken from a `data:<mime>;base64` prefix when present.
    /// The payload is checked against the base64 alphabet without decoding it.
    pub fn parse(image: &str) -> Result<Self, ServiceError> {
        let mut segments = image.split(',');
        let prefix = segments.next().unwrap_or_default();
        let data = segments.next().ok_or_else(|| {
            ServiceError::InvalidImage("expected '<prefix>,<payload>'".to_string())
        })?;

        let data = data.trim();
        if data.is_empty() {
            return Err(ServiceError::InvalidImage("payload is empty".to_string()));
        }
        if let Some(bad) = data.bytes().find(|b| !is_base64_byte(*b)) {
            return Err(ServiceError::InvalidImage(format!(
                "payload is not base64: unexpected byte 0x{bad:02x}"
            )));
        }

        let media_type = prefix
            .strip_prefix("data:")
            .and_then(|rest| rest.split(';').next())
            .filter(|mime| mime.starts_with("image/"))
            .unwrap_or(DEFAULT_MEDIA_TYPE);

        Ok(Self {
            data: data.to_string(),
            media_type: media_type.to_string(),
        })
    }
}

/// Standard base64 alphabet plus padding.
fn is_base64_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'=')
}

/// Which model to call on a given attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSelection {
    pub primary: String,
    pub fallback: String,
    /// First attempt index that uses the fallback model
    pub fallback_after: u32,
}

impl Default for ModelSelection {
    fn default() -> Self {
        Self::from(&RecognitionConfig::default())
    }
}

impl From<&RecognitionConfig> for ModelSelection {
    fn from(config: &RecognitionConfig) -> Self {
        Self {
            primary: config.primary_model.clone(),
            fallback: config.fallback_model.clone(),
            fallback_after: config.fallback_after,
        }
    }
}

impl ModelSelection {
    pub fn for_attempt(&self, attempt: u32) -> &str {
        if attempt >= self.fallback_after {
            &self.fallback
        } else {
            &self.primary
        }
    }
}

/// One remote recognition call.
#[derive(Debug, Clone)]
pub struct RecognitionRequest {
    /// Model identifier for this attempt
    pub model: String,
    /// The image to read
    pub image: ImagePayload,
    /// Instruction text for the model
    pub prompt: String,
    /// JSON schema the response must follow
    pub response_schema: Value,
}

impl RecognitionRequest {
    /// Build the fixed handwriting OCR request for a model and image.
    pub fn handwriting(model: &str, image: ImagePayload) -> Self {
        Self {
            model: model.to_string(),
            image,
            prompt: RECOGNITION_PROMPT.to_string(),
            response_schema: recognition_schema(),
        }
    }
}

/// Response schema declaring the `RecognitionResult` shape.
pub fn recognition_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "text": { "type": "STRING" },
            "confidence": { "type": "NUMBER" },
            "language": { "type": "STRING" },
            "probabilities": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "label": { "type": "STRING" },
                        "value": { "type": "NUMBER" }
                    },
                    "required": ["label", "value"]
                }
            }
        },
        "required": ["text", "confidence", "language", "probabilities"]
    })
}

/// Raw body returned by a backend, before schema validation.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    /// Response text (expected to be JSON)
    pub text: String,
    /// Model identifier that answered
    pub model: String,
    /// Round-trip latency in milliseconds
    pub latency_ms: u64,
}

/// Trait that remote recognition backends implement.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (the recognizer holds an `Arc<dyn RecognitionBackend>`).
#[async_trait]
pub trait RecognitionBackend: Send + Sync {
    /// Backend name for logging (e.g., "gemini").
    fn name(&self) -> &str;

    /// Send one recognition request.
    async fn generate(&self, request: &RecognitionRequest)
        -> Result<BackendResponse, ServiceError>;
}

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok().filter(|v| !v.is_empty())
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_data_url() {
        let payload = ImagePayload::parse("data:image/jpeg;base64,AQID").unwrap();
        assert_eq!(payload.data, "AQID");
        assert_eq!(payload.media_type, "image/jpeg");
    }

    #[test]
    fn test_parse_defaults_to_png() {
        let payload = ImagePayload::parse("whatever,AQID").unwrap();
        assert_eq!(payload.media_type, "image/png");
    }

    #[test]
    fn test_parse_takes_second_segment() {
        let payload = ImagePayload::parse("data:image/png;base64,AQID,BAUG").unwrap();
        assert_eq!(payload.data, "AQID");
    }

    #[test]
    fn test_parse_rejects_non_base64_payload() {
        let err = ImagePayload::parse("data:image/png;base64,AQ ID!").unwrap_err();
        assert!(matches!(err, ServiceError::InvalidImage(_)));
        assert!(err.to_string().contains("not base64"));
    }

    #[test]
    fn test_parse_rejects_missing_comma() {
        let err = ImagePayload::parse("AQID").unwrap_err();
        assert!(matches!(err, ServiceError::InvalidImage(_)));
    }

    #[test]
    fn test_parse_rejects_empty_payload() {
        let err = ImagePayload::parse("data:image/png;base64,").unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_model_fallback_from_attempt_three() {
        let models = ModelSelection::default();
        assert_eq!(models.for_attempt(0), "gemini-3-flash-preview");
        assert_eq!(models.for_attempt(2), "gemini-3-flash-preview");
        assert_eq!(models.for_attempt(3), "gemini-flash-lite-latest");
        assert_eq!(models.for_attempt(5), "gemini-flash-lite-latest");
    }

    #[test]
    fn test_schema_requires_all_fields() {
        let schema = recognition_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert_eq!(required, ["text", "confidence", "language", "probabilities"]);
        assert_eq!(
            schema["properties"]["probabilities"]["items"]["required"],
            json!(["label", "value"])
        );
    }

    #[test]
    fn test_handwriting_request() {
        let image = ImagePayload::parse("data:image/png;base64,AQID").unwrap();
        let request = RecognitionRequest::handwriting("m", image);
        assert_eq!(request.model, "m");
        assert!(request.prompt.contains("OCR Handwriting"));
    }

    #[test]
    fn test_resolve_env_var() {
        assert_eq!(resolve_env_var("plain-key"), Some("plain-key".to_string()));
        assert_eq!(resolve_env_var(""), None);
        assert_eq!(resolve_env_var("${DEFINITELY_NOT_SET_XYZ_123}"), None);
    }
}
