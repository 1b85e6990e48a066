//! Gemini backend using the `generateContent` API.
//!
//! Sends the image as an inline data part next to the OCR instruction, and
//! asks for a JSON body constrained by the recognition schema.

use super::provider::{resolve_env_var, BackendResponse, RecognitionBackend, RecognitionRequest};
use crate::config::GeminiConfig;
use crate::error::ServiceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

/// Gemini provider for handwriting recognition.
pub struct GeminiBackend {
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(endpoint: &str, api_key: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Create a backend from config, resolving `${ENV_VAR}` API keys.
    pub fn from_config(config: &GeminiConfig) -> Result<Self, ServiceError> {
        let api_key = resolve_env_var(&config.api_key).ok_or_else(|| ServiceError::Http {
            message: "Gemini API key not set. Set GEMINI_API_KEY env var.".to_string(),
            status_code: None,
        })?;
        Ok(Self::new(&config.endpoint, &api_key))
    }

    fn url(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, model)
    }
}

// --- Request types ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Inline { inline_data: InlineData },
    Text { text: String },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_schema: Value,
}

// --- Response types ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    model_version: Option<String>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate.
    fn text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default()
    }
}

fn build_body(request: &RecognitionRequest) -> GenerateRequest {
    GenerateRequest {
        contents: vec![Content {
            parts: vec![
                Part::Inline {
                    inline_data: InlineData {
                        mime_type: request.image.media_type.clone(),
                        data: request.image.data.clone(),
                    },
                },
                Part::Text {
                    text: request.prompt.clone(),
                },
            ],
        }],
        generation_config: GenerationConfig {
            response_mime_type: "application/json".to_string(),
            response_schema: request.response_schema.clone(),
        },
    }
}

#[async_trait]
impl RecognitionBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(
        &self,
        request: &RecognitionRequest,
    ) -> Result<BackendResponse, ServiceError> {
        let start = Instant::now();

        let resp = self
            .client
            .post(self.url(&request.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&build_body(request))
            .send()
            .await
            .map_err(|e| ServiceError::Http {
                message: format!("Gemini request failed: {e}"),
                status_code: e.status().map(|s| s.as_u16()),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ServiceError::Http {
                message: format!("Gemini HTTP {status}: {text}"),
                status_code: Some(status.as_u16()),
            });
        }

        let body: GenerateResponse = resp.json().await.map_err(|e| ServiceError::Schema {
            model: request.model.clone(),
            message: format!("Failed to parse Gemini envelope: {e}"),
        })?;

        let model = body
            .model_version
            .clone()
            .unwrap_or_else(|| request.model.clone());

        Ok(BackendResponse {
            text: body.text(),
            model,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::ImagePayload;

    #[test]
    fn test_url_includes_model() {
        let backend = GeminiBackend::new("https://example.test/v1beta/", "key");
        assert_eq!(
            backend.url("gemini-3-flash-preview"),
            "https://example.test/v1beta/models/gemini-3-flash-preview:generateContent"
        );
    }

    #[test]
    fn test_body_shape() {
        let image = ImagePayload::parse("data:image/png;base64,AQID").unwrap();
        let request = RecognitionRequest::handwriting("m", image);
        let body = serde_json::to_value(build_body(&request)).unwrap();

        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["inline_data"]["mime_type"], "image/png");
        assert_eq!(parts[0]["inline_data"]["data"], "AQID");
        assert!(parts[1]["text"].as_str().unwrap().contains("OCR"));
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "OBJECT");
    }

    #[test]
    fn test_response_text_joins_parts() {
        let raw = r#"{
            "candidates": [{"content": {"parts": [{"text": "{\"text\":"}, {"text": "\"a\"}"}]}}],
            "modelVersion": "gemini-3-flash-preview"
        }"#;
        let resp: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.text(), r#"{"text":"a"}"#);
    }

    #[test]
    fn test_response_without_candidates_is_empty() {
        let resp: GenerateResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert_eq!(resp.text(), "");
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = GeminiConfig {
            api_key: "${DEFINITELY_NOT_SET_GEMINI_KEY_XYZ}".to_string(),
            ..GeminiConfig::default()
        };
        assert!(GeminiBackend::from_config(&config).is_err());

        let config = GeminiConfig {
            api_key: "literal-key".to_string(),
            ..GeminiConfig::default()
        };
        assert!(GeminiBackend::from_config(&config).is_ok());
    }
}
