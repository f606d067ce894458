//! Remote generative-model capability.
//!
//! The pipeline depends on exactly one external capability: "send text and
//! an optional image, receive generated text, optionally constrained to a
//! declared JSON schema." [`RemoteModel`] is that seam; [`GeminiModel`] is
//! the one production implementation, selected by configuration. Tests
//! substitute a scripted implementation without touching process-wide state.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

use crate::config::Settings;

/// One generation request to the remote capability.
#[derive(Debug, Clone)]
pub struct GenerateRequest<'a> {
    pub prompt: &'a str,
    /// Canonical JPEG bytes from the preprocessor, when the prompt needs
    /// the drawing itself.
    pub image_jpeg: Option<&'a [u8]>,
    /// Declared response schema. When set, the provider is asked to emit
    /// JSON conforming to it instead of free-form text.
    pub schema: Option<&'a serde_json::Value>,
}

/// Transport-level failures of the remote capability. Parse failures of the
/// returned text are classified one layer up, in the analyzer.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model request failed: {0}")]
    Transport(String),

    #[error("model endpoint returned status {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("model call timed out")]
    Timeout,

    #[error("model returned no content")]
    Empty,
}

impl ModelError {
    /// Transient failures are eligible for bounded retry; everything else
    /// is deterministic and retrying it is wasted work.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            // Quota (429), auth (401/403) and server-side errors may clear;
            // other 4xx mean the request itself is wrong.
            Self::Status { status, .. } => {
                matches!(status, 401 | 403 | 408 | 429) || *status >= 500
            }
            Self::Timeout | Self::Empty => false,
        }
    }
}

/// Abstract "send prompt (+ optional image), get text back" capability.
#[async_trait]
pub trait RemoteModel: Send + Sync {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<String, ModelError>;
}

/// Client for the Gemini `generateContent` REST API.
#[derive(Clone)]
pub struct GeminiModel {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiModel {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.gemini_timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        tracing::info!(
            model = %settings.gemini_model,
            structured_output = settings.gemini_structured_output,
            "Gemini client initialized"
        );

        Ok(Self {
            client,
            base_url: settings.gemini_base_url.trim_end_matches('/').to_string(),
            api_key: settings.gemini_api_key.clone(),
            model: settings.gemini_model.clone(),
        })
    }
}

// ── Gemini wire types ────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig<'a>>,
}

#[derive(Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'static str,
    response_schema: &'a serde_json::Value,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
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

/// Error envelope Gemini returns on non-2xx responses.
#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}

#[async_trait]
impl RemoteModel for GeminiModel {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<String, ModelError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, self.model
        );

        let mut parts = vec![RequestPart {
            text: Some(request.prompt.to_string()),
            inline_data: None,
        }];
        if let Some(image) = request.image_jpeg {
            parts.push(RequestPart {
                text: None,
                inline_data: Some(InlineData {
                    mime_type: "image/jpeg",
                    data: STANDARD.encode(image),
                }),
            });
        }

        let body = GenerateContentRequest {
            contents: vec![RequestContent { parts }],
            generation_config: request.schema.map(|schema| GenerationConfig {
                response_mime_type: "application/json",
                response_schema: schema,
            }),
        };

        debug!(url = %url, has_image = request.image_jpeg.is_some(), "Gemini request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout
                } else {
                    error!(error = %e, "Gemini request failed");
                    ModelError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<GeminiErrorResponse>()
                .await
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("HTTP {status}"));
            error!(status = %status, detail = %detail, "Gemini error response");
            return Err(ModelError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to read Gemini response body");
            ModelError::Transport(e.to_string())
        })?;

        let text: String = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.text)
            .collect();

        if text.is_empty() {
            return Err(ModelError::Empty);
        }

        debug!(chars = text.len(), "Gemini response received");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(ModelError::Transport("connection refused".into()).is_transient());
        assert!(ModelError::Status {
            status: 429,
            detail: "quota".into()
        }
        .is_transient());
        assert!(ModelError::Status {
            status: 503,
            detail: "overloaded".into()
        }
        .is_transient());
        assert!(ModelError::Status {
            status: 401,
            detail: "bad key".into()
        }
        .is_transient());
    }

    #[test]
    fn deterministic_failures_are_not_transient() {
        assert!(!ModelError::Status {
            status: 400,
            detail: "bad schema".into()
        }
        .is_transient());
        assert!(!ModelError::Timeout.is_transient());
        assert!(!ModelError::Empty.is_transient());
    }

    #[test]
    fn request_body_shape_matches_gemini_wire_format() {
        let schema = serde_json::json!({"type": "object"});
        let body = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart {
                        text: Some("describe".into()),
                        inline_data: None,
                    },
                    RequestPart {
                        text: None,
                        inline_data: Some(InlineData {
                            mime_type: "image/jpeg",
                            data: STANDARD.encode(b"fake"),
                        }),
                    },
                ],
            }],
            generation_config: Some(GenerationConfig {
                response_mime_type: "application/json",
                response_schema: &schema,
            }),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["text"], "describe");
        assert_eq!(
            value["contents"][0]["parts"][1]["inlineData"]["mimeType"],
            "image/jpeg"
        );
        assert_eq!(
            value["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(value["generationConfig"]["responseSchema"]["type"], "object");
    }

    #[test]
    fn response_text_concatenates_parts() {
        let json = r#"{
            "candidates": [{
                "content": { "parts": [{ "text": "{\"a\":" }, { "text": "1}" }] }
            }]
        }"#;
        let parsed: GenerateContentResponse = serde_json::from_str(json).unwrap();
        let text: String = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.text)
            .collect();
        assert_eq!(text, "{\"a\":1}");
    }
}
