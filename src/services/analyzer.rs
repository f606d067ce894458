//! Drawing analysis and cost estimation against the remote model.
//!
//! One client, two operations plus a probe: `extract` turns image bytes into
//! [`DrawingSpecs`], `estimate` turns specs into a [`CostEstimate`],
//! `test_connection` checks the capability is reachable. Structured output
//! (a declared response schema) is the default; the free-form fallback keeps
//! the fence-stripping parse path for capabilities without schema support.

use std::sync::Arc;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::Settings;
use crate::domain::{CostEstimate, DrawingExtraction, DrawingSpecs};
use crate::services::model::{GenerateRequest, ModelError, RemoteModel};
use crate::services::prompts;

/// Maximum historical comparables serialized into a costing prompt.
const MAX_COMPARABLES: usize = 5;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("remote model call failed: {0}")]
    Remote(#[from] ModelError),

    #[error("model response did not match the expected shape: {detail}")]
    Malformed { detail: String },
}

/// Client for drawing analysis. Cheap to clone; the model handle is shared.
#[derive(Clone)]
pub struct DrawingAnalyzer {
    model: Arc<dyn RemoteModel>,
    structured_output: bool,
    retry_budget: Duration,
}

impl DrawingAnalyzer {
    pub fn new(model: Arc<dyn RemoteModel>, settings: &Settings) -> Self {
        Self {
            model,
            structured_output: settings.gemini_structured_output,
            retry_budget: Duration::from_secs(settings.gemini_max_retry_seconds),
        }
    }

    /// Extract structured specs from preprocessed drawing bytes.
    ///
    /// Returns the specs and the model's overall confidence in the reading.
    #[instrument(skip(self, image_jpeg), fields(image_bytes = image_jpeg.len()))]
    pub async fn extract(&self, image_jpeg: &[u8]) -> Result<(DrawingSpecs, f64), AnalysisError> {
        let schema = prompts::extraction_schema();
        let text = self
            .generate_with_retry(prompts::EXTRACTION_PROMPT, Some(image_jpeg), Some(&schema))
            .await?;

        let extraction: DrawingExtraction = decode_response(&text)?;
        let (specs, confidence) = extraction.into_normalized();
        info!(
            confidence,
            material = %specs.material.material_type,
            quantity = specs.quantity,
            "Drawing analysis completed"
        );
        Ok((specs, confidence))
    }

    /// Estimate manufacturing cost for extracted specs, optionally informed
    /// by historical comparables (at most [`MAX_COMPARABLES`] are sent).
    #[instrument(skip_all, fields(quantity = specs.quantity))]
    pub async fn estimate(
        &self,
        specs: &DrawingSpecs,
        comparables: &[serde_json::Value],
    ) -> Result<CostEstimate, AnalysisError> {
        let specs_json =
            serde_json::to_string_pretty(specs).map_err(|e| AnalysisError::Malformed {
                detail: format!("failed to serialize specs: {e}"),
            })?;
        if comparables.len() > MAX_COMPARABLES {
            debug!(
                supplied = comparables.len(),
                sent = MAX_COMPARABLES,
                "Truncating historical comparables"
            );
        }
        let comparables_json = if comparables.is_empty() {
            "No historical data available".to_string()
        } else {
            serde_json::to_string_pretty(&comparables[..comparables.len().min(MAX_COMPARABLES)])
                .map_err(|e| AnalysisError::Malformed {
                    detail: format!("failed to serialize comparables: {e}"),
                })?
        };

        let prompt = prompts::cost_estimation_prompt(&specs_json, &comparables_json);
        let schema = prompts::cost_schema();
        let text = self
            .generate_with_retry(&prompt, None, Some(&schema))
            .await?;

        let estimate: CostEstimate = decode_response(&text)?;
        let estimate = estimate.normalize();
        info!(
            total = estimate.total,
            confidence = estimate.confidence,
            "Cost estimation completed"
        );
        Ok(estimate)
    }

    /// Probe the remote capability. Failures are reported, never raised.
    pub async fn test_connection(&self) -> bool {
        let request = GenerateRequest {
            prompt: prompts::CONNECTION_PROBE_PROMPT,
            image_jpeg: None,
            schema: None,
        };
        match self.model.generate(request).await {
            Ok(text) => {
                info!(response = %text.trim(), "Connection test successful");
                true
            }
            Err(e) => {
                warn!(error = %e, "Connection test failed");
                false
            }
        }
    }

    /// One remote call with bounded exponential backoff on transient
    /// failures. Deterministic failures (timeouts, malformed requests,
    /// empty responses) are surfaced immediately: retrying them is wasted
    /// work and wasted quota.
    async fn generate_with_retry(
        &self,
        prompt: &str,
        image_jpeg: Option<&[u8]>,
        schema: Option<&serde_json::Value>,
    ) -> Result<String, ModelError> {
        let schema = if self.structured_output { schema } else { None };
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(500))
            .with_max_elapsed_time(Some(self.retry_budget))
            .build();

        backoff::future::retry(policy, || async {
            let request = GenerateRequest {
                prompt,
                image_jpeg,
                schema,
            };
            self.model.generate(request).await.map_err(|e| {
                if e.is_transient() {
                    warn!(error = %e, "Transient model failure, will retry");
                    backoff::Error::transient(e)
                } else {
                    backoff::Error::permanent(e)
                }
            })
        })
        .await
    }
}

/// Strip an optional outer Markdown code fence, then decode strictly.
///
/// Models occasionally wrap JSON in ` ```json ... ``` ` even when told not
/// to; a fenced response must parse identically to an unfenced one. Anything
/// that still fails to decode is a malformed response, never a
/// partially-populated value.
fn decode_response<T: DeserializeOwned>(text: &str) -> Result<T, AnalysisError> {
    let stripped = strip_code_fences(text);
    serde_json::from_str(stripped).map_err(|e| {
        debug!(raw = %truncate(text, 512), "Unparseable model response");
        AnalysisError::Malformed {
            detail: e.to_string(),
        }
    })
}

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\n?(.*?)\n?```\s*$").unwrap());

fn strip_code_fences(input: &str) -> &str {
    let trimmed = input.trim();
    match RE_OUTER_FENCES.captures(trimmed) {
        Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or(trimmed).trim(),
        None => trimmed,
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use crate::services::mock::MockModel;

    const EXTRACTION_JSON: &str = r#"{
        "dimensions": {
            "length": 100.0, "width": 50.0, "height": null,
            "thickness": 2.0, "diameter": null, "unit": "mm"
        },
        "material": { "type": "Steel SS400", "confidence": 0.92 },
        "quantity": 2,
        "surfaceFinish": "Painting",
        "tolerances": ["±0.1"],
        "manufacturingProcess": ["cutting", "welding"],
        "overallConfidence": 0.88
    }"#;

    const COST_JSON: &str = r#"{
        "material": 5200, "labor": 14000, "overhead": 2900,
        "total": 22100, "confidence": 0.7,
        "reasoning": "Mid-volume laser cutting and welding."
    }"#;

    fn analyzer(mock: Arc<MockModel>) -> DrawingAnalyzer {
        DrawingAnalyzer::new(mock, &config::test_settings())
    }

    #[test]
    fn fence_stripping_variants() {
        let bare = r#"{"a": 1}"#;
        assert_eq!(strip_code_fences(bare), bare);
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), bare);
        assert_eq!(strip_code_fences("```\n{\"a\": 1}\n```"), bare);
        assert_eq!(strip_code_fences("  ```json\n{\"a\": 1}\n```  \n"), bare);
    }

    #[test]
    fn inner_fences_are_preserved() {
        // Only the outer fence is formatting noise.
        let input = "```json\n{\"reasoning\": \"use ``` in docs\"}\n```";
        assert_eq!(
            strip_code_fences(input),
            "{\"reasoning\": \"use ``` in docs\"}"
        );
    }

    #[tokio::test]
    async fn extract_parses_fenced_and_unfenced_identically() {
        let fenced = format!("```json\n{EXTRACTION_JSON}\n```");

        let mock = Arc::new(MockModel::scripted(vec![Ok(EXTRACTION_JSON.to_string())]));
        let (plain_specs, plain_conf) = analyzer(mock).extract(b"jpeg").await.unwrap();

        let mock = Arc::new(MockModel::scripted(vec![Ok(fenced)]));
        let (fenced_specs, fenced_conf) = analyzer(mock).extract(b"jpeg").await.unwrap();

        assert_eq!(
            serde_json::to_value(&plain_specs).unwrap(),
            serde_json::to_value(&fenced_specs).unwrap()
        );
        assert_eq!(plain_conf, fenced_conf);
    }

    #[tokio::test]
    async fn extract_passes_image_and_schema() {
        let mock = Arc::new(MockModel::scripted(vec![Ok(EXTRACTION_JSON.to_string())]));
        analyzer(mock.clone()).extract(b"jpeg-bytes").await.unwrap();

        let calls = mock.requests();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].had_image);
        assert!(calls[0].had_schema);
        assert!(calls[0].prompt.contains("manufacturing engineer"));
    }

    #[tokio::test]
    async fn free_form_mode_omits_schema() {
        let mut settings = config::test_settings();
        settings.gemini_structured_output = false;
        let mock = Arc::new(MockModel::scripted(vec![Ok(EXTRACTION_JSON.to_string())]));
        DrawingAnalyzer::new(mock.clone(), &settings)
            .extract(b"jpeg")
            .await
            .unwrap();
        assert!(!mock.requests()[0].had_schema);
    }

    #[tokio::test]
    async fn extract_malformed_response_is_not_retried() {
        let mock = Arc::new(MockModel::scripted(vec![Ok("not json at all".to_string())]));
        let err = analyzer(mock.clone()).extract(b"jpeg").await.unwrap_err();
        assert!(matches!(err, AnalysisError::Malformed { .. }));
        assert_eq!(mock.requests().len(), 1);
    }

    #[tokio::test]
    async fn transient_failures_are_retried_within_budget() {
        let mock = Arc::new(MockModel::scripted(vec![
            Err(ModelError::Status {
                status: 503,
                detail: "overloaded".into(),
            }),
            Ok(EXTRACTION_JSON.to_string()),
        ]));
        let (specs, _) = analyzer(mock.clone()).extract(b"jpeg").await.unwrap();
        assert_eq!(specs.quantity, 2);
        assert_eq!(mock.requests().len(), 2);
    }

    #[tokio::test]
    async fn estimate_embeds_specs_and_truncates_comparables() {
        let mock = Arc::new(MockModel::scripted(vec![
            Ok(EXTRACTION_JSON.to_string()),
            Ok(COST_JSON.to_string()),
        ]));
        let a = analyzer(mock.clone());
        let (specs, _) = a.extract(b"jpeg").await.unwrap();

        let comparables: Vec<serde_json::Value> = (1..=7)
            .map(|i| serde_json::json!({ "job": format!("comp-{i}"), "total": i * 1000 }))
            .collect();
        let estimate = a.estimate(&specs, &comparables).await.unwrap();
        assert_eq!(estimate.total, 22100.0);

        let cost_call = &mock.requests()[1];
        assert!(!cost_call.had_image);
        assert!(cost_call.prompt.contains("Steel SS400"));
        assert!(cost_call.prompt.contains("comp-5"));
        assert!(!cost_call.prompt.contains("comp-6"));
    }

    #[tokio::test]
    async fn estimate_is_not_expected_to_be_idempotent() {
        // Two calls with identical specs may produce different figures;
        // assert plausibility bounds, not equality.
        // The second reply arrives fence-wrapped; it must parse the same way.
        let mock = Arc::new(MockModel::scripted(vec![
            Ok(COST_JSON.to_string()),
            Ok("```json\n{\"material\": 5400, \"labor\": 13800, \"overhead\": 3000, \
                \"total\": 22200, \"confidence\": 0.65}\n```"
                .to_string()),
        ]));
        let a = analyzer(mock);
        let specs = sample_specs();
        let first = a.estimate(&specs, &[]).await.unwrap();
        let second = a.estimate(&specs, &[]).await.unwrap();
        for e in [first, second] {
            assert!(e.total >= 0.0);
            assert!((0.0..=1.0).contains(&e.confidence));
        }
    }

    #[tokio::test]
    async fn connection_probe_reports_without_raising() {
        let mock = Arc::new(MockModel::scripted(vec![Ok("OK".to_string())]));
        assert!(analyzer(mock).test_connection().await);

        let mock = Arc::new(MockModel::scripted(vec![Err(ModelError::Transport(
            "refused".into(),
        ))]));
        assert!(!analyzer(mock).test_connection().await);
    }

    fn sample_specs() -> DrawingSpecs {
        let extraction: DrawingExtraction = serde_json::from_str(EXTRACTION_JSON).unwrap();
        extraction.into_normalized().0
    }
}
