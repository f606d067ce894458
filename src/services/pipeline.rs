//! Upload orchestration: one request-scoped run through
//! validate → preprocess → archive → analyze → cost → assemble.
//!
//! Each stage failure is classified so the HTTP layer can distinguish bad
//! input (4xx) from dependency failures (502/504). The whole run is bounded
//! by a single deadline; a stalled remote call can never hold the request
//! open indefinitely.

use std::fmt;
use std::time::Duration;

use anyhow::anyhow;
use tracing::{info, warn};

use crate::config::Settings;
use crate::domain::{next_document_stem, AnalysisResult, UploadedImage};
use crate::error::{ApiError, ApiResult};
use crate::services::analyzer::{AnalysisError, DrawingAnalyzer};
use crate::services::model::ModelError;
use crate::services::preprocess::{ImagePreprocessor, PreprocessError};
use crate::services::storage::DrawingStore;

/// Pipeline stages, in order. Terminal failure is reachable from any of
/// them; the stage name rides along in logs and timeout classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Received,
    Validated,
    Preprocessed,
    Analyzed,
    Costed,
    Completed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Validated => "validated",
            Stage::Preprocessed => "preprocessed",
            Stage::Analyzed => "analyzed",
            Stage::Costed => "costed",
            Stage::Completed => "completed",
        };
        f.write_str(name)
    }
}

pub struct UploadPipeline {
    settings: Settings,
    preprocessor: ImagePreprocessor,
    analyzer: DrawingAnalyzer,
    store: Option<DrawingStore>,
}

impl UploadPipeline {
    pub fn new(
        settings: &Settings,
        analyzer: DrawingAnalyzer,
        store: Option<DrawingStore>,
    ) -> Self {
        let preprocessor = ImagePreprocessor::new(
            settings.allowed_mime_types.clone(),
            settings.max_upload_bytes,
            settings.max_image_dimension_px,
            settings.jpeg_quality,
        );
        Self {
            settings: settings.clone(),
            preprocessor,
            analyzer,
            store,
        }
    }

    /// Run one upload through the full pipeline under the request deadline.
    pub async fn run(&self, upload: UploadedImage) -> ApiResult<AnalysisResult> {
        let deadline = Duration::from_secs(self.settings.request_deadline_seconds);
        match tokio::time::timeout(deadline, self.run_inner(upload)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(
                    deadline_seconds = self.settings.request_deadline_seconds,
                    "Upload pipeline exceeded its deadline"
                );
                Err(ApiError::Timeout {
                    stage: "upload pipeline",
                })
            }
        }
    }

    async fn run_inner(&self, upload: UploadedImage) -> ApiResult<AnalysisResult> {
        let UploadedImage {
            filename,
            mime_type,
            bytes,
        } = upload;

        info!(
            stage = %Stage::Received,
            filename = %filename,
            size = bytes.len(),
            mime_type = %mime_type,
            "File upload received"
        );

        // Received -> Validated: reject before any work is spent.
        self.validate(&mime_type, &bytes)?;
        info!(stage = %Stage::Validated, "Upload accepted");

        // Validated -> Preprocessed: CPU-bound, so off the async runtime.
        let preprocessor = self.preprocessor.clone();
        let processed = tokio::task::spawn_blocking(move || {
            preprocessor.preprocess(&bytes, &mime_type)
        })
        .await
        .map_err(|e| ApiError::Internal(anyhow!("preprocessing task failed: {e}")))?
        .map_err(map_preprocess_error)?;
        info!(
            stage = %Stage::Preprocessed,
            processed_bytes = processed.len(),
            "Image preprocessed"
        );

        let stem = next_document_stem();
        let archive_name = format!("drawing-{stem}.jpg");

        // Orchestrator-owned side effect: archive failures degrade to a
        // warning because quoting outranks archival.
        if let Some(store) = &self.store {
            if let Err(e) = store.archive(&archive_name, &processed).await {
                warn!(error = ?e, "Failed to archive preprocessed drawing, continuing");
            }
        }

        // Preprocessed -> Analyzed
        let (specs, analysis_confidence) = self
            .analyzer
            .extract(&processed)
            .await
            .map_err(|e| classify_analysis_error(e, "analysis"))?;
        info!(stage = %Stage::Analyzed, confidence = analysis_confidence, "Drawing analyzed");

        // Analyzed -> Costed: costing is a pure function of the specs just
        // produced, so ordering is fixed.
        let costing = self
            .analyzer
            .estimate(&specs, &[])
            .await
            .map_err(|e| classify_analysis_error(e, "costing"))?;
        info!(stage = %Stage::Costed, total = costing.total, "Cost estimated");

        let result = AnalysisResult {
            document_id: format!("DOC-{stem}"),
            filename: archive_name,
            specs,
            analysis_confidence,
            costing,
        };
        info!(
            stage = %Stage::Completed,
            document_id = %result.document_id,
            "Upload pipeline completed"
        );
        Ok(result)
    }

    fn validate(&self, mime_type: &str, bytes: &[u8]) -> ApiResult<()> {
        if bytes.is_empty() {
            return Err(ApiError::Validation("Uploaded file is empty".to_string()));
        }
        if !self.settings.mime_allowed(mime_type) {
            return Err(ApiError::UnsupportedMediaType(format!(
                "{mime_type} (only JPEG, PNG and WebP images are accepted)"
            )));
        }
        if bytes.len() > self.settings.max_upload_bytes {
            return Err(ApiError::PayloadTooLarge {
                size: bytes.len(),
                limit: self.settings.max_upload_bytes,
            });
        }
        Ok(())
    }
}

fn map_preprocess_error(err: PreprocessError) -> ApiError {
    match err {
        PreprocessError::UnsupportedMediaType(mime) => ApiError::UnsupportedMediaType(mime),
        PreprocessError::PayloadTooLarge { size, limit } => {
            ApiError::PayloadTooLarge { size, limit }
        }
        PreprocessError::CorruptImage(e) => ApiError::CorruptImage(e),
        PreprocessError::Encode(e) => {
            ApiError::Internal(anyhow::Error::new(e).context("JPEG re-encode failed"))
        }
    }
}

fn classify_analysis_error(err: AnalysisError, stage: &'static str) -> ApiError {
    match err {
        AnalysisError::Remote(ModelError::Timeout) => ApiError::Timeout { stage },
        AnalysisError::Remote(ModelError::Empty) => {
            ApiError::MalformedResponse(anyhow!("model returned no content during {stage}"))
        }
        AnalysisError::Remote(e) => ApiError::RemoteUnavailable(format!("{stage} failed: {e}")),
        AnalysisError::Malformed { detail } => {
            ApiError::MalformedResponse(anyhow!("{stage}: {detail}"))
        }
    }
}
