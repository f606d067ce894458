//! Unified API error handling
//!
//! Every pipeline failure is classified here so the HTTP layer can tell a
//! client "your file was rejected" (4xx) apart from "the analysis dependency
//! is down" (502/504) and "something internal broke" (500).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    Validation(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("File too large: {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Uploaded file could not be decoded as an image")]
    CorruptImage(#[source] image::ImageError),

    #[error("Analysis service unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Analysis service returned an unparseable response")]
    MalformedResponse(#[source] anyhow::Error),

    #[error("Request timed out during {stage}")]
    Timeout { stage: &'static str },

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

/// Uniform failure envelope: `{"success": false, "error": ..., "code": ...}`.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::CorruptImage(_) => StatusCode::BAD_REQUEST,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::RemoteUnavailable(_) | Self::MalformedResponse(_) => StatusCode::BAD_GATEWAY,
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::UnsupportedMediaType(_) => "UNSUPPORTED_MEDIA_TYPE",
            Self::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            Self::CorruptImage(_) => "CORRUPT_IMAGE",
            Self::RemoteUnavailable(_) => "REMOTE_UNAVAILABLE",
            Self::MalformedResponse(_) => "MALFORMED_RESPONSE",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn public_message(&self) -> String {
        match self {
            // Don't leak internal error chains or provider payloads
            Self::Internal(_) => "An internal error occurred".to_string(),
            Self::MalformedResponse(_) => {
                "The analysis service returned an unexpected response".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Internal(e) => {
                tracing::error!(error = ?e, "Internal server error");
            }
            Self::MalformedResponse(e) => {
                tracing::error!(error = ?e, "Malformed remote response");
            }
            Self::RemoteUnavailable(_) | Self::Timeout { .. } => {
                tracing::error!(error = %self, "Upstream dependency failure");
            }
            _ => {
                tracing::warn!(error = %self, "Request rejected");
            }
        }

        let status = self.status_code();
        let body = ErrorResponse {
            success: false,
            error: self.public_message(),
            code: self.error_code().to_string(),
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
