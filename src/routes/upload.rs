use axum::extract::{Multipart, State};
use std::sync::Arc;

use crate::api::{ConnectionTestResponse, UploadResponse};
use crate::app::AppState;
use crate::domain::UploadedImage;
use crate::error::{ApiError, ApiResult};

/// Form field carrying the drawing file.
const DRAWING_FIELD: &str = "drawing";

/// Upload and analyze a drawing.
pub async fn upload_drawing(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<UploadResponse> {
    let mut upload: Option<UploadedImage> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some(DRAWING_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or(DRAWING_FIELD).to_string();
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::Validation(format!("Failed to read upload: {e}")))?
            .to_vec();

        upload = Some(UploadedImage {
            filename,
            mime_type,
            bytes,
        });
        break;
    }

    let upload = upload.ok_or_else(|| ApiError::Validation("No file uploaded".to_string()))?;
    let result = state.pipeline.run(upload).await?;
    Ok(UploadResponse::from(result))
}

/// Probe the remote analysis capability.
pub async fn test_remote_connection(State(state): State<Arc<AppState>>) -> ConnectionTestResponse {
    let connected = state.analyzer.test_connection().await;
    ConnectionTestResponse::new(connected)
}
