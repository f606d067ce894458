use axum::extract::State;
use chrono::Utc;
use std::sync::Arc;

use crate::api::HealthResponse;
use crate::app::AppState;

/// Health check endpoint - public. Reports liveness of the service itself;
/// the remote capability has its own probe at `/api/upload/test`.
pub async fn health_check(State(state): State<Arc<AppState>>) -> HealthResponse {
    HealthResponse {
        success: true,
        status: "ok".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        environment: state.settings.env.as_str().to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}
