pub mod health;
pub mod upload;

use axum::{extract::OriginalUri, routing::get, routing::post, Router};
use std::sync::Arc;

use crate::api::RouteNotFound;
use crate::app::AppState;

/// Build the API router with all routes
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/upload", post(upload::upload_drawing))
        .route("/api/upload/test", get(upload::test_remote_connection))
        .fallback(route_not_found)
}

async fn route_not_found(OriginalUri(uri): OriginalUri) -> RouteNotFound {
    RouteNotFound::new(uri.path())
}
