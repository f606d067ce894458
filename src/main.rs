mod api;
mod app;
mod config;
mod domain;
mod error;
mod logging;
mod middleware;
mod routes;
mod services;

use std::sync::Arc;

use anyhow::Result;

use services::{DrawingAnalyzer, DrawingStore, GeminiModel, RemoteModel, UploadPipeline};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration (fails fast when the API credential is absent)
    let settings = config::Settings::from_env()?;

    // Initialize logging
    logging::init_logging(&settings.env);

    tracing::info!(
        env = ?settings.env,
        server_addr = %settings.server_addr,
        model = %settings.gemini_model,
        "Starting drawquote backend"
    );

    // Construct the remote model client and inject it explicitly; nothing
    // here lives in process-wide mutable state.
    let model: Arc<dyn RemoteModel> = Arc::new(GeminiModel::new(&settings)?);
    let analyzer = DrawingAnalyzer::new(model, &settings);
    let store = settings.upload_dir.clone().map(DrawingStore::new);
    let pipeline = UploadPipeline::new(&settings, analyzer.clone(), store);

    // Optionally probe the remote capability (non-blocking)
    tokio::spawn({
        let analyzer = analyzer.clone();
        async move {
            if analyzer.test_connection().await {
                tracing::info!("Analysis service is reachable");
            } else {
                tracing::warn!("Analysis service probe failed - will retry on first request");
            }
        }
    });

    // Create application state
    let state = app::AppState::new(settings.clone(), analyzer, pipeline);

    // Build application
    let app = app::create_app(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&settings.server_addr).await?;
    tracing::info!("Listening on {}", settings.server_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
