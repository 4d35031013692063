use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{fmt, EnvFilter};

use auto_creative_engine::config::{Settings, PROJECT_NAME};
use auto_creative_engine::engine::CreativeEngine;
use auto_creative_engine::gemini::GeminiClient;
use auto_creative_engine::render::PollinationsRenderer;
use auto_creative_engine::routes::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let settings = Arc::new(Settings::from_env());
    settings.ensure_dirs().context("creating storage directories")?;
    tracing::info!("Using API key: {}", settings.redacted_key());
    if settings.mock_mode {
        tracing::warn!("Mock mode: no remote calls, specs are templated and images are placeholders");
    }
    if settings.hf_token.is_some() {
        tracing::debug!("HF_TOKEN is set but not used");
    }

    let specs = Arc::new(GeminiClient::new(&settings).context("building Gemini client")?);
    let renderer = Arc::new(PollinationsRenderer::new(&settings).context("building image renderer")?);
    let state = AppState {
        engine: Arc::new(CreativeEngine::new(settings.clone(), specs, renderer)),
    };
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    tracing::info!(%addr, "Starting {}", PROJECT_NAME);
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving http")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
