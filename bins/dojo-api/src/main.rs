mod handlers;
mod metrics;
mod routes;

use anyhow::Context;
use axum::Router;
use dojo_common::catalog::ChallengeCatalog;
use dojo_common::config::EngineConfig;
use dojo_engine::ChallengeEngine;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub struct AppState {
    pub engine: ChallengeEngine,
    pub catalog: ChallengeCatalog,
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new().merge(routes::routes()).with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
        )
        .with_target(false)
        .init();

    info!("Dojo API booting...");

    let catalog_path = std::env::var("DOJO_CHALLENGES")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(dojo_common::catalog::DEFAULT_CATALOG_PATH));
    let catalog = ChallengeCatalog::load(&catalog_path)
        .with_context(|| format!("Failed to load challenges from {}", catalog_path.display()))?;

    info!("Loaded challenges: {:?}", catalog.slugs());

    let config = EngineConfig::from_env();
    info!(endpoint = %config.remote.endpoint, "Remote execution service configured");

    let engine = ChallengeEngine::new(config).context("Failed to initialize execution engine")?;
    let state = Arc::new(AppState { engine, catalog });

    // Start server
    let addr = std::env::var("DOJO_API_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app(state)).await.context("Server error")?;
    Ok(())
}
