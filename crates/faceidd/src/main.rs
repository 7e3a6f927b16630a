use anyhow::Result;
use faceid_store::FaceStore;
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod routes;
mod service;

use service::{RegistrationService, VerificationService};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = config::Config::from_env()?;
    tracing::info!(
        model = config.model.name(),
        dimension = config.model.dimension(),
        "faceidd starting"
    );

    let store = FaceStore::connect(&config.database_url, config.model.dimension()).await?;
    store.init_schema().await?;

    let engine = engine::spawn_engine(&config.model_dir, config.model)?;

    let state = routes::AppState {
        registration: RegistrationService::new(engine.clone(), store.clone()),
        verification: VerificationService::new(engine, store, config.model),
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "faceidd ready");

    axum::serve(listener, routes::router(state, config.max_upload_bytes))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("faceidd shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
