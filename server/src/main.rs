mod db;
mod frame;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::services::snapshot::{MemorySnapshots, PgSnapshots, SnapshotStore};
use crate::state::{AppState, RelayConfig, env_parse};

const DEFAULT_PORT: u16 = 3000;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port: u16 = env_parse("PORT", DEFAULT_PORT);

    // Snapshots survive restarts only with a database.
    let snapshots: Arc<dyn SnapshotStore> = match std::env::var("DATABASE_URL") {
        Ok(url) => Arc::new(PgSnapshots::new(db::init_pool(&url).await?)),
        Err(_) => {
            tracing::warn!("DATABASE_URL not set; snapshots are kept in memory");
            Arc::new(MemorySnapshots::default())
        }
    };

    let config = RelayConfig::from_env();
    tracing::info!(snapshot_max_bytes = config.snapshot_max_bytes, client_queue = config.client_queue, "relay config");
    let state = AppState::new(snapshots, config);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(%port, "tutorboard relay listening");
    axum::serve(listener, routes::app(state)).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "ctrl-c handler failed; running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
