//! # apoyo-server
//!
//! Backend for the Apoyo anonymous support groups.
//!
//! This binary provides:
//! - **Message ingestion**: validation, keyword moderation and durable storage
//!   of group messages in SQLite
//! - **Real-time fan-out** of every persisted message to the WebSocket
//!   subscribers of its group
//! - **REST API** (axum) for posting messages, reading group history, the
//!   group catalog and health checks

mod api;
mod broadcast;
mod config;
mod error;
mod ingest;
mod registry;
mod store;
mod subscription;

use std::sync::Arc;

use apoyo_shared::constants::APP_NAME;
use apoyo_shared::TermListFilter;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::broadcast::Broadcaster;
use crate::config::ServerConfig;
use crate::ingest::IngestionPipeline;
use crate::registry::SubscriberRegistry;
use crate::store::{MessageStore, SqliteStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,apoyo_server=debug")),
        )
        .init();

    info!("Starting {} server v{}", APP_NAME, env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------

    // SQLite store (creates the file and runs migrations if needed)
    let store = SqliteStore::open(&config.database_path)?;
    info!(path = %config.database_path.display(), "Database ready");

    let registry = SubscriberRegistry::new();
    let (broadcaster, _broadcast_worker) = Broadcaster::spawn(registry.clone());

    let messages: Arc<dyn MessageStore> = Arc::new(store.clone());
    let pipeline = IngestionPipeline::new(
        messages.clone(),
        Arc::new(TermListFilter::default()),
        broadcaster,
    );

    let shutdown = CancellationToken::new();
    let http_addr = config.http_addr;

    let app_state = AppState {
        pipeline,
        messages,
        groups: Arc::new(store),
        registry,
        config: Arc::new(config),
        shutdown: shutdown.clone(),
    };

    // -----------------------------------------------------------------------
    // 4. Shutdown signal
    // -----------------------------------------------------------------------
    // Cancelling the token stops the HTTP server and every live subscription.
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down");
                shutdown.cancel();
            }
            Err(e) => tracing::error!(error = %e, "Unable to listen for shutdown signal"),
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    if let Err(e) = api::serve(app_state, http_addr).await {
        tracing::error!(error = %e, "HTTP server failed");
        return Err(e);
    }

    info!("Server stopped");
    Ok(())
}
