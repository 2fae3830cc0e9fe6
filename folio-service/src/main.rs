use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

mod aggregation;
mod api;
mod config;
mod db;
mod error;
mod filter;
mod ingestion;
mod service;
mod storage;
mod vision;

use crate::db::Database;
use crate::filter::KeywordFilter;
use crate::service::FolioService;
use crate::storage::FsBlobStore;
use crate::vision::VisionClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_logging();

    info!("Starting Folio service v{}", env!("CARGO_PKG_VERSION"));

    let config = config::load_config()?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        vision_url = %config.vision.base_url,
        vision_model = %config.vision.model,
        "Configuration loaded"
    );
    if config.vision.api_key.is_empty() {
        warn!("No vision API key configured; description requests are sent unauthenticated");
    }

    // Ensure data directory exists
    std::fs::create_dir_all(&config.storage.data_dir)?;

    // Initialize database
    let db_path = config.storage.data_dir.join("folio.db");
    let db = Arc::new(Database::open(&db_path)?);
    info!(path = %db_path.display(), "Database initialized");

    let blob_root = config.storage.data_dir.join("blobs");
    std::fs::create_dir_all(&blob_root)?;
    let blobs = Arc::new(FsBlobStore::new(&blob_root));
    info!(path = %blob_root.display(), "Blob store initialized");

    let describer = Arc::new(VisionClient::new(config.vision.clone())?);
    let classifier = Arc::new(KeywordFilter::new(&config.ingestion.logo_keywords));

    let service = Arc::new(FolioService::new(
        db,
        blobs,
        describer,
        classifier,
        config.ingestion.clone(),
    ));

    // Build the router
    let app = api::router(service.clone());

    // Start the server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(service))
        .await?;

    Ok(())
}

/// Resolves on Ctrl-C, stopping in-flight ingestions first
async fn shutdown_signal(service: Arc<FolioService>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }

    info!("Shutdown requested");
    service.cancel_all_ingestions();
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let format = fmt::format()
        .with_target(true)
        .with_thread_ids(true)
        .compact();

    // Use RUST_LOG if set, otherwise default to info level for our crate
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("folio_service=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().event_format(format))
        .with(filter)
        .init();
}
