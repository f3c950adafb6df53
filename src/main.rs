//! stripmill - strip-parallel image processing server
//!
//! Accepts batches of images over TCP, splits each image into horizontal
//! strips, processes the strips across a fixed worker pool and streams the
//! reassembled results back in order.

use std::sync::Arc;
use stripmill_core::OperationRegistry;
use stripmill_server::{Config, Server, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration (from file if STRIPMILL_CONFIG is set, then env overrides)
    let config = Config::load().map_err(|e| {
        tracing::error!("Failed to load config: {}", e);
        e
    })?;
    if let Ok(path) = std::env::var("STRIPMILL_CONFIG") {
        tracing::info!("Loaded config from {}", path);
    }

    tracing::info!("Starting stripmill server");
    tracing::info!("  Bind address: {}", config.network.bind_addr);
    tracing::info!("  Pool size: {} rank(s)", config.cluster.pool_size);
    tracing::info!("  Operation field: {:?}", config.protocol.operation_field);
    tracing::info!("  Max image size: {} MB", config.protocol.max_image_size_mb);
    tracing::info!("  Output: {:?}", config.output.encode_format());

    let server = Arc::new(Server::new(
        ServerConfig::from_config(&config),
        Arc::new(OperationRegistry::default()),
    )?);

    // Spawn shutdown signal handler
    let shutdown_server = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal, stopping server...");
        shutdown_server.shutdown();
    });

    // Run server (blocks until shutdown)
    server.run().await?;

    let stats = server.stats();
    tracing::info!(
        "Server stopped ({} session(s), {} image(s) returned)",
        stats
            .sessions_completed
            .load(std::sync::atomic::Ordering::Relaxed),
        stats
            .images_responded
            .load(std::sync::atomic::Ordering::Relaxed)
    );
    Ok(())
}
