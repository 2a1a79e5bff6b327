//! MediaHub server: background media processing and remote cache upkeep
//!
//! Main entry point that wires all crates together and runs until signalled.

use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt};

use mediahub_core::config::AppConfig;
use mediahub_core::error::AppError;
use mediahub_database::DatabasePool;
use mediahub_database::repositories::{PgAttachmentRepository, PgEmojiRepository};
use mediahub_media::{MediaContext, MediaManager};
use mediahub_storage::LocalStorageProvider;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from files and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("MEDIAHUB_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting MediaHub v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Database connection + migrations ─────────────────
    tracing::info!("Connecting to database...");
    let db = DatabasePool::connect(&config.database).await?;

    mediahub_database::migration::run_migrations(db.pool()).await?;

    // ── Step 2: Blob storage ─────────────────────────────────────
    tracing::info!(root = %config.storage.root_path, "Opening local storage...");
    let storage = Arc::new(LocalStorageProvider::new(&config.storage.root_path).await?);

    // ── Step 3: Repositories ─────────────────────────────────────
    let attachments = Arc::new(PgAttachmentRepository::new(db.pool().clone()));
    let emojis = Arc::new(PgEmojiRepository::new(db.pool().clone()));

    // ── Step 4: Media manager ────────────────────────────────────
    let ctx = MediaContext::new(attachments, emojis, storage, &config.media);
    let manager = MediaManager::new(ctx, &config.media).await?;
    tracing::info!(
        workers = manager.num_workers(),
        queue_size = manager.queue_size(),
        remote_cache_days = config.media.remote_cache_days,
        "MediaHub ready"
    );

    // ── Step 5: Wait for shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received");

    let stopped = manager.stop().await;
    db.close().await;
    stopped?;

    tracing::info!("MediaHub shut down gracefully");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
