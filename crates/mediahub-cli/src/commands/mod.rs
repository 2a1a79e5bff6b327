//! CLI command definitions and dispatch.

pub mod config;
pub mod migrate;
pub mod prune;
pub mod stats;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use mediahub_core::config::AppConfig;
use mediahub_core::error::AppError;
use mediahub_database::DatabasePool;
use mediahub_database::repositories::{PgAttachmentRepository, PgEmojiRepository};
use mediahub_media::MediaContext;
use mediahub_storage::LocalStorageProvider;

use crate::output::OutputFormat;

/// MediaHub: media processing and remote cache maintenance
#[derive(Debug, Parser)]
#[command(name = "mediahub", version, about, long_about = None)]
pub struct Cli {
    /// Configuration environment (loads config/default then config/<env>)
    #[arg(short, long, default_value = "development")]
    pub env: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Evict cached copies of old remote media
    Prune(prune::PruneArgs),
    /// Show remote media cache statistics
    Stats,
    /// Run pending database migrations
    Migrate,
    /// Configuration inspection
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        match &self.command {
            Commands::Prune(args) => prune::execute(args, &self.env, self.format).await,
            Commands::Stats => stats::execute(&self.env, self.format).await,
            Commands::Migrate => migrate::execute(&self.env).await,
            Commands::Config(args) => config::execute(args, &self.env, self.format).await,
        }
    }
}

/// Helper: load configuration for an environment
pub fn load_config(env: &str) -> Result<AppConfig, AppError> {
    AppConfig::load(env)
}

/// Helper: connect to the configured database
pub async fn connect(config: &AppConfig) -> Result<DatabasePool, AppError> {
    DatabasePool::connect(&config.database).await
}

/// Helper: assemble the media context backed by Postgres and local storage
pub async fn media_context(config: &AppConfig, db: &DatabasePool) -> Result<MediaContext, AppError> {
    let storage = Arc::new(LocalStorageProvider::new(&config.storage.root_path).await?);
    Ok(MediaContext::new(
        Arc::new(PgAttachmentRepository::new(db.pool().clone())),
        Arc::new(PgEmojiRepository::new(db.pool().clone())),
        storage,
        &config.media,
    ))
}
