//! Configuration inspection commands.

use clap::{Args, Subcommand};

use mediahub_core::error::AppError;
use mediahub_database::connection::redact_credentials;

use crate::output::{self, OutputFormat};

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective media configuration
    Show,
    /// Validate configuration
    Validate,
}

/// Execute config commands
pub async fn execute(args: &ConfigArgs, env: &str, format: OutputFormat) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => {
            let config = super::load_config(env)?;
            let media = &config.media;
            match format {
                OutputFormat::Json => output::print_json(media),
                OutputFormat::Table => {
                    let workers = media
                        .worker_count
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| "auto".to_string());
                    output::print_kv("Remote cache days", &media.remote_cache_days.to_string());
                    output::print_kv("Workers", &workers);
                    output::print_kv("Prune schedule", &media.prune_schedule);
                    output::print_kv("Prune grace (s)", &media.prune_grace_seconds.to_string());
                    output::print_kv("Prune batch size", &media.prune_batch_size.to_string());
                    output::print_kv(
                        "Thumbnail max (px)",
                        &media.thumbnail_max_dimension.to_string(),
                    );
                    output::print_kv("Image max (bytes)", &media.image_max_size.to_string());
                    output::print_kv("Video max (bytes)", &media.video_max_size.to_string());
                    output::print_kv(
                        "Local emoji max (bytes)",
                        &media.emoji_local_max_size.to_string(),
                    );
                    output::print_kv(
                        "Remote emoji max (bytes)",
                        &media.emoji_remote_max_size.to_string(),
                    );
                }
            }
        }
        ConfigCommand::Validate => match super::load_config(env) {
            Ok(config) => {
                output::print_success(&format!("Configuration for '{}' is valid", env));
                output::print_kv("Database", &redact_credentials(&config.database.url));
                output::print_kv("Storage root", &config.storage.root_path);
                output::print_kv("Log level", &config.logging.level);
            }
            Err(e) => {
                output::print_error(&format!("Configuration invalid: {}", e));
                return Err(e);
            }
        },
    }

    Ok(())
}
