//! One-off remote media cache prune.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;
use tokio_util::sync::CancellationToken;

use mediahub_core::error::AppError;
use mediahub_media::prune_remote;

use crate::output::{self, OutputFormat};

/// Arguments for the prune command
#[derive(Debug, Args)]
pub struct PruneArgs {
    /// Prune remote media older than this many days (defaults to the
    /// configured remote cache age)
    #[arg(short, long)]
    pub days: Option<u32>,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Debug, Serialize, Tabled)]
struct PruneRow {
    #[tabled(rename = "Pruned")]
    pruned: usize,
    #[tabled(rename = "Cancelled")]
    cancelled: bool,
    #[tabled(rename = "Elapsed (ms)")]
    elapsed_ms: u128,
    #[tabled(rename = "Finished at")]
    finished_at: String,
}

/// Run a prune pass directly against the database and blob store
pub async fn execute(args: &PruneArgs, env: &str, format: OutputFormat) -> Result<(), AppError> {
    let config = super::load_config(env)?;
    let days = args.days.unwrap_or(config.media.remote_cache_days);
    if days == 0 {
        return Err(AppError::validation(
            "Remote cache pruning is disabled; pass --days to prune anyway",
        ));
    }

    if !args.yes {
        let confirm = dialoguer::Confirm::new()
            .with_prompt(format!(
                "Remove cached copies of remote media older than {} days?",
                days
            ))
            .default(false)
            .interact()
            .map_err(|e| AppError::internal(format!("Input error: {}", e)))?;

        if !confirm {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let db = super::connect(&config).await?;
    let ctx = super::media_context(&config, &db).await?;

    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                output::print_warning("Interrupted, finishing current record...");
                cancel.cancel();
            }
        }
    });

    let result = prune_remote(&ctx, days, config.media.prune_batch_size, &cancel).await;
    interrupt.abort();
    db.close().await;
    let report = result?;

    match format {
        OutputFormat::Table => {
            if report.cancelled {
                output::print_warning(&format!("Prune cancelled after {} attachments", report.pruned));
            } else {
                output::print_success(&format!("Pruned {} remote attachments", report.pruned));
            }
            output::print_kv("Older than", &format!("{} days", days));
            output::print_kv("Elapsed", &format!("{} ms", report.elapsed.as_millis()));
        }
        OutputFormat::Json => output::print_rows(
            &[PruneRow {
                pruned: report.pruned,
                cancelled: report.cancelled,
                elapsed_ms: report.elapsed.as_millis(),
                finished_at: report.finished_at.to_rfc3339(),
            }],
            format,
        ),
    }
    Ok(())
}
