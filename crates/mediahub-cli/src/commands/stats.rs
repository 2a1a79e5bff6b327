//! Remote media cache statistics.

use serde::Serialize;
use tabled::Tabled;

use mediahub_core::error::AppError;
use mediahub_database::AttachmentRepository;
use mediahub_database::repositories::PgAttachmentRepository;

use crate::output::{self, OutputFormat};

/// One row of the stats table
#[derive(Debug, Serialize, Tabled)]
struct CacheRow {
    #[tabled(rename = "Remote attachments")]
    total: u64,
    #[tabled(rename = "Cached")]
    cached: u64,
    #[tabled(rename = "Uncached")]
    uncached: u64,
    #[tabled(rename = "Max age (days)")]
    max_age_days: String,
}

/// Print counts of cached and uncached remote attachments
pub async fn execute(env: &str, format: OutputFormat) -> Result<(), AppError> {
    let config = super::load_config(env)?;
    let db = super::connect(&config).await?;

    let repo = PgAttachmentRepository::new(db.pool().clone());
    let stats = repo.remote_cache_stats().await;
    db.close().await;
    let stats = stats?;

    let max_age_days = if config.media.remote_cache_enabled() {
        config.media.remote_cache_days.to_string()
    } else {
        "disabled".to_string()
    };

    output::print_rows(
        &[CacheRow {
            total: stats.cached + stats.uncached,
            cached: stats.cached,
            uncached: stats.uncached,
            max_age_days,
        }],
        format,
    );
    Ok(())
}
