//! Eviction of locally cached remote media.
//!
//! Remote attachments older than the cache window lose their stored blobs
//! and have `cached` cleared. The record, including `remote_url`, stays so
//! the media can be recached on demand.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use mediahub_core::result::AppResult;
use mediahub_entity::MediaAttachment;

use crate::context::MediaContext;

/// Outcome of one prune pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PruneReport {
    /// Attachments uncached during this pass.
    pub pruned: usize,
    /// Whether the pass stopped early on cancellation.
    pub cancelled: bool,
    /// Wall-clock time the pass took.
    pub elapsed: Duration,
    /// When the pass ended.
    pub finished_at: DateTime<Utc>,
}

/// Uncache every cached remote attachment created more than
/// `older_than_days` days ago, scanning `batch_size` records at a time.
///
/// Cancellation is checked before each page and each record; a cancelled pass
/// returns what it pruned so far rather than an error.
pub async fn prune_remote(
    ctx: &MediaContext,
    older_than_days: u32,
    batch_size: usize,
    cancel: &CancellationToken,
) -> AppResult<PruneReport> {
    let started = Instant::now();
    let cutoff = Utc::now() - chrono::Duration::days(i64::from(older_than_days));
    let batch_size = batch_size.max(1);
    let mut pruned = 0;
    let mut cancelled = false;

    tracing::debug!(cutoff = %cutoff, batch_size, "Pruning remote media cache");

    'scan: loop {
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }

        let page = ctx
            .attachments
            .find_cached_remote_older_than(cutoff, batch_size)
            .await?;
        let last_page = page.len() < batch_size;

        for attachment in page {
            if cancel.is_cancelled() {
                cancelled = true;
                break 'scan;
            }
            uncache(ctx, attachment).await?;
            pruned += 1;
        }

        if last_page {
            break;
        }
    }

    let report = PruneReport {
        pruned,
        cancelled,
        elapsed: started.elapsed(),
        finished_at: Utc::now(),
    };
    if cancelled {
        tracing::info!(pruned, "Remote media prune cancelled");
    }
    Ok(report)
}

async fn uncache(ctx: &MediaContext, mut attachment: MediaAttachment) -> AppResult<()> {
    for path in attachment.blob_paths() {
        ctx.storage.delete(path).await?;
    }

    attachment.cached = false;
    attachment.updated_at = Utc::now();
    ctx.attachments.update(&attachment).await?;

    tracing::trace!(attachment_id = %attachment.id, "Uncached remote attachment");
    Ok(())
}
