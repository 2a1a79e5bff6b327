//! The media manager: submission, introspection, pruning, and shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Local;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use mediahub_core::config::MediaConfig;
use mediahub_core::error::AppError;
use mediahub_core::result::AppResult;
use mediahub_core::types::{AccountId, AttachmentId, EmojiId};
use mediahub_worker::{CronScheduler, StopOutcome, Task, WorkerPool};

use crate::context::MediaContext;
use crate::job::MediaJob;
use crate::processing::{ProcessingEmoji, ProcessingMedia};
use crate::prune::prune_remote;
use crate::types::{AdditionalEmojiInfo, AdditionalMediaInfo, DataFn, PostDataFn};

const PRUNE_JOB: &str = "remote_cache_prune";

/// Worker pool dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSizing {
    pub workers: usize,
    pub queue_capacity: usize,
}

impl PoolSizing {
    /// Half the available parallelism, at least one worker.
    pub fn from_parallelism(parallelism: usize) -> Self {
        Self::with_workers(parallelism / 2)
    }

    /// A fixed worker count, at least one. The queue holds ten per worker.
    pub fn with_workers(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            workers,
            queue_capacity: workers * 10,
        }
    }

    /// Sizing from config, falling back to the machine's parallelism.
    pub fn for_config(config: &MediaConfig) -> Self {
        match config.worker_count {
            Some(workers) => Self::with_workers(workers),
            None => Self::from_parallelism(
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1),
            ),
        }
    }
}

/// The scheduled prune job and the token its runs observe.
#[derive(Debug)]
struct Pruning {
    scheduler: CronScheduler,
    cancel: CancellationToken,
}

/// Accepts media and emoji for background processing and keeps the remote
/// media cache within its configured age.
#[derive(Debug)]
pub struct MediaManager {
    ctx: MediaContext,
    pool: WorkerPool<MediaJob>,
    pruning: Option<Pruning>,
    prune_batch_size: usize,
    stopped: AtomicBool,
}

impl MediaManager {
    /// Start the worker pool and, unless `remote_cache_days` is zero, the
    /// nightly prune job.
    pub async fn new(ctx: MediaContext, config: &MediaConfig) -> AppResult<Self> {
        let sizing = PoolSizing::for_config(config);
        let pool = WorkerPool::new(sizing.workers, sizing.queue_capacity);
        if !pool.start().await {
            return Err(AppError::internal("Could not start media worker pool"));
        }

        let pruning = if config.remote_cache_enabled() {
            match schedule_pruning(&ctx, config).await {
                Ok(pruning) => Some(pruning),
                Err(e) => {
                    pool.stop().await;
                    return Err(e);
                }
            }
        } else {
            tracing::info!("Remote cache pruning disabled");
            None
        };

        tracing::info!(
            workers = sizing.workers,
            queue_capacity = sizing.queue_capacity,
            "Media manager started"
        );

        Ok(Self {
            ctx,
            pool,
            pruning,
            prune_batch_size: config.prune_batch_size,
            stopped: AtomicBool::new(false),
        })
    }

    /// Accept new media owned by `account_id`. The returned handle is already
    /// queued for loading.
    pub async fn process_media(
        &self,
        data: DataFn,
        post_data: Option<PostDataFn>,
        account_id: AccountId,
        info: Option<AdditionalMediaInfo>,
    ) -> AppResult<Arc<ProcessingMedia>> {
        let handle =
            Arc::new(ProcessingMedia::prepare(&self.ctx, data, post_data, account_id, info).await?);
        self.submit(MediaJob::Media(Arc::clone(&handle))).await?;
        Ok(handle)
    }

    /// Accept a new or refreshed emoji.
    pub async fn process_emoji(
        &self,
        data: DataFn,
        post_data: Option<PostDataFn>,
        shortcode: &str,
        emoji_id: EmojiId,
        uri: &str,
        info: Option<AdditionalEmojiInfo>,
    ) -> AppResult<Arc<ProcessingEmoji>> {
        let handle = Arc::new(
            ProcessingEmoji::prepare(&self.ctx, data, post_data, shortcode, emoji_id, uri, info)
                .await?,
        );
        self.submit(MediaJob::Emoji(Arc::clone(&handle))).await?;
        Ok(handle)
    }

    /// Fetch the blobs of an existing attachment again, e.g. after a prune.
    pub async fn recache_media(
        &self,
        data: DataFn,
        post_data: Option<PostDataFn>,
        attachment_id: AttachmentId,
    ) -> AppResult<Arc<ProcessingMedia>> {
        let handle = Arc::new(
            ProcessingMedia::prepare_recache(&self.ctx, data, post_data, attachment_id).await?,
        );
        self.submit(MediaJob::Media(Arc::clone(&handle))).await?;
        Ok(handle)
    }

    /// Run one prune pass now with the caller's token.
    pub async fn prune_remote(
        &self,
        older_than_days: u32,
        cancel: &CancellationToken,
    ) -> AppResult<usize> {
        let report = prune_remote(&self.ctx, older_than_days, self.prune_batch_size, cancel).await?;
        Ok(report.pruned)
    }

    /// Configured number of workers.
    pub fn num_workers(&self) -> usize {
        self.pool.workers()
    }

    /// Configured queue capacity.
    pub fn queue_size(&self) -> usize {
        self.pool.capacity()
    }

    /// Jobs accepted but not yet picked up.
    pub fn jobs_queued(&self) -> usize {
        self.pool.queued()
    }

    /// Workers currently loading a handle.
    pub fn active_workers(&self) -> usize {
        self.pool.active()
    }

    /// Stop the worker pool, then the prune scheduler.
    ///
    /// Blocks until every worker has exited. Queued jobs that had not started
    /// are abandoned and their handles fail as cancelled. The scheduler gets
    /// its grace period to finish an in-flight prune, after which the prune
    /// token is cancelled regardless. Only a pool that fails to stop is an
    /// error.
    pub async fn stop(&self) -> AppResult<()> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            tracing::warn!("Media manager already stopped");
            return Ok(());
        }

        tracing::info!(
            queued = self.jobs_queued(),
            active = self.active_workers(),
            "Stopping media manager"
        );
        let pool_stopped = self.pool.stop().await;

        if let Some(pruning) = &self.pruning {
            let in_flight = pruning.scheduler.in_flight();
            if in_flight > 0 {
                tracing::info!(in_flight, "Waiting for remote cache prune to finish");
            }
            if pruning.scheduler.stop().await == StopOutcome::Forced {
                tracing::warn!("Remote cache prune still running, cancelling it");
            }
            pruning.cancel.cancel();
        }

        if !pool_stopped {
            return Err(AppError::internal("Media worker pool did not stop cleanly"));
        }

        tracing::info!("Media manager stopped");
        Ok(())
    }

    async fn submit(&self, job: MediaJob) -> AppResult<()> {
        let fallback = job.clone();
        match self.pool.enqueue(job).await {
            Ok(()) => {
                tracing::trace!(
                    job = %fallback.describe(),
                    queued = self.jobs_queued(),
                    "Job queued"
                );
                Ok(())
            }
            Err(e) => {
                fallback.abandon();
                Err(AppError::service_unavailable(format!(
                    "Media manager is not accepting work: {}",
                    e
                )))
            }
        }
    }
}

async fn schedule_pruning(ctx: &MediaContext, config: &MediaConfig) -> AppResult<Pruning> {
    let cancel = CancellationToken::new();
    match register_pruning(ctx, config, cancel.clone()).await {
        Ok(scheduler) => Ok(Pruning { scheduler, cancel }),
        Err(e) => {
            cancel.cancel();
            Err(AppError::new(
                e.kind,
                format!("Error scheduling remote cache pruning: {}", e.message),
            ))
        }
    }
}

async fn register_pruning(
    ctx: &MediaContext,
    config: &MediaConfig,
    cancel: CancellationToken,
) -> AppResult<CronScheduler> {
    let scheduler = CronScheduler::new(Duration::from_secs(config.prune_grace_seconds)).await?;

    let days = config.remote_cache_days;
    let batch_size = config.prune_batch_size;
    let job_ctx = ctx.clone();
    let id: Uuid = scheduler
        .register(PRUNE_JOB, &config.prune_schedule, move || {
            let ctx = job_ctx.clone();
            let cancel = cancel.clone();
            async move {
                match prune_remote(&ctx, days, batch_size, &cancel).await {
                    Ok(report) => tracing::info!(
                        pruned = report.pruned,
                        cancelled = report.cancelled,
                        elapsed_ms = report.elapsed.as_millis() as u64,
                        finished_at = %report.finished_at,
                        "Pruned remote media cache"
                    ),
                    Err(e) => tracing::error!("Error pruning remote media cache: {}", e),
                }
            }
        })
        .await?;

    scheduler.start().await?;

    match scheduler.next_run(id).await {
        Some(next) => tracing::info!(
            older_than_days = days,
            next_run = %next.with_timezone(&Local),
            "Remote cache pruning scheduled"
        ),
        None => tracing::info!(older_than_days = days, "Remote cache pruning scheduled"),
    }
    Ok(scheduler)
}
