//! Cron scheduler for periodic maintenance tasks.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use tokio::sync::Semaphore;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use mediahub_core::error::{AppError, ErrorKind};
use mediahub_core::result::AppResult;

/// How a scheduler stop concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Every in-flight run finished within the grace period.
    Graceful,
    /// The grace period elapsed with a run still in flight.
    Forced,
}

/// Cron-based scheduler for periodic background tasks.
///
/// Every run is tracked so that [`CronScheduler::stop`] can wait for
/// in-flight work, bounded by the grace period given at construction.
pub struct CronScheduler {
    /// The underlying job scheduler
    scheduler: JobScheduler,
    /// Tracks in-flight runs across all registered jobs
    tracker: TaskTracker,
    /// How long `stop` waits for in-flight runs
    grace: Duration,
}

impl std::fmt::Debug for CronScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronScheduler")
            .field("in_flight", &self.tracker.len())
            .field("grace", &self.grace)
            .finish()
    }
}

impl CronScheduler {
    /// Create a new cron scheduler.
    pub async fn new(grace: Duration) -> AppResult<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self {
            scheduler,
            tracker: TaskTracker::new(),
            grace,
        })
    }

    /// Register `run` to fire on the six-field cron `schedule`, evaluated in
    /// local time. A tick that arrives while the previous run of the same job
    /// is still going is skipped.
    pub async fn register<F, Fut>(&self, name: &str, schedule: &str, run: F) -> AppResult<Uuid>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let run = Arc::new(run);
        let tracker = self.tracker.clone();
        let in_flight = Arc::new(Semaphore::new(1));
        let label = name.to_string();

        let job = CronJob::new_async_tz(schedule, Local, move |_uuid, _lock| {
            let run = Arc::clone(&run);
            let tracker = tracker.clone();
            let in_flight = Arc::clone(&in_flight);
            let label = label.clone();
            Box::pin(async move {
                let Ok(_permit) = in_flight.try_acquire_owned() else {
                    tracing::warn!(job = %label, "Previous run still in progress, skipping tick");
                    return;
                };
                tracing::debug!(job = %label, "Scheduled run starting");
                tracker.track_future(run()).await;
                tracing::debug!(job = %label, "Scheduled run finished");
            })
        })
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Configuration,
                format!("Invalid schedule '{}' for {}", schedule, name),
                e,
            )
        })?;

        let id = self
            .scheduler
            .add(job)
            .await
            .map_err(|e| AppError::internal(format!("Failed to add {} schedule: {}", name, e)))?;

        tracing::info!("Registered: {} ({})", name, schedule);
        Ok(id)
    }

    /// Start firing registered jobs.
    pub async fn start(&self) -> AppResult<()> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {}", e)))?;

        tracing::info!("Cron scheduler started");
        Ok(())
    }

    /// Next time the given job is due, if the scheduler knows one.
    pub async fn next_run(&self, id: Uuid) -> Option<DateTime<Utc>> {
        let mut scheduler = self.scheduler.clone();
        match scheduler.next_tick_for_job(id).await {
            Ok(next) => next,
            Err(e) => {
                tracing::debug!("Could not compute next tick for {}: {}", id, e);
                None
            }
        }
    }

    /// Number of runs currently in flight.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Stop firing new runs and wait up to the grace period for in-flight
    /// runs to finish. A run still going after the grace period is left to
    /// observe its own cancellation.
    pub async fn stop(&self) -> StopOutcome {
        let mut scheduler = self.scheduler.clone();
        if let Err(e) = scheduler.shutdown().await {
            tracing::warn!("Cron scheduler shutdown reported an error: {}", e);
        }

        self.tracker.close();
        match tokio::time::timeout(self.grace, self.tracker.wait()).await {
            Ok(()) => {
                tracing::info!("Cron scheduler shut down");
                StopOutcome::Graceful
            }
            Err(_) => {
                tracing::warn!(
                    grace_secs = self.grace.as_secs(),
                    in_flight = self.tracker.len(),
                    "Cron scheduler didn't stop within grace period, forcing"
                );
                StopOutcome::Forced
            }
        }
    }
}
