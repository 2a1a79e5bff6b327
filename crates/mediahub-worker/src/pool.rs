//! Bounded worker pool.
//!
//! `workers` tasks pull from one queue holding at most `capacity` pending
//! units of work. Every unit is handed the pool-wide cancellation token.
//! Stopping cancels that token, closes the queue, and waits for every worker
//! to drain what was already accepted: units dequeued after the stop began
//! see a cancelled token and are expected to return without doing work.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A unit of work accepted by a [`WorkerPool`].
#[async_trait]
pub trait Task: Send + 'static {
    /// Short label used in logs.
    fn describe(&self) -> String;

    /// Execute the unit. `cancel` is the pool-wide token.
    async fn run(self, cancel: CancellationToken);
}

/// Errors returned when submitting to a pool.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// The pool was never started, or has been stopped.
    #[error("worker pool is not running")]
    NotRunning,

    /// The queue closed while waiting for a free slot.
    #[error("worker pool queue closed")]
    Closed,
}

enum Lifecycle<T> {
    Idle,
    Running {
        tx: mpsc::Sender<T>,
        workers: Vec<JoinHandle<()>>,
    },
    Stopped,
}

/// Fixed-size pool of async workers draining a bounded queue.
pub struct WorkerPool<T: Task> {
    workers: usize,
    capacity: usize,
    queued: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    cancel: CancellationToken,
    lifecycle: Mutex<Lifecycle<T>>,
}

impl<T: Task> std::fmt::Debug for WorkerPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers)
            .field("capacity", &self.capacity)
            .field("queued", &self.queued())
            .field("active", &self.active())
            .finish()
    }
}

impl<T: Task> WorkerPool<T> {
    /// Create a pool. Both sizes are clamped to at least one.
    pub fn new(workers: usize, capacity: usize) -> Self {
        Self {
            workers: workers.max(1),
            capacity: capacity.max(1),
            queued: Arc::new(AtomicUsize::new(0)),
            active: Arc::new(AtomicUsize::new(0)),
            cancel: CancellationToken::new(),
            lifecycle: Mutex::new(Lifecycle::Idle),
        }
    }

    /// Spawn the workers. Returns `false` if the pool was already started
    /// or has been stopped.
    pub async fn start(&self) -> bool {
        let mut lifecycle = self.lifecycle.lock().await;
        if !matches!(*lifecycle, Lifecycle::Idle) {
            return false;
        }

        let (tx, rx) = mpsc::channel(self.capacity);
        let rx = Arc::new(Mutex::new(rx));
        let workers = (0..self.workers)
            .map(|id| {
                tokio::spawn(work(
                    id,
                    Arc::clone(&rx),
                    Arc::clone(&self.queued),
                    Arc::clone(&self.active),
                    self.cancel.clone(),
                ))
            })
            .collect();

        *lifecycle = Lifecycle::Running { tx, workers };
        tracing::debug!(
            workers = self.workers,
            capacity = self.capacity,
            "Worker pool started"
        );
        true
    }

    /// Submit a unit of work, waiting for a free queue slot if the queue is
    /// full.
    pub async fn enqueue(&self, task: T) -> Result<(), PoolError> {
        let tx = match &*self.lifecycle.lock().await {
            Lifecycle::Running { tx, .. } => tx.clone(),
            _ => return Err(PoolError::NotRunning),
        };

        // Count before the send so a worker can never dequeue an uncounted unit.
        let permit = tx.reserve().await.map_err(|_| PoolError::Closed)?;
        self.queued.fetch_add(1, Ordering::SeqCst);
        permit.send(task);
        Ok(())
    }

    /// Cancel the pool-wide token, close the queue, and wait for every
    /// worker to exit. Returns `false` if the pool was not running or a
    /// worker could not be joined.
    pub async fn stop(&self) -> bool {
        let workers = {
            let mut lifecycle = self.lifecycle.lock().await;
            match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
                Lifecycle::Running { tx, workers } => {
                    self.cancel.cancel();
                    drop(tx);
                    workers
                }
                Lifecycle::Idle | Lifecycle::Stopped => return false,
            }
        };

        let mut clean = true;
        for (id, handle) in workers.into_iter().enumerate() {
            if let Err(e) = handle.await {
                tracing::error!(worker = id, "Worker did not shut down cleanly: {}", e);
                clean = false;
            }
        }

        tracing::debug!("Worker pool stopped");
        clean
    }

    /// Configured number of workers.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Configured queue capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Units accepted but not yet picked up by a worker.
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    /// Workers currently running a unit.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Whether the pool-wide token has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

async fn work<T: Task>(
    id: usize,
    rx: Arc<Mutex<mpsc::Receiver<T>>>,
    queued: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    cancel: CancellationToken,
) {
    tracing::trace!(worker = id, "Worker started");

    loop {
        // Hold the receiver lock only while waiting for the next unit.
        let next = rx.lock().await.recv().await;
        let Some(task) = next else {
            break;
        };

        queued.fetch_sub(1, Ordering::SeqCst);
        active.fetch_add(1, Ordering::SeqCst);

        let label = task.describe();
        tracing::trace!(worker = id, task = %label, "Running task");
        let outcome = AssertUnwindSafe(task.run(cancel.clone()))
            .catch_unwind()
            .await;

        active.fetch_sub(1, Ordering::SeqCst);
        if outcome.is_err() {
            tracing::error!(worker = id, task = %label, "Task panicked");
        }
    }

    tracing::trace!(worker = id, "Worker exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    #[derive(Clone, Default)]
    struct Counters {
        ran: Arc<AtomicUsize>,
        skipped: Arc<AtomicUsize>,
    }

    struct Probe {
        counters: Counters,
        gate: Option<Arc<Semaphore>>,
        panic: bool,
    }

    impl Probe {
        fn new(counters: &Counters) -> Self {
            Self {
                counters: counters.clone(),
                gate: None,
                panic: false,
            }
        }

        fn gated(counters: &Counters, gate: &Arc<Semaphore>) -> Self {
            Self {
                gate: Some(Arc::clone(gate)),
                ..Self::new(counters)
            }
        }
    }

    #[async_trait]
    impl Task for Probe {
        fn describe(&self) -> String {
            "probe".to_string()
        }

        async fn run(self, cancel: CancellationToken) {
            if cancel.is_cancelled() {
                self.counters.skipped.fetch_add(1, Ordering::SeqCst);
                return;
            }
            if let Some(gate) = &self.gate {
                let _permit = gate.acquire().await.unwrap();
            }
            if self.panic {
                panic!("probe panicked");
            }
            self.counters.ran.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let pool: WorkerPool<Probe> = WorkerPool::new(2, 20);
        let counters = Counters::default();

        assert!(matches!(
            pool.enqueue(Probe::new(&counters)).await,
            Err(PoolError::NotRunning)
        ));
        assert!(!pool.stop().await);

        let pool: WorkerPool<Probe> = WorkerPool::new(2, 20);
        assert!(pool.start().await);
        assert!(!pool.start().await);
        assert!(pool.stop().await);
        assert!(!pool.stop().await);
        assert!(pool.is_cancelled());
        assert!(matches!(
            pool.enqueue(Probe::new(&counters)).await,
            Err(PoolError::NotRunning)
        ));
    }

    #[tokio::test]
    async fn test_sizes_clamped() {
        let pool: WorkerPool<Probe> = WorkerPool::new(0, 0);
        assert_eq!(pool.workers(), 1);
        assert_eq!(pool.capacity(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_runs_every_accepted_task() {
        let pool = WorkerPool::new(4, 40);
        assert!(pool.start().await);
        let counters = Counters::default();

        for _ in 0..40 {
            pool.enqueue(Probe::new(&counters)).await.unwrap();
        }

        let ran = Arc::clone(&counters.ran);
        wait_for(|| ran.load(Ordering::SeqCst) == 40).await;
        assert_eq!(pool.queued(), 0);
        assert!(pool.stop().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_introspection_tracks_queue_and_active() {
        let pool = WorkerPool::new(1, 10);
        assert!(pool.start().await);
        let counters = Counters::default();
        let gate = Arc::new(Semaphore::new(0));

        pool.enqueue(Probe::gated(&counters, &gate)).await.unwrap();
        wait_for(|| pool.active() == 1).await;

        for _ in 0..3 {
            pool.enqueue(Probe::new(&counters)).await.unwrap();
        }
        assert_eq!(pool.queued(), 3);
        assert_eq!(pool.active(), 1);

        gate.add_permits(1);
        wait_for(|| pool.queued() == 0 && pool.active() == 0).await;
        assert_eq!(counters.ran.load(Ordering::SeqCst), 4);
        assert!(pool.stop().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_lets_running_task_finish_and_cancels_queued() {
        let pool = Arc::new(WorkerPool::new(1, 10));
        assert!(pool.start().await);
        let counters = Counters::default();
        let gate = Arc::new(Semaphore::new(0));

        pool.enqueue(Probe::gated(&counters, &gate)).await.unwrap();
        wait_for(|| pool.active() == 1).await;
        for _ in 0..3 {
            pool.enqueue(Probe::new(&counters)).await.unwrap();
        }

        let stopping = tokio::spawn({
            let pool = Arc::clone(&pool);
            async move { pool.stop().await }
        });

        wait_for(|| pool.is_cancelled()).await;
        assert!(!stopping.is_finished());

        gate.add_permits(1);
        assert!(stopping.await.unwrap());

        assert_eq!(counters.ran.load(Ordering::SeqCst), 1);
        assert_eq!(counters.skipped.load(Ordering::SeqCst), 3);
        assert_eq!(pool.queued(), 0);
        assert_eq!(pool.active(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_task_does_not_kill_worker() {
        let pool = WorkerPool::new(1, 10);
        assert!(pool.start().await);
        let counters = Counters::default();

        let mut bad = Probe::new(&counters);
        bad.panic = true;
        pool.enqueue(bad).await.unwrap();
        pool.enqueue(Probe::new(&counters)).await.unwrap();

        let ran = Arc::clone(&counters.ran);
        wait_for(|| ran.load(Ordering::SeqCst) == 1).await;
        assert_eq!(pool.active(), 0);
        assert!(pool.stop().await);
    }
}
