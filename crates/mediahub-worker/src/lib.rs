//! Background execution engines for MediaHub.
//!
//! This crate provides:
//! - A bounded worker pool: a fixed number of workers draining a
//!   fixed-capacity queue, sharing one cancellation token
//! - A cron scheduler for periodic maintenance with a time-boxed stop

pub mod pool;
pub mod scheduler;

pub use pool::{PoolError, Task, WorkerPool};
pub use scheduler::{CronScheduler, StopOutcome};
