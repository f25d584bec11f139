//! Background refresh work.
//!
//! - [`Job`]: a unit of work the scheduler can run
//! - [`RefreshJob`](refresh::RefreshJob): one clear + repopulate cycle
//! - [`SyncScheduler`](scheduler::SyncScheduler): periodic, constraint-gated,
//!   unique-by-name execution with retry backoff

pub mod refresh;
pub mod scheduler;

use async_trait::async_trait;

pub use refresh::{RefreshJob, RefreshMode, RefreshReport, RetryableError, REFRESH_JOB_NAME};
pub use scheduler::{
    Constraints, DeviceMonitor, DeviceState, ExistingPolicy, PeriodicRequest, RetryPolicy,
    StaticDevice, SyncScheduler,
};

/// What a job run tells the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Success,
    /// Run again after the scheduler's backoff.
    Retry,
    /// Do not retry this period.
    Failure,
}

#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self) -> JobOutcome;
}
