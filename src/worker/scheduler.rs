//! In-process periodic job scheduler.
//!
//! Each named job gets a single tokio task, so at most one instance of a
//! name ever runs. Period ticks that land while a run is in flight are
//! skipped rather than queued. Runs only start while the device satisfies
//! the request's [`Constraints`], and a run is cancelled if they stop
//! holding. `Retry` outcomes are re-run after an exponential backoff until
//! the retry limit is hit, then the job waits for its next period.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};
use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::worker::{Job, JobOutcome};

/// Conditions that must hold before a run starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Constraints {
    pub unmetered_network: bool,
    pub charging: bool,
    pub battery_not_low: bool,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            unmetered_network: true,
            charging: true,
            battery_not_low: true,
        }
    }
}

impl Constraints {
    pub fn none() -> Self {
        Self {
            unmetered_network: false,
            charging: false,
            battery_not_low: false,
        }
    }

    pub fn satisfied_by(&self, state: &DeviceState) -> bool {
        (!self.unmetered_network || state.unmetered_network)
            && (!self.charging || state.charging)
            && (!self.battery_not_low || !state.battery_low)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeviceState {
    pub unmetered_network: bool,
    pub charging: bool,
    pub battery_low: bool,
}

impl Default for DeviceState {
    /// A plugged-in machine on a wired/Wi-Fi connection.
    fn default() -> Self {
        Self {
            unmetered_network: true,
            charging: true,
            battery_low: false,
        }
    }
}

pub trait DeviceMonitor: Send + Sync {
    fn current(&self) -> DeviceState;
}

/// Reports a fixed state, typically taken from the config file.
pub struct StaticDevice(pub DeviceState);

impl DeviceMonitor for StaticDevice {
    fn current(&self) -> DeviceState {
        self.0
    }
}

/// Exponential backoff applied between `Retry` outcomes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub max_retries: usize,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(3600),
            max_retries: 5,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    fn backoff(&self) -> impl Iterator<Item = Duration> {
        let builder = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries);
        let builder = if self.jitter {
            builder.with_jitter()
        } else {
            builder
        };
        builder.build()
    }
}

#[derive(Debug, Clone)]
pub struct PeriodicRequest {
    pub interval: Duration,
    pub constraints: Constraints,
    pub retry: RetryPolicy,
    /// How often constraints are re-checked while waiting or running.
    pub constraint_poll: Duration,
    /// Run as soon as scheduled instead of after the first period.
    pub run_immediately: bool,
}

impl PeriodicRequest {
    pub fn daily() -> Self {
        Self {
            interval: Duration::from_secs(86400),
            constraints: Constraints::default(),
            retry: RetryPolicy::default(),
            constraint_poll: Duration::from_secs(60),
            run_immediately: true,
        }
    }
}

/// What to do when a job with the same name is already scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingPolicy {
    Keep,
    Replace,
}

pub struct SyncScheduler {
    device: Arc<dyn DeviceMonitor>,
    jobs: Mutex<HashMap<String, JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
}

impl SyncScheduler {
    pub fn new(device: Arc<dyn DeviceMonitor>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            device,
            jobs: Mutex::new(HashMap::new()),
            shutdown,
        }
    }

    /// Schedule `job` under its name. Returns `false` if an existing
    /// schedule was kept.
    pub fn enqueue_unique_periodic(
        &self,
        job: Arc<dyn Job>,
        request: PeriodicRequest,
        policy: ExistingPolicy,
    ) -> bool {
        let name = job.name().to_string();
        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(existing) = jobs.get(&name) {
            if !existing.is_finished() {
                match policy {
                    ExistingPolicy::Keep => {
                        debug!("Job {} already scheduled, keeping existing", name);
                        return false;
                    }
                    ExistingPolicy::Replace => {
                        info!("Replacing scheduled job {}", name);
                        existing.abort();
                    }
                }
            }
        }

        let device = self.device.clone();
        let shutdown = self.shutdown.subscribe();
        let handle = tokio::spawn(run_periodic(job, request, device, shutdown));
        jobs.insert(name, handle);
        true
    }

    pub fn is_scheduled(&self, name: &str) -> bool {
        let jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        jobs.get(name).is_some_and(|h| !h.is_finished())
    }

    pub fn cancel(&self, name: &str) -> bool {
        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        match jobs.remove(name) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Stop every job, cancelling any run in flight, and wait for the tasks to end.
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);

        let handles: Vec<_> = {
            let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
            jobs.drain().map(|(_, h)| h).collect()
        };

        for handle in handles {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    error!("Scheduled job panicked: {}", e);
                }
            }
        }
    }
}

async fn run_periodic(
    job: Arc<dyn Job>,
    request: PeriodicRequest,
    device: Arc<dyn DeviceMonitor>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut timer = interval(request.interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    if !request.run_immediately {
        // The first tick completes immediately.
        timer.tick().await;
    }

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            _ = timer.tick() => {}
            _ = shutdown.changed() => break,
        }

        match run_with_retry(job.as_ref(), &request, device.as_ref(), &mut shutdown).await {
            Some(outcome) => debug!("Job {} finished period with {:?}", job.name(), outcome),
            None => break,
        }
    }

    debug!("Job {} stopped", job.name());
}

/// One scheduled period: run, retrying with backoff. `None` means shutdown.
async fn run_with_retry(
    job: &dyn Job,
    request: &PeriodicRequest,
    device: &dyn DeviceMonitor,
    shutdown: &mut watch::Receiver<bool>,
) -> Option<JobOutcome> {
    let mut backoff = request.retry.backoff();

    loop {
        if !wait_for_constraints(job, request, device, shutdown).await {
            return None;
        }

        info!("Running job {}", job.name());
        let outcome = tokio::select! {
            outcome = job.run() => outcome,
            _ = constraints_lost(request, device) => {
                warn!("Constraints no longer met, cancelling job {}", job.name());
                JobOutcome::Retry
            }
            _ = shutdown.changed() => {
                info!("Shutdown requested, cancelling job {}", job.name());
                return None;
            }
        };

        match outcome {
            JobOutcome::Success => return Some(outcome),
            JobOutcome::Failure => {
                error!("Job {} failed", job.name());
                return Some(outcome);
            }
            JobOutcome::Retry => match backoff.next() {
                Some(delay) => {
                    warn!("Job {} will retry in {:?}", job.name(), delay);
                    tokio::select! {
                        _ = sleep(delay) => {}
                        _ = shutdown.changed() => return None,
                    }
                }
                None => {
                    error!(
                        "Job {} exhausted {} retries, waiting for next period",
                        job.name(),
                        request.retry.max_retries
                    );
                    return Some(outcome);
                }
            },
        }
    }
}

/// Wait until the constraints hold. `false` means shutdown.
async fn wait_for_constraints(
    job: &dyn Job,
    request: &PeriodicRequest,
    device: &dyn DeviceMonitor,
    shutdown: &mut watch::Receiver<bool>,
) -> bool {
    let mut logged = false;

    while !request.constraints.satisfied_by(&device.current()) {
        if !logged {
            info!("Job {} waiting for constraints", job.name());
            logged = true;
        }
        tokio::select! {
            _ = sleep(request.constraint_poll) => {}
            _ = shutdown.changed() => return false,
        }
    }

    !*shutdown.borrow()
}

async fn constraints_lost(request: &PeriodicRequest, device: &dyn DeviceMonitor) {
    loop {
        sleep(request.constraint_poll).await;
        if !request.constraints.satisfied_by(&device.current()) {
            return;
        }
    }
}
