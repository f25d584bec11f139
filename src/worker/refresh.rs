use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{info, warn};

use crate::app::RadarError;
use crate::domain::{window, RefreshWindow};
use crate::repository::SyncRepository;
use crate::store::Store;
use crate::worker::{Job, JobOutcome};

pub const REFRESH_JOB_NAME: &str = "neo-refresh";

/// How a refresh cycle evicts the previous window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshMode {
    /// Delete and repopulate in one transaction; a failed fetch keeps the old cache.
    #[default]
    Atomic,
    /// Delete first, then fetch and upsert. A failed fetch leaves the cache empty.
    ClearThenFetch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    pub window: RefreshWindow,
    pub stored: usize,
}

/// Any failure inside a cycle. The job never gives up on its own.
#[derive(Debug, thiserror::Error)]
#[error("refresh cycle failed: {source}")]
pub struct RetryableError {
    #[from]
    pub source: RadarError,
}

pub struct RefreshJob<S> {
    repository: Arc<SyncRepository<S>>,
    api_key: String,
    mode: RefreshMode,
    today: fn() -> NaiveDate,
}

impl<S: Store + Send + Sync + 'static> RefreshJob<S> {
    pub fn new(repository: Arc<SyncRepository<S>>, api_key: String, mode: RefreshMode) -> Self {
        Self {
            repository,
            api_key,
            mode,
            today: window::today,
        }
    }

    pub fn with_clock(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn window(&self) -> RefreshWindow {
        RefreshWindow::week_from((self.today)())
    }

    pub async fn run_cycle(&self) -> Result<RefreshReport, RetryableError> {
        let window = self.window();
        let (start, end) = (window.start.as_str(), window.end.as_str());

        let stored = match self.mode {
            RefreshMode::Atomic => {
                self.repository
                    .replace_window(start, end, &self.api_key)
                    .await?
            }
            RefreshMode::ClearThenFetch => {
                self.repository
                    .clear_and_refresh(start, end, &self.api_key)
                    .await?
            }
        };

        Ok(RefreshReport { window, stored })
    }
}

#[async_trait]
impl<S: Store + Send + Sync + 'static> Job for RefreshJob<S> {
    fn name(&self) -> &str {
        REFRESH_JOB_NAME
    }

    async fn run(&self) -> JobOutcome {
        match self.run_cycle().await {
            Ok(report) => {
                info!(
                    "Refreshed {}..{}: {} asteroids",
                    report.window.start, report.window.end, report.stored
                );
                JobOutcome::Success
            }
            Err(e) => {
                warn!("Refresh failed, asking for retry: {}", e);
                JobOutcome::Retry
            }
        }
    }
}
