use std::path::PathBuf;
use std::sync::Arc;

use crate::app::error::{RadarError, Result};
use crate::config::Config;
use crate::fetcher::{HttpFeedClient, RemoteFeedClient};
use crate::repository::SyncRepository;
use crate::store::sqlite::SqliteStore;
use crate::worker::{RefreshJob, StaticDevice, SyncScheduler};

/// Process-wide wiring. The store handle is opened once here and shared.
pub struct AppContext {
    pub config: Config,
    pub store: Arc<SqliteStore>,
    pub repository: Arc<SyncRepository<SqliteStore>>,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let db_path = match config.storage.db_path.clone() {
            Some(p) => p,
            None => Self::default_db_path()?,
        };

        let store = Arc::new(SqliteStore::new(&db_path)?);
        Self::with_store(config, store)
    }

    pub fn in_memory(config: Config) -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory()?);
        Self::with_store(config, store)
    }

    fn with_store(config: Config, store: Arc<SqliteStore>) -> Result<Self> {
        let client: Arc<dyn RemoteFeedClient + Send + Sync> = Arc::new(HttpFeedClient::new(
            &config.api.base_url,
            config.api.timeout(),
        )?);
        let repository = Arc::new(SyncRepository::new(store.clone(), client));

        Ok(Self {
            config,
            store,
            repository,
        })
    }

    pub fn api_key(&self) -> &str {
        &self.config.api.key
    }

    pub fn refresh_job(&self) -> RefreshJob<SqliteStore> {
        RefreshJob::new(
            self.repository.clone(),
            self.config.api.key.clone(),
            self.config.scheduler.refresh_mode,
        )
    }

    pub fn scheduler(&self) -> SyncScheduler {
        SyncScheduler::new(Arc::new(StaticDevice(self.config.scheduler.device)))
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| RadarError::Config("Could not find data directory".into()))?;
        let radar_dir = data_dir.join("neoradar");
        std::fs::create_dir_all(&radar_dir)?;
        Ok(radar_dir.join("neoradar.db"))
    }
}
