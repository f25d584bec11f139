//! Configuration management for neoradar.
//!
//! Configuration is read from `~/.config/neoradar/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is created.
//! `NEORADAR_API_KEY` overrides `api.key`.

pub mod interval;

use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::fetcher::http_fetcher::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
use crate::worker::{Constraints, DeviceState, PeriodicRequest, RefreshMode, RetryPolicy};

pub use interval::{format_interval, parse_interval};

pub const API_KEY_ENV: &str = "NEORADAR_API_KEY";

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub key: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            key: "DEMO_KEY".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file. Defaults to the platform data directory.
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub interval: String,
    pub constraint_poll: String,
    pub run_on_start: bool,
    pub refresh_mode: RefreshMode,
    pub constraints: Constraints,
    /// The state reported to the scheduler; there is no hardware probing.
    pub device: DeviceState,
    pub retry: RetryConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: "1d".to_string(),
            constraint_poll: "1m".to_string(),
            run_on_start: true,
            refresh_mode: RefreshMode::default(),
            constraints: Constraints::default(),
            device: DeviceState::default(),
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub min_delay_secs: u64,
    pub max_delay_secs: u64,
    pub max_retries: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            min_delay_secs: policy.min_delay.as_secs(),
            max_delay_secs: policy.max_delay.as_secs(),
            max_retries: policy.max_retries,
        }
    }
}

impl SchedulerConfig {
    /// Build the periodic request for the refresh job.
    pub fn periodic_request(&self) -> Result<PeriodicRequest, ConfigError> {
        let interval = parse_interval(&self.interval).map_err(ConfigError::Invalid)?;
        let poll = parse_interval(&self.constraint_poll).map_err(ConfigError::Invalid)?;
        if interval == 0 || poll == 0 {
            return Err(ConfigError::Invalid(
                "scheduler intervals must be greater than zero".to_string(),
            ));
        }

        Ok(PeriodicRequest {
            interval: Duration::from_secs(interval),
            constraints: self.constraints,
            retry: RetryPolicy {
                min_delay: Duration::from_secs(self.retry.min_delay_secs),
                max_delay: Duration::from_secs(self.retry.max_delay_secs),
                max_retries: self.retry.max_retries,
                jitter: true,
            },
            constraint_poll: Duration::from_secs(poll),
            run_immediately: self.run_on_start,
        })
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// If the config file exists but is invalid, returns an error.
    /// Missing fields in the config file will use default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self, ConfigError> {
        let mut config = if config_path.exists() {
            let content = fs::read_to_string(config_path).map_err(|e| ConfigError::Io {
                path: config_path.to_path_buf(),
                source: e,
            })?;

            toml::from_str::<Config>(&content).map_err(|e| ConfigError::Parse {
                path: config_path.to_path_buf(),
                source: e,
            })?
        } else {
            Self::create_default_config(config_path)?;
            Self::default()
        };

        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                config.api.key = key.trim().to_string();
            }
        }

        Ok(config)
    }

    /// Get the default config file path: `~/.config/neoradar/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("neoradar").join("config.toml"))
    }

    /// Create a default config file with comments.
    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        r##"# neoradar configuration
#
# Intervals accept "90s", "30m", "6h", "1d" or a bare number of seconds.

[api]
# NASA API key; NEORADAR_API_KEY overrides this value
key = "DEMO_KEY"
base_url = "https://api.nasa.gov/"
timeout_secs = 10

[storage]
# db_path = "/path/to/neoradar.db"

[scheduler]
# How often the cache is refreshed
interval = "1d"
# How often constraints are re-checked while waiting or running
constraint_poll = "1m"
# Refresh as soon as the daemon starts
run_on_start = true
# "atomic": clear and repopulate in one transaction
# "clear_then_fetch": clear first; a failed fetch leaves the cache empty
refresh_mode = "atomic"

[scheduler.constraints]
# Conditions required before a refresh runs
unmetered_network = true
charging = true
battery_not_low = true

[scheduler.device]
# Reported device state checked against the constraints above
unmetered_network = true
charging = true
battery_low = false

[scheduler.retry]
min_delay_secs = 30
max_delay_secs = 3600
max_retries = 5
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
