//! Foreground daemon that keeps the asteroid cache fresh.
//!
//! A PID file ensures only one daemon, and therefore one refresh schedule,
//! runs per user.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use tracing::{info, warn};

use crate::app::{AppContext, RadarError, Result};
use crate::config::format_interval;
use crate::worker::{ExistingPolicy, REFRESH_JOB_NAME};

/// What a PID file says about the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    NotRunning,
    Running(u32),
    /// The file exists but names no live process.
    Stale,
}

impl std::fmt::Display for DaemonState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DaemonState::NotRunning => f.write_str("Daemon is not running"),
            DaemonState::Running(pid) => write!(f, "Daemon is running (PID: {})", pid),
            DaemonState::Stale => f.write_str("Daemon is not running (stale PID file)"),
        }
    }
}

pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$XDG_RUNTIME_DIR/neoradar/daemon.pid`, falling back to the cache dir.
    pub fn default_location() -> Result<Self> {
        dirs::runtime_dir()
            .or_else(dirs::cache_dir)
            .map(|d| Self::at(d.join("neoradar").join("daemon.pid")))
            .ok_or_else(|| RadarError::Config("Could not determine PID file path".into()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_pid(&self) -> Option<u32> {
        fs::read_to_string(&self.path).ok()?.trim().parse().ok()
    }

    pub fn state(&self) -> DaemonState {
        if !self.path.exists() {
            return DaemonState::NotRunning;
        }
        match self.read_pid() {
            Some(pid) if process_exists(pid) => DaemonState::Running(pid),
            _ => DaemonState::Stale,
        }
    }

    pub fn write_current(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, format!("{}\n", std::process::id()))?;
        Ok(())
    }

    pub fn remove(&self) {
        let _ = fs::remove_file(&self.path);
    }

    /// Send SIGTERM to the recorded daemon and drop the file.
    pub fn stop(&self) -> Result<u32> {
        let pid = match self.state() {
            DaemonState::Running(pid) => pid,
            DaemonState::NotRunning => {
                return Err(RadarError::Other("No daemon is running".into()));
            }
            DaemonState::Stale => {
                self.remove();
                return Err(RadarError::Other(
                    "No daemon is running (removed stale PID file)".into(),
                ));
            }
        };

        if !terminate(pid)? {
            return Err(RadarError::Other(format!(
                "Failed to stop daemon (PID {})",
                pid
            )));
        }
        self.remove();
        Ok(pid)
    }
}

#[cfg(unix)]
fn process_exists(pid: u32) -> bool {
    Command::new("kill")
        .args(["-0", &pid.to_string()])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(windows)]
fn process_exists(pid: u32) -> bool {
    Command::new("tasklist")
        .args(["/FI", &format!("PID eq {}", pid)])
        .output()
        .map(|o| String::from_utf8_lossy(&o.stdout).contains(&pid.to_string()))
        .unwrap_or(false)
}

#[cfg(unix)]
fn terminate(pid: u32) -> Result<bool> {
    let status = Command::new("kill")
        .args(["-TERM", &pid.to_string()])
        .status()?;
    Ok(status.success())
}

#[cfg(windows)]
fn terminate(pid: u32) -> Result<bool> {
    let status = Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/F"])
        .status()?;
    Ok(status.success())
}

pub struct Daemon {
    ctx: Arc<AppContext>,
    pid_file: PidFile,
}

impl Daemon {
    pub fn new(ctx: Arc<AppContext>, pid_file: PidFile) -> Self {
        Self { ctx, pid_file }
    }

    /// Run the refresh schedule until SIGINT/SIGTERM.
    pub async fn run(&self) -> Result<()> {
        if let DaemonState::Running(pid) = self.pid_file.state() {
            return Err(RadarError::Other(format!(
                "Another daemon instance is already running (PID {})",
                pid
            )));
        }

        let request = self
            .ctx
            .config
            .scheduler
            .periodic_request()
            .map_err(|e| RadarError::Config(e.to_string()))?;

        self.pid_file.write_current()?;

        info!(
            "neoradar daemon started (refresh interval: {}, PID: {})",
            format_interval(request.interval.as_secs()),
            std::process::id()
        );

        let scheduler = self.ctx.scheduler();
        let job = Arc::new(self.ctx.refresh_job());
        if !scheduler.enqueue_unique_periodic(job, request, ExistingPolicy::Keep) {
            warn!("{} was already scheduled", REFRESH_JOB_NAME);
        }

        wait_for_signal().await;

        info!("Daemon shutting down...");
        scheduler.shutdown().await;
        self.pid_file.remove();

        Ok(())
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {},
                _ = sigint.recv() => {},
            }
        }
        _ => {
            warn!("Failed to install signal handlers, falling back to Ctrl-C");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(windows)]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
