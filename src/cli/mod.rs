pub mod commands;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "neoradar")]
#[command(about = "Offline cache of near-Earth object close approaches", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one refresh cycle over the coming week
    Refresh,
    /// List cached asteroids
    List {
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Fetch and show today's featured image
    Picture,
    /// Print the cached list and again on every change
    Watch {
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Drop every cached asteroid
    Clear,
    /// Background daemon for scheduled refreshes
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },
}

/// Which slice of the cache to show. Defaults to everything.
#[derive(Args, Debug, Clone, Copy, Default)]
#[group(multiple = false)]
pub struct RangeArgs {
    /// Only today's close approaches
    #[arg(long)]
    pub today: bool,

    /// Only the seven days starting today
    #[arg(long)]
    pub week: bool,
}

#[derive(Subcommand)]
pub enum DaemonAction {
    /// Start the daemon in the foreground
    Start {
        /// Refresh interval override (e.g., "6h", "1d")
        #[arg(short, long)]
        interval: Option<String>,

        /// Skip the refresh normally run on start
        #[arg(long)]
        no_initial_refresh: bool,
    },
    /// Stop the running daemon
    Stop,
    /// Check daemon status
    Status,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_week() {
        let cli = Cli::try_parse_from(["neoradar", "list", "--week"]).unwrap();
        match cli.command {
            Commands::List { range } => {
                assert!(range.week);
                assert!(!range.today);
            }
            _ => panic!("expected list"),
        }
    }

    #[test]
    fn test_today_and_week_conflict() {
        assert!(Cli::try_parse_from(["neoradar", "watch", "--today", "--week"]).is_err());
    }

    #[test]
    fn test_parse_daemon_start() {
        let cli = Cli::try_parse_from([
            "neoradar",
            "daemon",
            "start",
            "--interval",
            "6h",
            "--no-initial-refresh",
        ])
        .unwrap();
        match cli.command {
            Commands::Daemon {
                action:
                    DaemonAction::Start {
                        interval,
                        no_initial_refresh,
                    },
            } => {
                assert_eq!(interval.as_deref(), Some("6h"));
                assert!(no_initial_refresh);
            }
            _ => panic!("expected daemon start"),
        }
    }
}
