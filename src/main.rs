use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use neoradar::app::AppContext;
use neoradar::cli::{commands, Cli, Commands, DaemonAction};
use neoradar::config::Config;
use neoradar::daemon::{Daemon, PidFile};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("neoradar=info")))
        .init();

    let cli = Cli::parse();
    let mut config = Config::load()?;

    match cli.command {
        Commands::Refresh => commands::refresh(&AppContext::new(config)?).await?,
        Commands::List { range } => commands::list(&AppContext::new(config)?, range).await?,
        Commands::Watch { range } => commands::watch(&AppContext::new(config)?, range).await?,
        Commands::Picture => commands::picture(&AppContext::new(config)?).await?,
        Commands::Clear => commands::clear(&AppContext::new(config)?).await?,
        Commands::Daemon { action } => match action {
            DaemonAction::Start {
                interval,
                no_initial_refresh,
            } => {
                if let Some(interval) = interval {
                    config.scheduler.interval = interval;
                }
                if no_initial_refresh {
                    config.scheduler.run_on_start = false;
                }
                let ctx = Arc::new(AppContext::new(config)?);
                Daemon::new(ctx, PidFile::default_location()?).run().await?;
            }
            DaemonAction::Stop => {
                let pid = PidFile::default_location()?.stop()?;
                println!("Daemon stopped (PID {})", pid);
            }
            DaemonAction::Status => println!("{}", PidFile::default_location()?.state()),
        },
    }

    Ok(())
}
