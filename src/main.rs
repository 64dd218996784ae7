use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use airwatch::TrackerConfig;

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "airwatch",
    version,
    about = "Track live aircraft over a region and alert on watchlisted callsigns"
)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted
    #[arg(long, short, env = "AIRWATCH_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// SQLite database file (overrides `database_path`)
    #[arg(long, env = "AIRWATCH_DATABASE", global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Poll the feed, store in-region flights, alert, and serve the HTTP API
    Run {
        /// Comma-separated callsigns to watch (overrides `alerts.watchlist`)
        #[arg(long, env = "AIRWATCH_WATCHLIST")]
        watchlist: Option<String>,

        /// Seconds between poll cycles (overrides `poll.interval_secs`)
        #[arg(long)]
        interval_secs: Option<u64>,

        /// Web server port (overrides `web.port`)
        #[arg(long, env = "AIRWATCH_PORT")]
        port: Option<u16>,

        /// Do not start the HTTP API
        #[arg(long, default_value_t = false)]
        no_web: bool,
    },
    /// Print the most recently seen stored flights
    Recent {
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Print JSON instead of a table
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Delete stored flights not seen for the given number of hours
    Prune {
        #[arg(long)]
        older_than_hours: u64,
    },
    /// Load and validate configuration, then print the effective values
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = TrackerConfig::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;
    config.apply_env_secrets();
    if let Some(database) = cli.database {
        config.database_path = database;
    }

    match cli.command {
        Commands::Run {
            watchlist,
            interval_secs,
            port,
            no_web,
        } => {
            if let Some(watchlist) = watchlist {
                config.alerts.watchlist = watchlist;
            }
            if let Some(interval_secs) = interval_secs {
                config.poll.interval_secs = interval_secs;
            }
            if let Some(port) = port {
                config.web.port = port;
            }
            if no_web {
                config.web.enabled = false;
            }
            commands::handle_run(config).await
        }
        Commands::Recent { limit, json } => commands::handle_recent(&config, limit, json).await,
        Commands::Prune { older_than_hours } => {
            commands::handle_prune(&config, older_than_hours).await
        }
        Commands::CheckConfig => commands::handle_check_config(&config),
    }
}
