use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use airwatch::TrackerConfig;
use airwatch::alerts::AlertDispatcher;
use airwatch::channels::build_channels;
use airwatch::db::open_store;
use airwatch::flights_repo::FlightsRepository;
use airwatch::metrics::{init_metrics, initialize_tracker_metrics, process_metrics_task};
use airwatch::opensky_client::OpenSkyClient;
use airwatch::poller::PollScheduler;
use airwatch::watchlist::{Watchlist, WatchlistHandle};
use airwatch::web::{AppState, start_web_server};

/// Cancel `shutdown` once `signal` fires
///
/// A signal listener that fails to install leaves the token alone, so the tracker keeps
/// running and has to be stopped some other way.
async fn cancel_on_signal<F>(signal: F, shutdown: CancellationToken)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            info!("Received Ctrl-C, stopping after the current cycle");
            shutdown.cancel();
        }
        Err(e) => error!("Failed to listen for Ctrl-C, tracker will keep running: {}", e),
    }
}

pub async fn handle_run(config: TrackerConfig) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let metrics = match init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Metrics disabled: {:#}", e);
            None
        }
    };

    // The store is required; nothing starts without it
    let pool = open_store(&config.database_path)?;
    let flights = FlightsRepository::new(pool);

    let http = reqwest::Client::builder()
        .user_agent(concat!("airwatch/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    let channels = build_channels(&config, http.clone())?;
    let dispatcher = AlertDispatcher::new(channels, config.alert_cooldown());
    initialize_tracker_metrics(&dispatcher.channel_names());

    let watchlist = WatchlistHandle::new(Watchlist::parse(&config.alerts.watchlist));
    let watched = watchlist.snapshot();
    if watched.is_empty() {
        warn!("Watchlist is empty; no alerts will be raised until it is set");
    } else {
        info!(
            "Watching {} callsign(s): {}",
            watched.len(),
            watched.entries().collect::<Vec<_>>().join(", ")
        );
    }

    let source = Arc::new(OpenSkyClient::new(http, &config.feed, &config.region));
    let scheduler = PollScheduler::new(
        source,
        flights.clone(),
        config.region.clone(),
        watchlist.clone(),
        dispatcher,
        config.poll_interval(),
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(tokio::signal::ctrl_c(), shutdown.clone()));

    if metrics.is_some() {
        tokio::spawn(process_metrics_task(shutdown.clone()));
    }

    let web_task = if config.web.enabled {
        let state = AppState {
            flights,
            cycles: scheduler.subscribe(),
            watchlist,
            metrics,
            recent_limit: config.web.recent_limit,
            stale_after: config.stale_after(),
        };
        let interface = config.web.interface.clone();
        let port = config.web.port;
        let shutdown = shutdown.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = start_web_server(interface, port, state, shutdown.clone()).await {
                error!("Web server failed: {:#}", e);
                shutdown.cancel();
            }
        }))
    } else {
        info!("HTTP API disabled");
        None
    };

    scheduler.run(shutdown.clone()).await;

    if let Some(task) = web_task
        && let Err(e) = task.await
    {
        error!("Web server task panicked: {}", e);
    }

    Ok(())
}
