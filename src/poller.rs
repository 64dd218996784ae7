//! Poll scheduler
//!
//! Drives the ingestion pipeline on a fixed cadence:
//!
//! ```text
//! Idle -> Fetching -> Processing -> Idle
//!            |
//!            +-> Failed -> Idle
//! ```
//!
//! A cycle always runs to completion before the next tick is awaited, so a slow upstream
//! delays the next poll instead of overlapping it. A failed fetch yields an empty result,
//! writes nothing, and waits for the next tick.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::alerts::{AlertDispatcher, AlertEvent};
use crate::flights::{FlightState, normalize_value};
use crate::flights_repo::FlightsRepository;
use crate::geofence::Region;
use crate::opensky_client::{Snapshot, SnapshotSource};
use crate::watchlist::{Watchlist, WatchlistHandle};

/// Where the scheduler is within its loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollState {
    Idle,
    Fetching,
    Processing,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum CycleOutcome {
    Completed,
    Failed { reason: String },
}

/// Everything one cycle produced
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    /// 1-based cycle counter
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: CycleOutcome,
    /// Normalized in-region records, in feed order
    pub flights: Vec<FlightState>,
    pub received: usize,
    pub rejected: usize,
    pub outside_region: usize,
    pub persisted: usize,
    pub persist_failures: usize,
    pub alerts_dispatched: usize,
    pub alerts_suppressed: usize,
}

impl CycleReport {
    fn new(cycle: u64, started_at: DateTime<Utc>) -> Self {
        Self {
            cycle,
            started_at,
            finished_at: started_at,
            outcome: CycleOutcome::Completed,
            flights: Vec::new(),
            received: 0,
            rejected: 0,
            outside_region: 0,
            persisted: 0,
            persist_failures: 0,
            alerts_dispatched: 0,
            alerts_suppressed: 0,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, CycleOutcome::Failed { .. })
    }
}

/// Latest cycle report, `None` until the first cycle finishes
pub type CycleReceiver = watch::Receiver<Option<Arc<CycleReport>>>;

pub struct PollScheduler {
    source: Arc<dyn SnapshotSource>,
    repo: FlightsRepository,
    region: Region,
    watchlist: WatchlistHandle,
    dispatcher: AlertDispatcher,
    interval: Duration,
    state: PollState,
    cycles: u64,
    results: watch::Sender<Option<Arc<CycleReport>>>,
}

impl PollScheduler {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        repo: FlightsRepository,
        region: Region,
        watchlist: WatchlistHandle,
        dispatcher: AlertDispatcher,
        interval: Duration,
    ) -> Self {
        let (results, _) = watch::channel(None);
        Self {
            source,
            repo,
            region,
            watchlist,
            dispatcher,
            interval,
            state: PollState::Idle,
            cycles: 0,
            results,
        }
    }

    /// Receive each cycle's report as it completes
    pub fn subscribe(&self) -> CycleReceiver {
        self.results.subscribe()
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Poll until `shutdown` is cancelled
    ///
    /// The first cycle starts immediately. Cancellation is checked between cycles only;
    /// an in-flight fetch is bounded by the client timeout.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            "Starting poll scheduler: interval {:?}, region '{}' ({}..{} lat, {}..{} lon), alert channels: [{}]",
            self.interval,
            self.region.name,
            self.region.min_lat,
            self.region.max_lat,
            self.region.min_lon,
            self.region.max_lon,
            self.dispatcher.channel_names().join(", ")
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            self.run_cycle().await;
        }

        info!("Poll scheduler stopped after {} cycle(s)", self.cycles);
    }

    /// Run one fetch-and-process cycle and publish its report
    #[tracing::instrument(skip(self), fields(cycle = self.cycles + 1))]
    pub async fn run_cycle(&mut self) -> Arc<CycleReport> {
        self.cycles += 1;
        let timer = Instant::now();
        let mut report = CycleReport::new(self.cycles, Utc::now());
        metrics::counter!("tracker.cycles_total").increment(1);

        self.state = PollState::Fetching;
        match self.source.fetch_snapshot().await {
            Ok(snapshot) => {
                self.state = PollState::Processing;
                let seen_at = Utc::now();
                self.process(snapshot, seen_at, &mut report).await;
                info!(
                    "Cycle {} complete: {} received, {} in region, {} rejected, {} persisted, {} alert(s)",
                    report.cycle,
                    report.received,
                    report.flights.len(),
                    report.rejected,
                    report.persisted,
                    report.alerts_dispatched
                );
            }
            Err(e) => {
                self.state = PollState::Failed;
                warn!(
                    "Failed to fetch flight data, retrying in {:?}: {}",
                    self.interval, e
                );
                metrics::counter!("tracker.cycle_failures_total").increment(1);
                report.outcome = CycleOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        }

        report.finished_at = Utc::now();
        metrics::gauge!("tracker.flights_in_region").set(report.flights.len() as f64);
        metrics::histogram!("tracker.cycle_duration_ms").record(timer.elapsed().as_secs_f64() * 1000.0);

        self.state = PollState::Idle;
        let report = Arc::new(report);
        self.results.send_replace(Some(Arc::clone(&report)));
        report
    }

    async fn process(&mut self, snapshot: Snapshot, seen_at: DateTime<Utc>, report: &mut CycleReport) {
        // Replacements made during this cycle apply from the next one
        let watchlist: Arc<Watchlist> = self.watchlist.snapshot();
        let states = snapshot.into_states();
        report.received = states.len();
        metrics::counter!("tracker.records_received_total").increment(states.len() as u64);

        for raw in states {
            let flight = match normalize_value(&raw, seen_at) {
                Ok(flight) => flight,
                Err(e) => {
                    trace!("Dropping malformed record: {}", e);
                    report.rejected += 1;
                    continue;
                }
            };

            if !self.region.inside(flight.latitude, flight.longitude) {
                report.outside_region += 1;
                continue;
            }

            match self.repo.upsert_at(&flight, seen_at).await {
                Ok(_) => report.persisted += 1,
                Err(e) => {
                    error!("Failed to persist flight {}: {}", flight.identifier, e);
                    metrics::counter!("tracker.persist_failures_total").increment(1);
                    report.persist_failures += 1;
                }
            }

            if watchlist.matches(&flight.callsign) {
                debug!(
                    "Watchlisted flight {} ({}) in region",
                    flight.callsign, flight.identifier
                );
                let event = AlertEvent::from_flight(&flight, seen_at);
                let outcome = self.dispatcher.dispatch(&event).await;
                if outcome.suppressed {
                    report.alerts_suppressed += 1;
                } else {
                    report.alerts_dispatched += 1;
                }
            }

            report.flights.push(flight);
        }

        metrics::counter!("tracker.records_rejected_total").increment(report.rejected as u64);
    }
}
