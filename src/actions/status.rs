//! Health endpoint
//!
//! Reports uptime, the most recent poll cycle and the size of the store. A failed last
//! cycle marks the service `degraded` but still answers 200 so the process is not
//! restarted over an upstream outage.

use axum::{extract::State, http::StatusCode, response::IntoResponse, response::Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::OnceLock;
use std::time::Instant;
use tracing::warn;

use super::DataResponse;
use crate::poller::{CycleOutcome, CycleReport};
use crate::web::AppState;

/// Server start time - initialized on first status request
static SERVER_START_TIME: OnceLock<Instant> = OnceLock::new();

/// Initialize the server start time (call this when the server starts)
pub fn init_server_start_time() {
    SERVER_START_TIME.get_or_init(Instant::now);
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastCycle {
    pub cycle: u64,
    pub finished_at: DateTime<Utc>,
    pub outcome: CycleOutcome,
    pub flights_in_region: usize,
    pub rejected: usize,
    pub persist_failures: usize,
    pub alerts_dispatched: usize,
}

impl From<&CycleReport> for LastCycle {
    fn from(report: &CycleReport) -> Self {
        Self {
            cycle: report.cycle,
            finished_at: report.finished_at,
            outcome: report.outcome.clone(),
            flights_in_region: report.flights.len(),
            rejected: report.rejected,
            persist_failures: report.persist_failures,
            alerts_dispatched: report.alerts_dispatched,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthInfo {
    /// "ok", "starting" before the first cycle, or "degraded" after a failed one
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub uptime_human: String,
    pub last_cycle: Option<LastCycle>,
    /// `None` when the store could not be queried
    pub stored_flights: Option<i64>,
    pub watchlist_size: usize,
}

/// Format seconds into a human-readable duration string
fn format_duration(seconds: u64) -> String {
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if days > 0 {
        format!("{}d {}h {}m {}s", days, hours, minutes, secs)
    } else if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Handler for GET /health
pub async fn get_health(State(state): State<AppState>) -> impl IntoResponse {
    let start_time = SERVER_START_TIME.get_or_init(Instant::now);
    let uptime_seconds = start_time.elapsed().as_secs();

    let report = state.cycles.borrow().clone();
    let status = match report.as_deref() {
        None => "starting",
        Some(report) if report.is_failed() => "degraded",
        Some(_) => "ok",
    };

    let stored_flights = match state.flights.count().await {
        Ok(count) => Some(count),
        Err(e) => {
            warn!("Failed to count stored flights: {}", e);
            None
        }
    };

    let health = HealthInfo {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds,
        uptime_human: format_duration(uptime_seconds),
        last_cycle: report.as_deref().map(LastCycle::from),
        stored_flights,
        watchlist_size: state.watchlist.snapshot().len(),
    };

    (StatusCode::OK, Json(DataResponse { data: health }))
}
