use axum::{
    extract::{Path, Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::actions::{DataListResponse, DataResponse, json_error};
use crate::flights::FlightView;
use crate::poller::{CycleOutcome, CycleReport};
use crate::web::AppState;

/// Upper bound on `limit` for the recent-flights listing
pub const MAX_RECENT_LIMIT: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct RecentFlightsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CurrentFlightsQuery {
    /// Substring of callsign or ICAO24, case-insensitive
    pub search: Option<String>,
}

fn bad_query(rejection: QueryRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, &rejection.body_text()).into_response()
}

/// Latest cycle as returned by the API, flights tagged for staleness
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentFlightsView {
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: CycleOutcome,
    pub received: usize,
    pub rejected: usize,
    pub outside_region: usize,
    pub persisted: usize,
    pub persist_failures: usize,
    pub alerts_dispatched: usize,
    pub alerts_suppressed: usize,
    pub flights: Vec<FlightView>,
}

impl CurrentFlightsView {
    /// Build the view, keeping only flights matching `search` when given
    pub fn from_report(
        report: &CycleReport,
        search: Option<&str>,
        now: DateTime<Utc>,
        stale_after: Option<chrono::Duration>,
    ) -> Self {
        Self {
            cycle: report.cycle,
            started_at: report.started_at,
            finished_at: report.finished_at,
            outcome: report.outcome.clone(),
            received: report.received,
            rejected: report.rejected,
            outside_region: report.outside_region,
            persisted: report.persisted,
            persist_failures: report.persist_failures,
            alerts_dispatched: report.alerts_dispatched,
            alerts_suppressed: report.alerts_suppressed,
            flights: report
                .flights
                .iter()
                .filter(|flight| search.is_none_or(|query| flight.matches_search(query)))
                .cloned()
                .map(|flight| FlightView::from_state(flight, now, stale_after))
                .collect(),
        }
    }
}

/// GET /data/flights/current?search=Q - Report of the latest poll cycle
///
/// Answers 404 until the first cycle has finished. Counters always describe the whole
/// cycle; `search` only narrows the returned flights.
pub async fn get_current_flights(
    State(state): State<AppState>,
    query: Result<Query<CurrentFlightsQuery>, QueryRejection>,
) -> impl IntoResponse {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return bad_query(rejection),
    };

    let report = state.cycles.borrow().clone();
    match report {
        Some(report) => Json(DataResponse {
            data: CurrentFlightsView::from_report(
                &report,
                query.search.as_deref(),
                Utc::now(),
                state.stale_after,
            ),
        })
        .into_response(),
        None => json_error(StatusCode::NOT_FOUND, "No poll cycle has completed yet").into_response(),
    }
}

/// GET /data/flights/recent?limit=N - Most recently seen stored flights
pub async fn get_recent_flights(
    State(state): State<AppState>,
    query: Result<Query<RecentFlightsQuery>, QueryRejection>,
) -> impl IntoResponse {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return bad_query(rejection),
    };
    let limit = query
        .limit
        .unwrap_or(state.recent_limit)
        .min(MAX_RECENT_LIMIT);

    match state.flights.recent(limit).await {
        Ok(flights) => {
            let now = Utc::now();
            let views: Vec<FlightView> = flights
                .into_iter()
                .map(|flight| FlightView::from_state(flight, now, state.stale_after))
                .collect();
            Json(DataListResponse { data: views }).into_response()
        }
        Err(e) => {
            error!("Failed to get recent flights: {}", e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to get recent flights")
                .into_response()
        }
    }
}

/// GET /data/flights/{identifier} - Stored state for one aircraft
pub async fn get_flight(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> impl IntoResponse {
    match state.flights.get(identifier.trim()).await {
        Ok(Some(flight)) => Json(DataResponse {
            data: FlightView::from_state(flight, Utc::now(), state.stale_after),
        })
        .into_response(),
        Ok(None) => json_error(StatusCode::NOT_FOUND, "Flight not found").into_response(),
        Err(e) => {
            error!("Failed to get flight {}: {}", identifier, e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to get flight").into_response()
        }
    }
}
