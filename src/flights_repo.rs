use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use thiserror::Error;

use crate::db::SqlitePool;
use crate::flights::FlightState;
use crate::schema::flights;

/// A store operation that could not complete
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to get store connection: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("store query failed: {0}")]
    Query(#[from] diesel::result::Error),
    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = flights)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct FlightRecord {
    pub identifier: String,
    pub callsign: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    pub velocity: Option<f64>,
    pub last_seen: NaiveDateTime,
}

impl From<FlightRecord> for FlightState {
    fn from(record: FlightRecord) -> Self {
        FlightState {
            identifier: record.identifier,
            callsign: record.callsign,
            latitude: record.latitude,
            longitude: record.longitude,
            altitude: record.altitude,
            velocity: record.velocity,
            last_seen: record.last_seen.and_utc(),
        }
    }
}

impl FlightRecord {
    fn from_state(flight: &FlightState, seen_at: DateTime<Utc>) -> Self {
        FlightRecord {
            identifier: flight.identifier.clone(),
            callsign: flight.callsign.clone(),
            latitude: flight.latitude,
            longitude: flight.longitude,
            altitude: flight.altitude,
            velocity: flight.velocity,
            last_seen: seen_at.naive_utc(),
        }
    }
}

/// Latest-known state per aircraft, one row per identifier
#[derive(Clone)]
pub struct FlightsRepository {
    pool: SqlitePool,
}

impl FlightsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace the row for `flight.identifier`, stamping `last_seen` with now
    pub async fn upsert(&self, flight: &FlightState) -> Result<FlightState, PersistenceError> {
        self.upsert_at(flight, Utc::now()).await
    }

    /// Insert or replace the row for `flight.identifier`, stamping `last_seen` with `seen_at`
    ///
    /// The write is a single `INSERT OR REPLACE`, so readers see either the old row or the
    /// new one. Returns the state as stored.
    pub async fn upsert_at(
        &self,
        flight: &FlightState,
        seen_at: DateTime<Utc>,
    ) -> Result<FlightState, PersistenceError> {
        let pool = self.pool.clone();
        let record = FlightRecord::from_state(flight, seen_at);

        tokio::task::spawn_blocking(move || -> Result<FlightState, PersistenceError> {
            let mut conn = pool.get()?;
            diesel::replace_into(flights::table)
                .values(&record)
                .execute(&mut conn)?;
            Ok(record.into())
        })
        .await?
    }

    /// Up to `limit` rows, most recently seen first (identifier ascending on ties)
    pub async fn recent(&self, limit: usize) -> Result<Vec<FlightState>, PersistenceError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let pool = self.pool.clone();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        tokio::task::spawn_blocking(move || -> Result<Vec<FlightState>, PersistenceError> {
            let mut conn = pool.get()?;
            let records = flights::table
                .order((flights::last_seen.desc(), flights::identifier.asc()))
                .limit(limit)
                .select(FlightRecord::as_select())
                .load(&mut conn)?;
            Ok(records.into_iter().map(|r| r.into()).collect())
        })
        .await?
    }

    /// Get the stored state for one aircraft
    pub async fn get(&self, identifier: &str) -> Result<Option<FlightState>, PersistenceError> {
        let pool = self.pool.clone();
        let identifier = identifier.to_string();

        tokio::task::spawn_blocking(move || -> Result<Option<FlightState>, PersistenceError> {
            let mut conn = pool.get()?;
            let record = flights::table
                .find(identifier)
                .select(FlightRecord::as_select())
                .first(&mut conn)
                .optional()?;
            Ok(record.map(|r| r.into()))
        })
        .await?
    }

    /// Number of stored aircraft
    pub async fn count(&self) -> Result<i64, PersistenceError> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || -> Result<i64, PersistenceError> {
            let mut conn = pool.get()?;
            Ok(flights::table.count().get_result(&mut conn)?)
        })
        .await?
    }

    /// Delete rows not seen since `cutoff`, returning how many were removed
    ///
    /// Eviction is never triggered by the polling path; it is an explicit operator action.
    pub async fn prune_seen_before(&self, cutoff: DateTime<Utc>) -> Result<usize, PersistenceError> {
        let pool = self.pool.clone();
        let cutoff = cutoff.naive_utc();

        tokio::task::spawn_blocking(move || -> Result<usize, PersistenceError> {
            let mut conn = pool.get()?;
            let rows = diesel::delete(flights::table.filter(flights::last_seen.lt(cutoff)))
                .execute(&mut conn)?;
            Ok(rows)
        })
        .await?
    }
}
