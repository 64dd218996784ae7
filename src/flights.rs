//! Flight state model and snapshot normalization
//!
//! The upstream feed delivers each aircraft as a positional JSON array. That loose form is
//! only ever seen here: `normalize` either produces a typed [`FlightState`] or rejects the
//! record with a [`MalformedRecordError`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Callsign stored when the feed omits one or sends only whitespace
pub const UNKNOWN_CALLSIGN: &str = "Unknown";

/// Positional indices of the state vector fields we consume
mod index {
    pub const IDENTIFIER: usize = 0;
    pub const CALLSIGN: usize = 1;
    pub const LONGITUDE: usize = 5;
    pub const LATITUDE: usize = 6;
    pub const BARO_ALTITUDE: usize = 7;
    pub const VELOCITY: usize = 9;
}

/// One raw per-aircraft record exactly as the feed sent it
pub type RawStateVector = Vec<Value>;

/// Why a raw record was dropped
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedRecordError {
    #[error("record is {0}, not an array")]
    NotAnArray(&'static str),
    #[error("record has no transponder identifier")]
    MissingIdentifier,
    #[error("record is missing {0}")]
    MissingCoordinate(&'static str),
    #[error("{field} is not a finite number: {value}")]
    InvalidCoordinate { field: &'static str, value: String },
}

/// Latest known state of one aircraft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightState {
    /// Transponder code (ICAO 24-bit address as sent by the feed)
    pub identifier: String,
    /// Trimmed, upper-cased callsign or [`UNKNOWN_CALLSIGN`]
    pub callsign: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Barometric altitude in meters
    pub altitude: Option<f64>,
    /// Ground speed in m/s
    pub velocity: Option<f64>,
    /// Ingestion time of the write that produced this state
    pub last_seen: DateTime<Utc>,
}

impl FlightState {
    /// Whether the feed supplied a real callsign
    pub fn has_callsign(&self) -> bool {
        self.callsign != UNKNOWN_CALLSIGN
    }

    /// Case-insensitive substring match on callsign or identifier; a blank query matches
    pub fn matches_search(&self, query: &str) -> bool {
        let needle = query.trim().to_uppercase();
        needle.is_empty()
            || self.callsign.to_uppercase().contains(&needle)
            || self.identifier.to_uppercase().contains(&needle)
    }

    /// Whether this state is older than `max_age` relative to `now`
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now - self.last_seen > max_age
    }
}

/// Normalize one entry of the feed's `states` list, which should be an array
pub fn normalize_value(
    raw: &Value,
    seen_at: DateTime<Utc>,
) -> Result<FlightState, MalformedRecordError> {
    match raw.as_array() {
        Some(fields) => normalize(fields, seen_at),
        None => Err(MalformedRecordError::NotAnArray(json_kind(raw))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Normalize one raw state vector observed at `seen_at`
pub fn normalize(
    raw: &[Value],
    seen_at: DateTime<Utc>,
) -> Result<FlightState, MalformedRecordError> {
    let identifier = raw
        .get(index::IDENTIFIER)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(MalformedRecordError::MissingIdentifier)?
        .to_string();

    let latitude = required_coordinate(raw, index::LATITUDE, "latitude")?;
    let longitude = required_coordinate(raw, index::LONGITUDE, "longitude")?;

    Ok(FlightState {
        identifier,
        callsign: normalize_callsign(raw.get(index::CALLSIGN).and_then(Value::as_str)),
        latitude,
        longitude,
        altitude: optional_number(raw.get(index::BARO_ALTITUDE)),
        velocity: optional_number(raw.get(index::VELOCITY)),
        last_seen: seen_at,
    })
}

/// Trim and upper-case a callsign, mapping missing or blank input to [`UNKNOWN_CALLSIGN`]
pub fn normalize_callsign(callsign: Option<&str>) -> String {
    match callsign.map(str::trim) {
        Some(cs) if !cs.is_empty() => cs.to_uppercase(),
        _ => UNKNOWN_CALLSIGN.to_string(),
    }
}

fn required_coordinate(
    raw: &[Value],
    idx: usize,
    field: &'static str,
) -> Result<f64, MalformedRecordError> {
    match raw.get(idx) {
        None | Some(Value::Null) => Err(MalformedRecordError::MissingCoordinate(field)),
        Some(value) => parse_finite(value).ok_or_else(|| MalformedRecordError::InvalidCoordinate {
            field,
            value: value.to_string(),
        }),
    }
}

fn optional_number(value: Option<&Value>) -> Option<f64> {
    value.and_then(parse_finite)
}

/// Accept JSON numbers and numeric strings, rejecting NaN and infinities
fn parse_finite(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

/// Flight state for API responses, with the staleness tag computed at read time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightView {
    pub identifier: String,
    pub callsign: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    pub velocity: Option<f64>,
    pub last_seen: DateTime<Utc>,
    pub stale: bool,
}

impl FlightView {
    /// Build a view, tagging it stale when `stale_after` is set and exceeded
    pub fn from_state(state: FlightState, now: DateTime<Utc>, stale_after: Option<Duration>) -> Self {
        let stale = stale_after.is_some_and(|max_age| state.is_stale(now, max_age));
        Self {
            identifier: state.identifier,
            callsign: state.callsign,
            latitude: state.latitude,
            longitude: state.longitude,
            altitude: state.altitude,
            velocity: state.velocity,
            last_seen: state.last_seen,
            stale,
        }
    }
}
