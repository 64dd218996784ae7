use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::FeedConfig;
use crate::flights::RawStateVector;
use crate::geofence::Region;

/// One full response from the upstream feed
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Snapshot {
    /// Feed timestamp (seconds since epoch) the states refer to
    #[serde(default)]
    pub time: Option<i64>,
    /// The feed sends `null` rather than `[]` when nothing is airborne. Entries stay
    /// untyped here so one malformed entry is rejected on its own during normalization.
    #[serde(default)]
    pub states: Option<Vec<Value>>,
}

impl Snapshot {
    pub fn from_states(states: Vec<RawStateVector>) -> Self {
        Self::from_values(states.into_iter().map(Value::Array).collect())
    }

    pub fn from_values(states: Vec<Value>) -> Self {
        Self {
            time: None,
            states: Some(states),
        }
    }

    pub fn into_states(self) -> Vec<Value> {
        self.states.unwrap_or_default()
    }
}

/// The upstream fetch did not produce a usable snapshot
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("feed returned HTTP {status}")]
    Status { status: StatusCode },
    #[error("could not decode feed response: {0}")]
    Decode(String),
}

/// Source of full state-vector snapshots
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_snapshot(&self) -> Result<Snapshot, FetchError>;
}

/// Client for the OpenSky-style `/states/all` endpoint
#[derive(Clone)]
pub struct OpenSkyClient {
    client: Client,
    url: String,
    timeout: Duration,
    credentials: Option<(String, String)>,
    bbox: Option<Region>,
}

impl OpenSkyClient {
    /// Create a new client
    ///
    /// When `config.request_bbox` is set the region is sent as `lamin/lomin/lamax/lomax`, so
    /// the feed pre-filters; local geofencing still applies to whatever comes back.
    pub fn new(client: Client, config: &FeedConfig, region: &Region) -> Self {
        let credentials = match (&config.username, &config.password) {
            (Some(user), Some(pass)) => Some((user.clone(), pass.clone())),
            _ => None,
        };
        Self {
            client,
            url: config.url.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            credentials,
            bbox: config.request_bbox.then(|| region.clone()),
        }
    }

    fn map_transport_error(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else if e.is_decode() {
            FetchError::Decode(e.to_string())
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl SnapshotSource for OpenSkyClient {
    #[tracing::instrument(skip(self), fields(url = %self.url))]
    async fn fetch_snapshot(&self) -> Result<Snapshot, FetchError> {
        let mut request = self.client.get(&self.url).timeout(self.timeout);

        if let Some(region) = &self.bbox {
            request = request.query(&[
                ("lamin", region.min_lat),
                ("lomin", region.min_lon),
                ("lamax", region.max_lat),
                ("lomax", region.max_lon),
            ]);
        }
        if let Some((user, pass)) = &self.credentials {
            request = request.basic_auth(user, Some(pass));
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        // Anything other than 200 is a failed fetch, including other 2xx codes
        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status { status });
        }

        let snapshot: Snapshot = response
            .json()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        debug!(
            "Fetched snapshot with {} state vectors (feed time: {:?})",
            snapshot.states.as_ref().map_or(0, Vec::len),
            snapshot.time
        );

        Ok(snapshot)
    }
}
