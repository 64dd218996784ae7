//! Common test utilities for store-backed integration tests
//!
//! `TestDatabase` opens a fresh SQLite file in its own temporary directory, so tests
//! run in parallel without sharing state. The directory is removed on drop.
//!
//! # Usage
//!
//! ```no_run
//! use common::TestDatabase;
//!
//! #[tokio::test]
//! async fn my_test() {
//!     let test_db = TestDatabase::new().expect("Failed to create test database");
//!     let repo = test_db.repo();
//! }
//! ```
#![allow(dead_code)]

use airwatch::alerts::{AlertEvent, ChannelDispatchError, NotificationChannel};
use airwatch::db::{SqlitePool, open_store};
use airwatch::flights::RawStateVector;
use airwatch::flights_repo::FlightsRepository;
use airwatch::opensky_client::{FetchError, Snapshot, SnapshotSource};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Isolated on-disk flight store
pub struct TestDatabase {
    dir: TempDir,
    pool: SqlitePool,
}

impl TestDatabase {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let pool = open_store(&dir.path().join("flights.db"))?;
        Ok(Self { dir, pool })
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().join("flights.db")
    }

    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    pub fn repo(&self) -> FlightsRepository {
        FlightsRepository::new(self.pool.clone())
    }
}

/// A 17-element state vector as the feed sends it
pub fn state_vector(
    icao24: &str,
    callsign: Option<&str>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    altitude: Option<f64>,
) -> RawStateVector {
    vec![
        json!(icao24),
        callsign.map_or(Value::Null, |c| json!(format!("{:<8}", c))),
        json!("Nigeria"),
        json!(1_700_000_000),
        json!(1_700_000_000),
        longitude.map_or(Value::Null, |v| json!(v)),
        latitude.map_or(Value::Null, |v| json!(v)),
        altitude.map_or(Value::Null, |v| json!(v)),
        json!(false),
        json!(230.5),
        json!(90.0),
        json!(0.0),
        Value::Null,
        altitude.map_or(Value::Null, |v| json!(v + 250.0)),
        json!("1234"),
        json!(false),
        json!(0),
    ]
}

/// Snapshot source that replays scripted responses, then returns empty snapshots
#[derive(Clone, Default)]
pub struct ScriptedSource {
    responses: Arc<Mutex<VecDeque<Result<Snapshot, FetchError>>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(responses: Vec<Result<Snapshot, FetchError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn push(&self, response: Result<Snapshot, FetchError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotSource for ScriptedSource {
    async fn fetch_snapshot(&self) -> Result<Snapshot, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Snapshot::from_states(Vec::new())))
    }
}

/// Notification channel that records every event and optionally fails
#[derive(Clone)]
pub struct RecordingChannel {
    name: String,
    fail: bool,
    sent: Arc<Mutex<Vec<AlertEvent>>>,
}

impl RecordingChannel {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail: false,
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(name)
        }
    }

    pub fn sent(&self) -> Vec<AlertEvent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, event: &AlertEvent) -> Result<(), ChannelDispatchError> {
        self.sent.lock().unwrap().push(event.clone());
        if self.fail {
            Err(ChannelDispatchError::new(&self.name, "gateway unavailable"))
        } else {
            Ok(())
        }
    }
}
