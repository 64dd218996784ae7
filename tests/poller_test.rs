mod common;

use airwatch::alerts::{AlertDispatcher, NotificationChannel};
use airwatch::geofence::Region;
use airwatch::opensky_client::{FetchError, Snapshot};
use airwatch::poller::{CycleOutcome, PollScheduler, PollState};
use airwatch::watchlist::{Watchlist, WatchlistHandle};
use common::{RecordingChannel, ScriptedSource, TestDatabase, state_vector};
use diesel::RunQueryDsl;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const INTERVAL: Duration = Duration::from_secs(60);

fn scheduler(
    test_db: &TestDatabase,
    source: &ScriptedSource,
    watchlist: &WatchlistHandle,
    channels: Vec<RecordingChannel>,
    cooldown: Option<Duration>,
) -> PollScheduler {
    let channels: Vec<Box<dyn NotificationChannel>> = channels
        .into_iter()
        .map(|c| Box::new(c) as Box<dyn NotificationChannel>)
        .collect();
    PollScheduler::new(
        Arc::new(source.clone()),
        test_db.repo(),
        Region::default(),
        watchlist.clone(),
        AlertDispatcher::new(channels, cooldown),
        INTERVAL,
    )
}

fn snapshot(states: Vec<Vec<serde_json::Value>>) -> Result<Snapshot, FetchError> {
    Ok(Snapshot::from_states(states))
}

#[tokio::test]
async fn test_watchlisted_flight_in_region_is_stored_and_alerted() {
    let test_db = TestDatabase::new().expect("Failed to create test database");
    let source = ScriptedSource::new(vec![snapshot(vec![state_vector(
        "a1b2c3",
        Some("DAL123"),
        Some(9.0),
        Some(7.5),
        Some(10_000.0),
    )])]);
    let watchlist = WatchlistHandle::new(Watchlist::parse("dal123"));
    let channel = RecordingChannel::new("log");
    let mut poller = scheduler(&test_db, &source, &watchlist, vec![channel.clone()], None);

    let report = poller.run_cycle().await;

    assert_eq!(report.outcome, CycleOutcome::Completed);
    assert_eq!(report.flights.len(), 1);
    assert_eq!(report.persisted, 1);
    assert_eq!(report.alerts_dispatched, 1);
    assert_eq!(poller.state(), PollState::Idle);

    let stored = test_db.repo().get("a1b2c3").await.unwrap().expect("stored");
    assert_eq!(stored.callsign, "DAL123");
    assert_eq!(stored.altitude, Some(10_000.0));

    let sent = channel.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].identifier, "a1b2c3");
    assert_eq!(sent[0].callsign, "DAL123");
    assert_eq!(sent[0].altitude, Some(10_000.0));
}

#[tokio::test]
async fn test_out_of_region_and_malformed_records_are_skipped() {
    let test_db = TestDatabase::new().expect("Failed to create test database");
    let source = ScriptedSource::new(vec![snapshot(vec![
        // London
        state_vector("400abc", Some("BAW75"), Some(51.47), Some(-0.45), Some(3_000.0)),
        // No position
        state_vector("d4e5f6", Some("DAL123"), None, None, None),
        // Latitude only
        state_vector("aa0001", Some("DAL123"), Some(9.0), None, None),
        // No identifier
        state_vector("", Some("DAL123"), Some(9.0), Some(7.5), None),
        // Lagos, inside
        state_vector("0640c1", None, Some(6.58), Some(3.32), Some(1_200.0)),
    ])]);
    let watchlist = WatchlistHandle::new(Watchlist::parse("DAL123, BAW75"));
    let channel = RecordingChannel::new("log");
    let mut poller = scheduler(&test_db, &source, &watchlist, vec![channel.clone()], None);

    let report = poller.run_cycle().await;

    assert_eq!(report.received, 5);
    assert_eq!(report.rejected, 3);
    assert_eq!(report.outside_region, 1);
    assert_eq!(report.flights.len(), 1);
    assert_eq!(report.flights[0].identifier, "0640c1");
    assert_eq!(report.flights[0].callsign, "Unknown");

    let repo = test_db.repo();
    assert_eq!(repo.count().await.unwrap(), 1);
    assert!(repo.get("400abc").await.unwrap().is_none());
    assert!(repo.get("d4e5f6").await.unwrap().is_none());
    assert!(repo.get("aa0001").await.unwrap().is_none());

    // Watchlisted but outside the region or without a position: no alert
    assert!(channel.sent().is_empty());
}

#[tokio::test]
async fn test_non_array_entry_is_rejected_alone() {
    let test_db = TestDatabase::new().expect("Failed to create test database");
    let source = ScriptedSource::new(vec![Ok(Snapshot::from_values(vec![
        serde_json::Value::Array(state_vector(
            "a1b2c3",
            Some("DAL123"),
            Some(9.0),
            Some(7.5),
            Some(10_000.0),
        )),
        serde_json::Value::Null,
        serde_json::json!("not a record"),
    ]))]);
    let watchlist = WatchlistHandle::new(Watchlist::parse("DAL123"));
    let channel = RecordingChannel::new("log");
    let mut poller = scheduler(&test_db, &source, &watchlist, vec![channel.clone()], None);

    let report = poller.run_cycle().await;

    assert_eq!(report.outcome, CycleOutcome::Completed);
    assert_eq!(report.received, 3);
    assert_eq!(report.rejected, 2);
    assert_eq!(report.flights.len(), 1);
    assert_eq!(report.persisted, 1);
    assert!(test_db.repo().get("a1b2c3").await.unwrap().is_some());
    assert_eq!(channel.sent().len(), 1);
}

#[tokio::test]
async fn test_failed_fetch_yields_empty_cycle_without_writes() {
    let test_db = TestDatabase::new().expect("Failed to create test database");
    let source = ScriptedSource::new(vec![Err(FetchError::Status {
        status: StatusCode::INTERNAL_SERVER_ERROR,
    })]);
    let watchlist = WatchlistHandle::default();
    let mut poller = scheduler(&test_db, &source, &watchlist, Vec::new(), None);

    let report = poller.run_cycle().await;

    assert!(report.is_failed());
    assert!(report.flights.is_empty());
    assert_eq!(report.persisted, 0);
    assert_eq!(test_db.repo().count().await.unwrap(), 0);
    assert_eq!(poller.state(), PollState::Idle);

    // The next cycle proceeds normally
    source.push(snapshot(vec![state_vector(
        "a1b2c3",
        Some("DAL123"),
        Some(9.0),
        Some(7.5),
        None,
    )]));
    let report = poller.run_cycle().await;
    assert_eq!(report.outcome, CycleOutcome::Completed);
    assert_eq!(report.cycle, 2);
    assert_eq!(test_db.repo().count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_duplicate_identifier_in_one_cycle_keeps_one_row() {
    let test_db = TestDatabase::new().expect("Failed to create test database");
    let source = ScriptedSource::new(vec![snapshot(vec![
        state_vector("a1b2c3", Some("DAL123"), Some(9.0), Some(7.5), Some(10_000.0)),
        state_vector("a1b2c3", Some("DAL123"), Some(9.1), Some(7.6), Some(10_200.0)),
    ])]);
    let watchlist = WatchlistHandle::default();
    let mut poller = scheduler(&test_db, &source, &watchlist, Vec::new(), None);

    let report = poller.run_cycle().await;

    assert_eq!(report.flights.len(), 2);
    let repo = test_db.repo();
    assert_eq!(repo.count().await.unwrap(), 1);
    let stored = repo.get("a1b2c3").await.unwrap().unwrap();
    assert_eq!(stored.altitude, Some(10_200.0));
}

#[tokio::test]
async fn test_failing_channel_does_not_abort_cycle() {
    let test_db = TestDatabase::new().expect("Failed to create test database");
    let source = ScriptedSource::new(vec![snapshot(vec![
        state_vector("a1b2c3", Some("DAL123"), Some(9.0), Some(7.5), None),
        state_vector("d4e5f6", Some("DAL123"), Some(10.0), Some(8.0), None),
    ])]);
    let watchlist = WatchlistHandle::new(Watchlist::parse("DAL123"));
    let sms = RecordingChannel::failing("sms");
    let email = RecordingChannel::new("email");
    let mut poller = scheduler(
        &test_db,
        &source,
        &watchlist,
        vec![sms.clone(), email.clone()],
        None,
    );

    let report = poller.run_cycle().await;

    assert_eq!(report.outcome, CycleOutcome::Completed);
    assert_eq!(report.alerts_dispatched, 2);
    assert_eq!(sms.sent().len(), 2);
    assert_eq!(email.sent().len(), 2);
    assert_eq!(test_db.repo().count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_persistence_failure_does_not_stop_the_cycle() {
    let test_db = TestDatabase::new().expect("Failed to create test database");
    {
        let mut conn = test_db.pool().get().unwrap();
        diesel::sql_query("DROP TABLE flights")
            .execute(&mut conn)
            .unwrap();
    }
    let source = ScriptedSource::new(vec![snapshot(vec![
        state_vector("a1b2c3", Some("DAL123"), Some(9.0), Some(7.5), None),
        state_vector("0640c1", Some("ABC1"), Some(6.58), Some(3.32), None),
    ])]);
    let watchlist = WatchlistHandle::new(Watchlist::parse("DAL123"));
    let channel = RecordingChannel::new("log");
    let mut poller = scheduler(&test_db, &source, &watchlist, vec![channel.clone()], None);

    let report = poller.run_cycle().await;

    assert_eq!(report.outcome, CycleOutcome::Completed);
    assert_eq!(report.persisted, 0);
    assert_eq!(report.persist_failures, 2);
    assert_eq!(report.flights.len(), 2);
    assert_eq!(channel.sent().len(), 1);
}

#[tokio::test]
async fn test_watchlist_replacement_applies_next_cycle() {
    let test_db = TestDatabase::new().expect("Failed to create test database");
    let dal = || state_vector("a1b2c3", Some("DAL123"), Some(9.0), Some(7.5), None);
    let source = ScriptedSource::new(vec![snapshot(vec![dal()]), snapshot(vec![dal()])]);
    let watchlist = WatchlistHandle::new(Watchlist::parse("BAW75"));
    let channel = RecordingChannel::new("log");
    let mut poller = scheduler(&test_db, &source, &watchlist, vec![channel.clone()], None);

    assert_eq!(poller.run_cycle().await.alerts_dispatched, 0);

    watchlist.replace(Watchlist::parse("DAL123"));
    assert_eq!(poller.run_cycle().await.alerts_dispatched, 1);
    assert_eq!(channel.sent().len(), 1);
}

#[tokio::test]
async fn test_alerts_repeat_every_cycle_without_cooldown() {
    let test_db = TestDatabase::new().expect("Failed to create test database");
    let dal = || state_vector("a1b2c3", Some("DAL123"), Some(9.0), Some(7.5), None);
    let source = ScriptedSource::new(vec![snapshot(vec![dal()]), snapshot(vec![dal()])]);
    let watchlist = WatchlistHandle::new(Watchlist::parse("DAL123"));
    let channel = RecordingChannel::new("log");
    let mut poller = scheduler(&test_db, &source, &watchlist, vec![channel.clone()], None);

    poller.run_cycle().await;
    poller.run_cycle().await;

    assert_eq!(channel.sent().len(), 2);
}

#[tokio::test]
async fn test_cooldown_suppresses_repeat_alerts_across_cycles() {
    let test_db = TestDatabase::new().expect("Failed to create test database");
    let dal = || state_vector("a1b2c3", Some("DAL123"), Some(9.0), Some(7.5), None);
    let source = ScriptedSource::new(vec![snapshot(vec![dal()]), snapshot(vec![dal()])]);
    let watchlist = WatchlistHandle::new(Watchlist::parse("DAL123"));
    let channel = RecordingChannel::new("log");
    let mut poller = scheduler(
        &test_db,
        &source,
        &watchlist,
        vec![channel.clone()],
        Some(Duration::from_secs(3600)),
    );

    assert_eq!(poller.run_cycle().await.alerts_dispatched, 1);
    let second = poller.run_cycle().await;
    assert_eq!(second.alerts_dispatched, 0);
    assert_eq!(second.alerts_suppressed, 1);
    assert_eq!(channel.sent().len(), 1);
}

#[tokio::test]
async fn test_run_waits_interval_after_failure_and_stops_on_cancel() {
    let test_db = TestDatabase::new().expect("Failed to create test database");
    let source = ScriptedSource::new(vec![
        Err(FetchError::Timeout(Duration::from_secs(30))),
        snapshot(vec![state_vector(
            "a1b2c3",
            Some("DAL123"),
            Some(9.0),
            Some(7.5),
            None,
        )]),
    ]);
    let watchlist = WatchlistHandle::default();
    let channels: Vec<Box<dyn NotificationChannel>> = Vec::new();
    let interval = Duration::from_millis(300);
    let poller = PollScheduler::new(
        Arc::new(source.clone()),
        test_db.repo(),
        Region::default(),
        watchlist,
        AlertDispatcher::new(channels, None),
        interval,
    );
    let mut reports = poller.subscribe();
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(poller.run(shutdown.clone()));

    reports.changed().await.unwrap();
    let first = reports.borrow_and_update().clone().unwrap();
    assert!(first.is_failed());
    assert_eq!(test_db.repo().count().await.unwrap(), 0);

    reports.changed().await.unwrap();
    let second = reports.borrow_and_update().clone().unwrap();
    assert_eq!(second.outcome, CycleOutcome::Completed);
    assert_eq!(second.cycle, 2);
    let gap = (second.started_at - first.started_at).to_std().unwrap();
    assert!(gap >= interval - Duration::from_millis(50), "gap was {:?}", gap);

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("scheduler stops after cancellation")
        .unwrap();
    assert!(source.calls() >= 2);
}
