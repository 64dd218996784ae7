//! airwatch - regional live-traffic tracker
//!
//! Polls a state-vector feed, keeps the latest state per aircraft inside a configured
//! region, and raises alerts when a watchlisted callsign appears.

pub mod actions;
pub mod alerts;
pub mod channels;
pub mod config;
pub mod db;
pub mod flights;
pub mod flights_repo;
pub mod geofence;
pub mod metrics;
pub mod opensky_client;
pub mod poller;
pub mod schema;
pub mod watchlist;
pub mod web;

pub use config::TrackerConfig;
pub use flights::FlightState;
pub use poller::{CycleReport, PollScheduler};
