//! Watchlist alert dispatch
//!
//! An [`AlertEvent`] is fanned out to every configured channel in order. A failing channel
//! is logged and counted; it never stops the remaining channels or the polling cycle.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::flights::FlightState;

/// A watchlisted aircraft observed inside the region
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    pub identifier: String,
    pub callsign: String,
    /// Barometric altitude in meters
    pub altitude: Option<f64>,
    pub triggered_at: DateTime<Utc>,
}

impl AlertEvent {
    pub fn from_flight(flight: &FlightState, triggered_at: DateTime<Utc>) -> Self {
        Self {
            identifier: flight.identifier.clone(),
            callsign: flight.callsign.clone(),
            altitude: flight.altitude,
            triggered_at,
        }
    }

    /// Human-readable alert line used by the SMS and email channels
    pub fn message(&self, region: &str) -> String {
        format!(
            "ALERT! Flight {} (ICAO24: {}) detected over {} at {} altitude.",
            self.callsign,
            self.identifier,
            region,
            self.altitude_display()
        )
    }

    pub fn altitude_display(&self) -> String {
        self.altitude
            .map(|a| format!("{:.0}m", a))
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// A single notification channel failed to deliver
#[derive(Debug, Error)]
#[error("{channel} channel failed: {reason}")]
pub struct ChannelDispatchError {
    pub channel: String,
    pub reason: String,
}

impl ChannelDispatchError {
    pub fn new(channel: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self {
            channel: channel.into(),
            reason: reason.to_string(),
        }
    }
}

/// Outbound notification transport (SMS, email, ...)
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Short name used in logs and metrics
    fn name(&self) -> &str;

    async fn send(&self, event: &AlertEvent) -> Result<(), ChannelDispatchError>;
}

/// Result of one `dispatch` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DispatchOutcome {
    pub delivered: usize,
    pub failed: usize,
    /// Event was inside the cooldown window and not sent anywhere
    pub suppressed: bool,
}

/// Fans alert events out to the configured channels
pub struct AlertDispatcher {
    channels: Vec<Box<dyn NotificationChannel>>,
    cooldown: Option<Duration>,
    last_alerted: HashMap<String, DateTime<Utc>>,
}

impl AlertDispatcher {
    /// Create a dispatcher; `cooldown = None` alerts on every call
    pub fn new(channels: Vec<Box<dyn NotificationChannel>>, cooldown: Option<Duration>) -> Self {
        Self {
            channels,
            cooldown,
            last_alerted: HashMap::new(),
        }
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Send `event` to every channel in order
    #[tracing::instrument(skip(self, event), fields(identifier = %event.identifier, callsign = %event.callsign))]
    pub async fn dispatch(&mut self, event: &AlertEvent) -> DispatchOutcome {
        if self.in_cooldown(event) {
            debug!("Alert suppressed by cooldown");
            metrics::counter!("alerts.suppressed_total").increment(1);
            return DispatchOutcome {
                suppressed: true,
                ..Default::default()
            };
        }

        let mut outcome = DispatchOutcome::default();
        for channel in &self.channels {
            match channel.send(event).await {
                Ok(()) => {
                    outcome.delivered += 1;
                    metrics::counter!("alerts.delivered_total", "channel" => channel.name().to_string())
                        .increment(1);
                }
                Err(e) => {
                    outcome.failed += 1;
                    warn!("Alert delivery failed: {}", e);
                    metrics::counter!("alerts.channel_failures_total", "channel" => channel.name().to_string())
                        .increment(1);
                }
            }
        }

        if let Some(cooldown) = self.cooldown {
            // Entries whose window has passed can no longer suppress anything
            self.last_alerted
                .retain(|_, last| !cooldown_elapsed(event.triggered_at, *last, cooldown));
            self.last_alerted
                .insert(event.identifier.clone(), event.triggered_at);
        }

        info!(
            "Dispatched alert for {} ({}): {} delivered, {} failed",
            event.callsign, event.identifier, outcome.delivered, outcome.failed
        );
        metrics::counter!("alerts.dispatched_total").increment(1);

        outcome
    }

    fn in_cooldown(&self, event: &AlertEvent) -> bool {
        let Some(cooldown) = self.cooldown else {
            return false;
        };
        let Some(last) = self.last_alerted.get(&event.identifier) else {
            return false;
        };
        !cooldown_elapsed(event.triggered_at, *last, cooldown)
    }
}

fn cooldown_elapsed(now: DateTime<Utc>, last: DateTime<Utc>, cooldown: Duration) -> bool {
    match (now - last).to_std() {
        Ok(elapsed) => elapsed >= cooldown,
        // Clock moved backwards: treat as still cooling down
        Err(_) => false,
    }
}
