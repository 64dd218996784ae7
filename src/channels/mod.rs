//! Notification channel implementations

pub mod email;
pub mod log;
pub mod sms;

pub use email::EmailChannel;
pub use log::LogChannel;
pub use sms::SmsChannel;

use anyhow::Result;
use tracing::info;

use crate::alerts::NotificationChannel;
use crate::config::TrackerConfig;

/// Build the ordered channel list described by the configuration
///
/// Order is fixed: log, SMS, email.
pub fn build_channels(
    config: &TrackerConfig,
    http: reqwest::Client,
) -> Result<Vec<Box<dyn NotificationChannel>>> {
    let region = config.region.name.clone();
    let mut channels: Vec<Box<dyn NotificationChannel>> = Vec::new();

    if !config.alerts.disable_log_channel {
        channels.push(Box::new(LogChannel::new(region.clone())));
    }
    if let Some(sms) = &config.alerts.sms {
        channels.push(Box::new(SmsChannel::new(http, sms, region.clone())?));
    }
    if let Some(email) = &config.alerts.email {
        channels.push(Box::new(EmailChannel::new(email, region)?));
    }

    info!(
        "Configured {} alert channel(s): {}",
        channels.len(),
        channels
            .iter()
            .map(|c| c.name())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(channels)
}
