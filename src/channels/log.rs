use async_trait::async_trait;
use tracing::warn;

use crate::alerts::{AlertEvent, ChannelDispatchError, NotificationChannel};

/// Writes alerts to the tracing log
pub struct LogChannel {
    region: String,
}

impl LogChannel {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
        }
    }
}

#[async_trait]
impl NotificationChannel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, event: &AlertEvent) -> Result<(), ChannelDispatchError> {
        warn!(
            identifier = %event.identifier,
            callsign = %event.callsign,
            triggered_at = %event.triggered_at,
            "{}",
            event.message(&self.region)
        );
        Ok(())
    }
}
