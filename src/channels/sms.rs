use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::alerts::{AlertEvent, ChannelDispatchError, NotificationChannel};
use crate::config::SmsConfig;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Subset of the gateway's message resource we log
#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: Option<String>,
    status: Option<String>,
}

/// Sends alerts as SMS through a Twilio-compatible REST gateway
pub struct SmsChannel {
    client: Client,
    messages_url: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
    to_number: String,
    region: String,
}

impl SmsChannel {
    pub fn new(client: Client, config: &SmsConfig, region: impl Into<String>) -> Result<Self> {
        let auth_token = config
            .auth_token
            .clone()
            .ok_or_else(|| anyhow!("SMS channel requires an auth token"))?;

        Ok(Self {
            client,
            messages_url: format!(
                "{}/2010-04-01/Accounts/{}/Messages.json",
                config.api_base.trim_end_matches('/'),
                config.account_sid
            ),
            account_sid: config.account_sid.clone(),
            auth_token,
            from_number: config.from_number.clone(),
            to_number: config.to_number.clone(),
            region: region.into(),
        })
    }

    pub fn messages_url(&self) -> &str {
        &self.messages_url
    }
}

#[async_trait]
impl NotificationChannel for SmsChannel {
    fn name(&self) -> &str {
        "sms"
    }

    async fn send(&self, event: &AlertEvent) -> Result<(), ChannelDispatchError> {
        let body = event.message(&self.region);
        let form = [
            ("To", self.to_number.as_str()),
            ("From", self.from_number.as_str()),
            ("Body", body.as_str()),
        ];

        let response = self
            .client
            .post(&self.messages_url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .timeout(SEND_TIMEOUT)
            .send()
            .await
            .map_err(|e| ChannelDispatchError::new("sms", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChannelDispatchError::new(
                "sms",
                format!("gateway returned {}: {}", status, body),
            ));
        }

        match response.json::<MessageResource>().await {
            Ok(message) => debug!(
                "SMS accepted (sid: {:?}, status: {:?})",
                message.sid, message.status
            ),
            Err(e) => debug!("SMS accepted, response body not parsed: {}", e),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SmsConfig {
        SmsConfig {
            account_sid: "AC123".to_string(),
            auth_token: Some("token".to_string()),
            from_number: "+15550001111".to_string(),
            to_number: "+2348000000000".to_string(),
            api_base: "https://api.twilio.com/".to_string(),
        }
    }

    #[test]
    fn test_messages_url() {
        let channel = SmsChannel::new(Client::new(), &config(), "Nigeria").unwrap();
        assert_eq!(
            channel.messages_url(),
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json"
        );
    }

    #[test]
    fn test_missing_token_is_rejected() {
        let mut config = config();
        config.auth_token = None;
        assert!(SmsChannel::new(Client::new(), &config, "Nigeria").is_err());
    }
}
