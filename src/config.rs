//! Tracker configuration
//!
//! Loaded from an optional TOML file, then overridden by CLI flags and environment
//! secrets. The resulting value is passed to every component at construction.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::geofence::Region;

pub const DEFAULT_FEED_URL: &str = "https://opensky-network.org/api/states/all";

/// Top-level configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// SQLite file holding the latest state per aircraft
    pub database_path: PathBuf,
    pub feed: FeedConfig,
    pub region: Region,
    pub poll: PollConfig,
    pub alerts: AlertsConfig,
    pub web: WebConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("flights.db"),
            feed: FeedConfig::default(),
            region: Region::default(),
            poll: PollConfig::default(),
            alerts: AlertsConfig::default(),
            web: WebConfig::default(),
        }
    }
}

/// Upstream state-vector feed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub url: String,
    /// Bound on a single fetch, including reading the body
    pub timeout_secs: u64,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Ask the feed to pre-filter to the region's bounding box
    pub request_bbox: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            timeout_secs: 30,
            username: None,
            password: None,
            request_bbox: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Time between cycle starts
    pub interval_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    /// Comma-separated callsigns
    pub watchlist: String,
    /// Minimum time between alerts for the same aircraft; 0 alerts on every cycle
    pub cooldown_secs: u64,
    /// Disable the tracing channel (enabled unless set to true)
    pub disable_log_channel: bool,
    pub email: Option<EmailConfig>,
    pub sms: Option<SmsConfig>,
}

/// SMTP channel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_server: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_email: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
    pub to_email: String,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_name() -> String {
    "airwatch".to_string()
}

/// SMS gateway (Twilio-compatible REST API) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsConfig {
    pub account_sid: String,
    pub auth_token: Option<String>,
    pub from_number: String,
    pub to_number: String,
    #[serde(default = "default_sms_api_base")]
    pub api_base: String,
}

fn default_sms_api_base() -> String {
    "https://api.twilio.com".to_string()
}

/// Query API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub enabled: bool,
    pub interface: String,
    pub port: u16,
    /// Default row count for the history view
    pub recent_limit: usize,
    /// Tag history rows stale once they are older than this
    pub stale_after_secs: Option<u64>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interface: "127.0.0.1".to_string(),
            port: 8080,
            recent_limit: 50,
            stale_after_secs: None,
        }
    }
}

impl TrackerConfig {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        Self::from_toml(&contents).with_context(|| format!("Failed to parse {:?}", path))
    }

    /// Load from `path` when given, otherwise start from defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Fill secrets from the process environment when present
    pub fn apply_env_secrets(&mut self) {
        self.apply_secrets_from(|key| std::env::var(key).ok());
    }

    /// Fill secrets using `lookup`; a set variable wins over the file value
    pub fn apply_secrets_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(username) = lookup("OPENSKY_USERNAME") {
            self.feed.username = Some(username);
        }
        if let Some(password) = lookup("OPENSKY_PASSWORD") {
            self.feed.password = Some(password);
        }
        if let Some(email) = self.alerts.email.as_mut()
            && let Some(password) = lookup("SMTP_PASSWORD")
        {
            email.password = Some(password);
        }
        if let Some(sms) = self.alerts.sms.as_mut()
            && let Some(token) = lookup("TWILIO_AUTH_TOKEN")
        {
            sms.auth_token = Some(token);
        }
    }

    /// Validate the configuration before anything starts
    pub fn validate(&self) -> Result<()> {
        self.region
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid region: {e}"))?;

        if self.poll.interval_secs == 0 {
            bail!("poll.interval_secs must be greater than zero");
        }
        if self.feed.timeout_secs == 0 {
            bail!("feed.timeout_secs must be greater than zero");
        }
        reqwest::Url::parse(&self.feed.url)
            .with_context(|| format!("Invalid feed.url {:?}", self.feed.url))?;
        if self.feed.username.is_some() != self.feed.password.is_some() {
            bail!("feed.username and feed.password must be set together");
        }

        if let Some(email) = &self.alerts.email {
            if email.smtp_server.trim().is_empty() {
                bail!("alerts.email.smtp_server must not be empty");
            }
            if email.from_email.trim().is_empty() || email.to_email.trim().is_empty() {
                bail!("alerts.email.from_email and alerts.email.to_email are required");
            }
        }

        if let Some(sms) = &self.alerts.sms {
            if sms.account_sid.trim().is_empty() {
                bail!("alerts.sms.account_sid must not be empty");
            }
            if sms.auth_token.as_deref().is_none_or(|t| t.trim().is_empty()) {
                bail!("alerts.sms.auth_token (or TWILIO_AUTH_TOKEN) is required");
            }
            if sms.from_number.trim().is_empty() || sms.to_number.trim().is_empty() {
                bail!("alerts.sms.from_number and alerts.sms.to_number are required");
            }
        }

        if self.web.recent_limit == 0 {
            bail!("web.recent_limit must be greater than zero");
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll.interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.feed.timeout_secs)
    }

    /// Alert cooldown, `None` when every cycle may alert
    pub fn alert_cooldown(&self) -> Option<Duration> {
        (self.alerts.cooldown_secs > 0).then(|| Duration::from_secs(self.alerts.cooldown_secs))
    }

    pub fn stale_after(&self) -> Option<chrono::Duration> {
        self.web
            .stale_after_secs
            .and_then(|secs| chrono::Duration::try_seconds(i64::try_from(secs).ok()?))
    }
}
