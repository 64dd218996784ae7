use anyhow::{Context, Result};

use airwatch::TrackerConfig;

const REDACTED: &str = "<redacted>";

/// Copy of `config` that is safe to print
fn redacted(config: &TrackerConfig) -> TrackerConfig {
    let mut config = config.clone();
    if config.feed.password.is_some() {
        config.feed.password = Some(REDACTED.to_string());
    }
    if let Some(email) = config.alerts.email.as_mut()
        && email.password.is_some()
    {
        email.password = Some(REDACTED.to_string());
    }
    if let Some(sms) = config.alerts.sms.as_mut()
        && sms.auth_token.is_some()
    {
        sms.auth_token = Some(REDACTED.to_string());
    }
    config
}

pub fn handle_check_config(config: &TrackerConfig) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let rendered = toml::to_string_pretty(&redacted(config))
        .context("Failed to render configuration")?;
    println!("# Effective configuration (valid)\n{}", rendered);
    Ok(())
}
