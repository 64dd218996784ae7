use anyhow::Result;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
    message::{Mailbox, Message, MultiPart, SinglePart},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
};
use tracing::{debug, info};

use crate::alerts::{AlertEvent, ChannelDispatchError, NotificationChannel};
use crate::config::EmailConfig;

/// Create a properly formatted Mailbox with display name
fn create_mailbox(name: Option<&str>, email: &str) -> Result<Mailbox> {
    let address = email.parse()?;
    Ok(Mailbox::new(name.map(str::to_string), address))
}

/// Sends alerts as email through an SMTP relay
pub struct EmailChannel {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
    region: String,
}

impl EmailChannel {
    pub fn new(config: &EmailConfig, region: impl Into<String>) -> Result<Self> {
        let server = config.smtp_server.as_str();
        let port = config.smtp_port;

        // Port selects transport security:
        // - 1025: plain (local capture servers such as Mailpit)
        // - 465: implicit TLS
        // - anything else: STARTTLS
        let mut builder = if port == 1025 {
            info!("Using insecure SMTP connection for port 1025 without TLS");
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(server).tls(Tls::None)
        } else if port == 465 {
            info!("Using implicit TLS (SMTPS) for port 465");
            let tls = TlsParameters::new(server.to_string())?;
            AsyncSmtpTransport::<Tokio1Executor>::relay(server)?.tls(Tls::Wrapper(tls))
        } else {
            info!("Using STARTTLS for port {}", port);
            let tls = TlsParameters::new(server.to_string())?;
            AsyncSmtpTransport::<Tokio1Executor>::relay(server)?.tls(Tls::Required(tls))
        };
        builder = builder.port(port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            mailer: builder.build(),
            from: create_mailbox(Some(&config.from_name), &config.from_email)?,
            to: create_mailbox(None, &config.to_email)?,
            region: region.into(),
        })
    }

    /// Build the alert message without sending it
    pub fn build_message(&self, event: &AlertEvent) -> Result<Message> {
        let subject = format!("Flight Alert: {} Detected", event.callsign);
        let text_body = self.build_text(event);
        let html_body = self.build_html(event);

        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(SinglePart::plain(text_body))
                    .singlepart(SinglePart::html(html_body)),
            )?;
        Ok(message)
    }

    fn build_text(&self, event: &AlertEvent) -> String {
        format!(
            "{}\n\nCallsign: {}\nICAO24: {}\nAltitude: {}\nDetected at: {}\n",
            event.message(&self.region),
            event.callsign,
            event.identifier,
            event.altitude_display(),
            event.triggered_at.format("%Y-%m-%d %H:%M:%S UTC"),
        )
    }

    fn build_html(&self, event: &AlertEvent) -> String {
        format!(
            r#"<html>
<body style="font-family: sans-serif;">
<h2>Flight {callsign} detected over {region}</h2>
<table>
<tr><td><strong>Callsign</strong></td><td>{callsign}</td></tr>
<tr><td><strong>ICAO24</strong></td><td>{identifier}</td></tr>
<tr><td><strong>Altitude</strong></td><td>{altitude}</td></tr>
<tr><td><strong>Detected at</strong></td><td>{time}</td></tr>
</table>
</body>
</html>"#,
            callsign = html_escape(&event.callsign),
            region = html_escape(&self.region),
            identifier = html_escape(&event.identifier),
            altitude = event.altitude_display(),
            time = event.triggered_at.format("%Y-%m-%d %H:%M:%S UTC"),
        )
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn name(&self) -> &str {
        "email"
    }

    async fn send(&self, event: &AlertEvent) -> Result<(), ChannelDispatchError> {
        let message = self
            .build_message(event)
            .map_err(|e| ChannelDispatchError::new("email", e))?;
        let response = self
            .mailer
            .send(message)
            .await
            .map_err(|e| ChannelDispatchError::new("email", e))?;
        debug!("SMTP accepted alert email: {:?}", response.code());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn config() -> EmailConfig {
        EmailConfig {
            smtp_server: "localhost".to_string(),
            smtp_port: 1025,
            username: None,
            password: None,
            from_email: "tracker@example.com".to_string(),
            from_name: "airwatch".to_string(),
            to_email: "ops@example.com".to_string(),
        }
    }

    fn event() -> AlertEvent {
        AlertEvent {
            identifier: "a1b2c3".to_string(),
            callsign: "DAL123".to_string(),
            altitude: Some(10_000.0),
            triggered_at: Utc.with_ymd_and_hms(2026, 10, 19, 12, 30, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_build_message_headers_and_body() {
        let channel = EmailChannel::new(&config(), "Nigeria").unwrap();
        let message = channel.build_message(&event()).unwrap();
        let formatted = String::from_utf8(message.formatted()).unwrap();

        assert!(formatted.contains("Subject: Flight Alert: DAL123 Detected"));
        assert!(formatted.contains("ops@example.com"));
        assert!(formatted.contains("tracker@example.com"));
        assert!(formatted.contains("2026-10-19 12:30:00 UTC"));
    }

    #[tokio::test]
    async fn test_invalid_recipient_is_rejected_at_construction() {
        let mut config = config();
        config.to_email = "not an address".to_string();
        assert!(EmailChannel::new(&config, "Nigeria").is_err());
    }

    #[tokio::test]
    async fn test_send_without_relay_is_a_channel_error() {
        // Nothing listens on the local capture port in the test environment
        let mut config = config();
        config.smtp_server = "127.0.0.1".to_string();
        let channel = EmailChannel::new(&config, "Nigeria").unwrap();

        let err = channel.send(&event()).await.unwrap_err();
        assert_eq!(err.channel, "email");
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<a&b>"), "&lt;a&amp;b&gt;");
    }
}
