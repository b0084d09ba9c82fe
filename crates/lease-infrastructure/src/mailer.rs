//! SMTP notifier

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;
use tracing::{error, info};

use lease_core::error::DomainError;
use lease_core::providers::Notifier;

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// e.g. `Block Lease <no-reply@example.com>`
    pub from: String,
    /// Plain connections are for local catch-all servers only.
    #[serde(default = "default_starttls")]
    pub starttls: bool,
}

fn default_port() -> u16 {
    587
}

fn default_starttls() -> bool {
    true
}

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self, DomainError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| DomainError::Validation(format!("invalid sender address: {}", e)))?;

        let mut builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host).map_err(|e| {
                error!("SMTP relay setup for {} failed: {}", config.host, e);
                DomainError::Notification("mail transport unavailable".to_string())
            })?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };
        builder = builder.port(config.port);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

fn build_message(
    from: &Mailbox,
    recipient: &str,
    subject: &str,
    html_body: &str,
) -> Result<Message, DomainError> {
    let to: Mailbox = recipient
        .parse()
        .map_err(|_| DomainError::Validation(format!("invalid recipient '{}'", recipient)))?;

    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(subject)
        .header(ContentType::TEXT_HTML)
        .body(html_body.to_string())
        .map_err(|e| {
            error!("Failed to build mail to {}: {}", recipient, e);
            DomainError::Notification("failed to build message".to_string())
        })
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, recipient: &str, subject: &str, html_body: &str) -> Result<(), DomainError> {
        let message = build_message(&self.from, recipient, subject, html_body)?;
        self.transport.send(message).await.map_err(|e| {
            error!("SMTP send to {} failed: {}", recipient, e);
            DomainError::Notification("mail delivery failed".to_string())
        })?;
        info!("Mail '{}' sent to {}", subject, recipient);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> Mailbox {
        "Block Lease <no-reply@example.com>".parse().unwrap()
    }

    #[test]
    fn test_build_html_message() {
        let message = build_message(&sender(), "tenant@example.com", "Verified", "<p>hi</p>").unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("To: tenant@example.com"));
        assert!(raw.contains("Subject: Verified"));
        assert!(raw.contains("text/html"));
    }

    #[test]
    fn test_bad_recipient() {
        assert!(matches!(
            build_message(&sender(), "not an address", "s", "b"),
            Err(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_plain_transport_for_local_relay() {
        let notifier = SmtpNotifier::new(&SmtpConfig {
            host: "localhost".into(),
            port: 1025,
            username: None,
            password: None,
            from: "no-reply@example.com".into(),
            starttls: false,
        });
        assert!(notifier.is_ok());
    }
}
