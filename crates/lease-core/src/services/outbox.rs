//! Notification outbox dispatch.
//!
//! Messages are appended by the registry in the same step as the state change
//! that causes them. The dispatcher claims a batch for a bounded lease, renders
//! and sends it, and records each failure so a later drain retries it. Two
//! drains running at once never receive the same message.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{Datelike, TimeDelta, Utc};
use handlebars::Handlebars;
use qrcode::render::svg;
use qrcode::QrCode;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::domain::{NotificationKind, OutboxMessage};
use crate::error::DomainError;
use crate::providers::Notifier;
use crate::repositories::OutboxRepository;

const CONTRACT_APPROVED: &str = "contract_approved";
const LANDLORD_INVITATION: &str = "landlord_invitation";
/// How long a claimed message stays hidden from other dispatchers.
const CLAIM_LEASE_SECS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

pub struct EmailTemplates {
    registry: Handlebars<'static>,
}

impl EmailTemplates {
    pub fn new() -> Result<Self, DomainError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry
            .register_template_string(CONTRACT_APPROVED, include_str!("../../templates/contract_approved.hbs"))
            .map_err(|e| DomainError::Internal(format!("template error: {}", e)))?;
        registry
            .register_template_string(LANDLORD_INVITATION, include_str!("../../templates/landlord_invitation.hbs"))
            .map_err(|e| DomainError::Internal(format!("template error: {}", e)))?;
        Ok(Self { registry })
    }

    pub fn render(&self, kind: &NotificationKind) -> Result<RenderedEmail, DomainError> {
        let year = Utc::now().year();
        let (template, subject, data) = match kind {
            NotificationKind::ContractApproved {
                doc_hash,
                details,
                share_url,
            } => (
                CONTRACT_APPROVED,
                "Your Rental Agreement has been Verified on the Blockchain!",
                json!({
                    "tenant_name": details.tenant_name,
                    "landlord_name": details.landlord_name,
                    "unit_info": details.unit_info,
                    "period_from": details.period_from,
                    "period_to": details.period_to,
                    "doc_hash": doc_hash.to_hex(),
                    "share_url": share_url,
                    "qr_code": qr_data_url(share_url)?,
                    "year": year,
                }),
            ),
            NotificationKind::LandlordInvitation {
                fingerprint,
                login_url,
                ..
            } => (
                LANDLORD_INVITATION,
                "You Have a New Document to Approve",
                json!({
                    "fingerprint": fingerprint,
                    "login_url": login_url,
                    "year": year,
                }),
            ),
        };

        let html = self
            .registry
            .render(template, &data)
            .map_err(|e| DomainError::Internal(format!("render error: {}", e)))?;
        Ok(RenderedEmail {
            subject: subject.to_string(),
            html,
        })
    }
}

/// SVG QR code for `url` as a `data:` URL suitable for an `<img>` tag.
pub fn qr_data_url(url: &str) -> Result<String, DomainError> {
    let code = QrCode::new(url.as_bytes())
        .map_err(|e| DomainError::Internal(format!("QR encoding failed: {}", e)))?;
    let image = code
        .render()
        .min_dimensions(200, 200)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build();
    Ok(format!("data:image/svg+xml;base64,{}", STANDARD.encode(image)))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub delivered: usize,
    pub failed: usize,
}

pub struct OutboxDispatcher {
    outbox: Arc<dyn OutboxRepository>,
    notifier: Arc<dyn Notifier>,
    templates: EmailTemplates,
    batch_size: usize,
    max_attempts: i32,
}

impl OutboxDispatcher {
    pub fn new(
        outbox: Arc<dyn OutboxRepository>,
        notifier: Arc<dyn Notifier>,
        templates: EmailTemplates,
        batch_size: usize,
        max_attempts: i32,
    ) -> Self {
        Self {
            outbox,
            notifier,
            templates,
            batch_size,
            max_attempts,
        }
    }

    /// Claim and send one batch of undelivered messages.
    pub async fn drain(&self) -> Result<DrainReport, DomainError> {
        let lease = Utc::now() + TimeDelta::seconds(CLAIM_LEASE_SECS);
        let batch = self
            .outbox
            .claim_batch(self.batch_size, self.max_attempts, lease)
            .await?;
        let mut report = DrainReport::default();

        for message in batch {
            match self.deliver(&message).await {
                Ok(()) => {
                    self.outbox.mark_delivered(&message.id).await?;
                    report.delivered += 1;
                }
                Err(e) => {
                    error!(
                        "Delivery of outbox message {} failed (attempt {}): {}",
                        message.id,
                        message.attempts + 1,
                        e
                    );
                    self.outbox.mark_failed(&message.id, &e.to_string()).await?;
                    report.failed += 1;
                }
            }
        }

        if report.delivered + report.failed > 0 {
            info!(
                "Outbox drained: {} delivered, {} failed",
                report.delivered, report.failed
            );
        }
        Ok(report)
    }

    async fn deliver(&self, message: &OutboxMessage) -> Result<(), DomainError> {
        let email = self.templates.render(&message.kind)?;
        debug!("Sending '{}' to {}", email.subject, message.recipient);
        self.notifier
            .send(&message.recipient, &email.subject, &email.html)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::Fingerprint;
    use crate::hash::DocumentHash;
    use crate::providers::MockNotifier;
    use crate::repositories::InMemoryRegistry;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn approved_message() -> OutboxMessage {
        let details = Fingerprint::new(
            "Somchai Jaidee",
            "Jane <Doe>",
            "5, Main Street, Bangkok",
            "01/01/2025",
            "31/12/2025",
            "15000",
        );
        let doc_hash = DocumentHash::of(&details);
        OutboxMessage::new(
            "jane@example.com",
            NotificationKind::ContractApproved {
                doc_hash,
                details,
                share_url: format!("https://lease.test/verify/{}", doc_hash),
            },
        )
    }

    #[test]
    fn test_render_contract_approved() {
        let templates = EmailTemplates::new().unwrap();
        let email = templates.render(&approved_message().kind).unwrap();

        assert!(email.subject.contains("Verified"));
        assert!(email.html.contains("Jane &lt;Doe&gt;"));
        assert!(email.html.contains("href=\"https://lease.test/verify/0x"));
        assert!(email.html.contains("src=\"data:image/svg+xml;base64,"));
    }

    #[test]
    fn test_render_invitation() {
        let templates = EmailTemplates::new().unwrap();
        let email = templates
            .render(&NotificationKind::LandlordInvitation {
                doc_hash: DocumentHash::of_text("x"),
                fingerprint: "Landlord: New Owner | Unit: 3".into(),
                login_url: "https://lease.test/login".into(),
            })
            .unwrap();
        assert_eq!(email.subject, "You Have a New Document to Approve");
        assert!(email.html.contains("Landlord: New Owner | Unit: 3"));
        assert!(email.html.contains("https://lease.test/login"));
    }

    #[test]
    fn test_qr_data_url() {
        let url = qr_data_url("https://lease.test/verify/0xabc").unwrap();
        let encoded = url.strip_prefix("data:image/svg+xml;base64,").unwrap();
        let svg = String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap();
        assert!(svg.contains("<svg"));
    }

    #[tokio::test]
    async fn test_drain_marks_delivered_and_retries_failures() {
        let registry = Arc::new(InMemoryRegistry::new());
        let message = approved_message();
        registry.enqueue(&message).await.unwrap();

        let mut failing = MockNotifier::new();
        failing
            .expect_send()
            .times(1)
            .returning(|_, _, _| Err(DomainError::Notification("smtp down".into())));
        let dispatcher = OutboxDispatcher::new(
            registry.clone(),
            Arc::new(failing),
            EmailTemplates::new().unwrap(),
            10,
            5,
        );
        assert_eq!(dispatcher.drain().await.unwrap(), DrainReport { delivered: 0, failed: 1 });
        assert_eq!(registry.outbox()[0].attempts, 1);

        let mut working = MockNotifier::new();
        working
            .expect_send()
            .withf(|to, subject, _| to == "jane@example.com" && subject.contains("Verified"))
            .times(1)
            .returning(|_, _, _| Ok(()));
        let dispatcher = OutboxDispatcher::new(
            registry.clone(),
            Arc::new(working),
            EmailTemplates::new().unwrap(),
            10,
            5,
        );
        assert_eq!(dispatcher.drain().await.unwrap(), DrainReport { delivered: 1, failed: 0 });
        assert!(registry.outbox().is_empty());

        // nothing left
        assert_eq!(dispatcher.drain().await.unwrap(), DrainReport::default());
    }

    struct SlowCountingNotifier {
        sent: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Notifier for SlowCountingNotifier {
        async fn send(&self, _: &str, _: &str, _: &str) -> Result<(), DomainError> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_overlapping_drains_send_each_message_once() {
        let registry = Arc::new(InMemoryRegistry::new());
        registry.enqueue(&approved_message()).await.unwrap();

        let notifier = Arc::new(SlowCountingNotifier {
            sent: AtomicUsize::new(0),
        });
        let dispatcher = OutboxDispatcher::new(
            registry.clone(),
            notifier.clone(),
            EmailTemplates::new().unwrap(),
            10,
            5,
        );

        let (first, second) = tokio::join!(dispatcher.drain(), dispatcher.drain());
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_eq!(notifier.sent.load(Ordering::SeqCst), 1);
        assert_eq!(first.delivered + second.delivered, 1);
        assert_eq!(first.failed + second.failed, 0);
        assert!(registry.outbox().is_empty());
    }
}
