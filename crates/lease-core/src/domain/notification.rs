//! Outbox entries for mail that must survive a failed send

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fingerprint::Fingerprint;
use crate::hash::DocumentHash;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationKind {
    /// Tells the tenant their agreement is on-chain, with a shareable link.
    ContractApproved {
        doc_hash: DocumentHash,
        /// Corrected fingerprint as committed.
        details: Fingerprint,
        share_url: String,
    },
    /// Invites an unregistered landlord to review a pending contract.
    LandlordInvitation {
        doc_hash: DocumentHash,
        fingerprint: String,
        login_url: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxMessage {
    pub id: Uuid,
    pub recipient: String,
    pub kind: NotificationKind,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    /// Set while a dispatcher is sending; others skip the message until then.
    #[serde(default)]
    pub claimed_until: Option<DateTime<Utc>>,
}

impl OutboxMessage {
    pub fn new(recipient: impl Into<String>, kind: NotificationKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient: recipient.into(),
            kind,
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
            delivered_at: None,
            claimed_until: None,
        }
    }

    /// Undelivered, under the attempt cap and not held by another dispatcher.
    pub fn is_claimable(&self, max_attempts: i32, now: DateTime<Utc>) -> bool {
        self.delivered_at.is_none()
            && self.attempts < max_attempts
            && self.claimed_until.map_or(true, |until| until <= now)
    }
}
