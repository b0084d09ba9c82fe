//! Notification outbox trait (port)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::OutboxMessage;
use crate::error::DomainError;

#[async_trait]
pub trait OutboxRepository: Send + Sync {
    async fn enqueue(&self, message: &OutboxMessage) -> Result<(), DomainError>;

    /// Atomically claim up to `limit` undelivered messages with fewer than
    /// `max_attempts` failed sends, oldest first. Claimed messages are hidden
    /// from other callers until `claimed_until` passes, so a crashed sender
    /// only delays a message.
    async fn claim_batch(
        &self,
        limit: usize,
        max_attempts: i32,
        claimed_until: DateTime<Utc>,
    ) -> Result<Vec<OutboxMessage>, DomainError>;

    /// Settle a claimed message. Stores may drop delivered messages.
    async fn mark_delivered(&self, id: &Uuid) -> Result<(), DomainError>;

    /// Count a failed send and release the claim.
    async fn mark_failed(&self, id: &Uuid, error: &str) -> Result<(), DomainError>;
}
