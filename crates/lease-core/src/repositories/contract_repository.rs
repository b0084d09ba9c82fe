//! Contract repository trait (port)

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{ApprovedContract, OutboxMessage, PendingContract, Unit};
use crate::error::DomainError;
use crate::hash::DocumentHash;

/// Result of the atomic check-then-insert for a pending contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A pending or approved record already holds this hash.
    Duplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionOutcome {
    Promoted,
    /// Another pending contract already canonicalized to the same hash; the
    /// pending record was consumed and the existing approval kept.
    AlreadyApproved,
}

#[async_trait]
pub trait ContractRepository: Send + Sync {
    async fn find_pending(&self, doc_hash: &DocumentHash)
        -> Result<Option<PendingContract>, DomainError>;

    async fn find_approved(
        &self,
        doc_hash: &DocumentHash,
    ) -> Result<Option<ApprovedContract>, DomainError>;

    /// Insert unless a pending or approved record with the same hash exists.
    /// Must be atomic with respect to concurrent inserts of the same hash.
    async fn insert_pending(&self, contract: &PendingContract) -> Result<InsertOutcome, DomainError>;

    async fn list_pending_for_landlord(
        &self,
        landlord_id: &Uuid,
    ) -> Result<Vec<PendingContract>, DomainError>;

    async fn list_approved_for_landlord(
        &self,
        landlord_id: &Uuid,
    ) -> Result<Vec<ApprovedContract>, DomainError>;

    /// Create `unit` and re-point the pending contract at it in one step.
    async fn attach_new_unit(
        &self,
        contract: &PendingContract,
        unit: &Unit,
    ) -> Result<(), DomainError>;

    /// Persist the invitee on the pending contract and queue the invitation.
    async fn record_invitation(
        &self,
        contract: &PendingContract,
        message: &OutboxMessage,
    ) -> Result<(), DomainError>;

    /// Insert the approval, delete the pending record (and any pending record
    /// already holding the approved hash) and queue the tenant notification
    /// atomically. Nothing changes on error.
    async fn promote(
        &self,
        pending_id: &Uuid,
        approved: &ApprovedContract,
        message: &OutboxMessage,
    ) -> Result<PromotionOutcome, DomainError>;

    async fn update_approved(&self, contract: &ApprovedContract) -> Result<(), DomainError>;
}
