//! In-process registry.
//!
//! Backs every repository port with one lock so that multi-record operations
//! (promotion, unit attachment) are atomic. Used by tests and by single-node
//! development setups (`registry.backend = "memory"`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use super::contract_repository::{ContractRepository, InsertOutcome, PromotionOutcome};
use super::landlord_repository::LandlordRepository;
use super::outbox_repository::OutboxRepository;
use super::unit_repository::UnitRepository;
use crate::domain::{
    ApprovedContract, KycStatus, Landlord, OutboxMessage, PendingAssignment, PendingContract, Unit,
};
use crate::error::DomainError;
use crate::hash::DocumentHash;

#[derive(Default)]
struct RegistryState {
    landlords: HashMap<Uuid, Landlord>,
    units: HashMap<Uuid, Unit>,
    pending: HashMap<DocumentHash, PendingContract>,
    approved: HashMap<DocumentHash, ApprovedContract>,
    /// Undelivered messages only; delivery removes the entry.
    outbox: Vec<OutboxMessage>,
}

#[derive(Default)]
pub struct InMemoryRegistry {
    state: RwLock<RegistryState>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_count(&self) -> usize {
        self.state.read().pending.len()
    }

    pub fn approved_count(&self) -> usize {
        self.state.read().approved.len()
    }

    pub fn outbox(&self) -> Vec<OutboxMessage> {
        self.state.read().outbox.clone()
    }

    /// Drop the off-chain approval for a hash, leaving the ledger untouched.
    pub fn forget_approved(&self, doc_hash: &DocumentHash) -> Option<ApprovedContract> {
        self.state.write().approved.remove(doc_hash)
    }
}

#[async_trait]
impl LandlordRepository for InMemoryRegistry {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<Landlord>, DomainError> {
        Ok(self.state.read().landlords.get(id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Landlord>, DomainError> {
        Ok(self
            .state
            .read()
            .landlords
            .values()
            .find(|l| l.name == name)
            .cloned())
    }

    async fn find_approved_by_name(&self, name: &str) -> Result<Option<Landlord>, DomainError> {
        Ok(self
            .state
            .read()
            .landlords
            .values()
            .find(|l| l.name == name && l.kyc_status == KycStatus::Approved)
            .cloned())
    }

    async fn create(&self, landlord: &Landlord) -> Result<Landlord, DomainError> {
        let mut state = self.state.write();
        if state.landlords.values().any(|l| l.email == landlord.email) {
            return Err(DomainError::Validation(format!(
                "An account with email {} already exists",
                landlord.email
            )));
        }
        state.landlords.insert(landlord.id, landlord.clone());
        Ok(landlord.clone())
    }

    async fn update(&self, landlord: &Landlord) -> Result<Landlord, DomainError> {
        let mut state = self.state.write();
        match state.landlords.get_mut(&landlord.id) {
            Some(existing) => {
                *existing = landlord.clone();
                Ok(landlord.clone())
            }
            None => Err(DomainError::NotFound(format!("landlord {}", landlord.id))),
        }
    }
}

#[async_trait]
impl UnitRepository for InMemoryRegistry {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<Unit>, DomainError> {
        Ok(self.state.read().units.get(id).cloned())
    }

    async fn list_by_landlord(&self, landlord_id: &Uuid) -> Result<Vec<Unit>, DomainError> {
        let mut units: Vec<Unit> = self
            .state
            .read()
            .units
            .values()
            .filter(|u| &u.landlord_id == landlord_id)
            .cloned()
            .collect();
        units.sort_by_key(|u| u.created_at);
        Ok(units)
    }

    async fn list_active_by_landlord(&self, landlord_id: &Uuid) -> Result<Vec<Unit>, DomainError> {
        let units = UnitRepository::list_by_landlord(self, landlord_id).await?;
        Ok(units.into_iter().filter(|u| u.is_active()).collect())
    }

    async fn find_by_unit_number(
        &self,
        landlord_id: &Uuid,
        unit_number: &str,
    ) -> Result<Option<Unit>, DomainError> {
        Ok(self
            .state
            .read()
            .units
            .values()
            .find(|u| &u.landlord_id == landlord_id && u.unit_number == unit_number)
            .cloned())
    }

    async fn create(&self, unit: &Unit) -> Result<Unit, DomainError> {
        self.state.write().units.insert(unit.id, unit.clone());
        Ok(unit.clone())
    }

    async fn update(&self, unit: &Unit) -> Result<Unit, DomainError> {
        let mut state = self.state.write();
        match state.units.get_mut(&unit.id) {
            Some(existing) => {
                *existing = unit.clone();
                Ok(unit.clone())
            }
            None => Err(DomainError::NotFound(format!("unit {}", unit.id))),
        }
    }
}

#[async_trait]
impl ContractRepository for InMemoryRegistry {
    async fn find_pending(
        &self,
        doc_hash: &DocumentHash,
    ) -> Result<Option<PendingContract>, DomainError> {
        Ok(self.state.read().pending.get(doc_hash).cloned())
    }

    async fn find_approved(
        &self,
        doc_hash: &DocumentHash,
    ) -> Result<Option<ApprovedContract>, DomainError> {
        Ok(self.state.read().approved.get(doc_hash).cloned())
    }

    async fn insert_pending(&self, contract: &PendingContract) -> Result<InsertOutcome, DomainError> {
        let mut state = self.state.write();
        if state.pending.contains_key(&contract.doc_hash)
            || state.approved.contains_key(&contract.doc_hash)
        {
            return Ok(InsertOutcome::Duplicate);
        }
        state.pending.insert(contract.doc_hash, contract.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn list_pending_for_landlord(
        &self,
        landlord_id: &Uuid,
    ) -> Result<Vec<PendingContract>, DomainError> {
        let mut contracts: Vec<PendingContract> = self
            .state
            .read()
            .pending
            .values()
            .filter(|c| c.is_assigned_to(*landlord_id))
            .cloned()
            .collect();
        contracts.sort_by_key(|c| c.created_at);
        Ok(contracts)
    }

    async fn list_approved_for_landlord(
        &self,
        landlord_id: &Uuid,
    ) -> Result<Vec<ApprovedContract>, DomainError> {
        let mut contracts: Vec<ApprovedContract> = self
            .state
            .read()
            .approved
            .values()
            .filter(|c| &c.landlord_id == landlord_id)
            .cloned()
            .collect();
        contracts.sort_by_key(|c| c.approved_at);
        Ok(contracts)
    }

    async fn attach_new_unit(
        &self,
        contract: &PendingContract,
        unit: &Unit,
    ) -> Result<(), DomainError> {
        let mut state = self.state.write();
        let Some(existing) = state.pending.get_mut(&contract.doc_hash) else {
            return Err(DomainError::NotFound(format!(
                "pending contract {}",
                contract.doc_hash
            )));
        };
        if !matches!(existing.assignment, PendingAssignment::Unmatched { .. }) {
            return Err(DomainError::PreconditionFailed(
                "contract no longer awaits a unit".to_string(),
            ));
        }
        *existing = contract.clone();
        state.units.insert(unit.id, unit.clone());
        Ok(())
    }

    async fn record_invitation(
        &self,
        contract: &PendingContract,
        message: &OutboxMessage,
    ) -> Result<(), DomainError> {
        let mut state = self.state.write();
        let Some(existing) = state.pending.get_mut(&contract.doc_hash) else {
            return Err(DomainError::NotFound(format!(
                "pending contract {}",
                contract.doc_hash
            )));
        };
        *existing = contract.clone();
        state.outbox.push(message.clone());
        Ok(())
    }

    async fn promote(
        &self,
        pending_id: &Uuid,
        approved: &ApprovedContract,
        message: &OutboxMessage,
    ) -> Result<PromotionOutcome, DomainError> {
        let mut state = self.state.write();
        let Some(pending_hash) = state
            .pending
            .values()
            .find(|c| &c.id == pending_id)
            .map(|c| c.doc_hash)
        else {
            return Err(DomainError::NotFound(format!("pending contract {}", pending_id)));
        };

        state.pending.remove(&pending_hash);
        // an identical submission of the corrected text is settled too
        state.pending.remove(&approved.doc_hash);
        if state.approved.contains_key(&approved.doc_hash) {
            return Ok(PromotionOutcome::AlreadyApproved);
        }
        state.approved.insert(approved.doc_hash, approved.clone());
        state.outbox.push(message.clone());
        Ok(PromotionOutcome::Promoted)
    }

    async fn update_approved(&self, contract: &ApprovedContract) -> Result<(), DomainError> {
        let mut state = self.state.write();
        match state.approved.get_mut(&contract.doc_hash) {
            Some(existing) => {
                *existing = contract.clone();
                Ok(())
            }
            None => Err(DomainError::NotFound(format!(
                "approved contract {}",
                contract.doc_hash
            ))),
        }
    }
}

#[async_trait]
impl OutboxRepository for InMemoryRegistry {
    async fn enqueue(&self, message: &OutboxMessage) -> Result<(), DomainError> {
        self.state.write().outbox.push(message.clone());
        Ok(())
    }

    async fn claim_batch(
        &self,
        limit: usize,
        max_attempts: i32,
        claimed_until: DateTime<Utc>,
    ) -> Result<Vec<OutboxMessage>, DomainError> {
        let now = Utc::now();
        let mut state = self.state.write();
        state.outbox.sort_by_key(|m| m.created_at);

        let mut batch = Vec::new();
        for message in state
            .outbox
            .iter_mut()
            .filter(|m| m.is_claimable(max_attempts, now))
            .take(limit)
        {
            message.claimed_until = Some(claimed_until);
            batch.push(message.clone());
        }
        Ok(batch)
    }

    async fn mark_delivered(&self, id: &Uuid) -> Result<(), DomainError> {
        self.state.write().outbox.retain(|m| &m.id != id);
        Ok(())
    }

    async fn mark_failed(&self, id: &Uuid, error: &str) -> Result<(), DomainError> {
        let mut state = self.state.write();
        if let Some(message) = state.outbox.iter_mut().find(|m| &m.id == id) {
            message.attempts += 1;
            message.last_error = Some(error.to_string());
            message.claimed_until = None;
        }
        Ok(())
    }
}
