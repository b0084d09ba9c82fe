//! Landlord approval and contract lifecycle

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{normalize_email, ApprovalReceipt, ReconciliationEngine};
use crate::domain::{
    ApprovedContract, ContractStatus, NotificationKind, OutboxMessage, PendingAssignment,
    PendingContract, Unit,
};
use crate::error::DomainError;
use crate::hash::DocumentHash;
use crate::providers::LedgerRecord;
use crate::repositories::PromotionOutcome;

impl ReconciliationEngine {
    /// Re-derive the fingerprint from the landlord's registered name and the
    /// unit's official address, commit its hash to the ledger and promote the
    /// pending record. The pending record survives any failure before the
    /// promotion step.
    pub async fn approve_contract(
        &self,
        landlord_id: Uuid,
        doc_hash: &DocumentHash,
    ) -> Result<ApprovalReceipt, DomainError> {
        info!("Approval requested for {} by landlord {}", doc_hash, landlord_id);

        // 1. Pending record assigned to this landlord
        let pending = self.assigned_pending(landlord_id, doc_hash).await?;

        // 2. Landlord identity and unit ownership
        let landlord = self.load_landlord(landlord_id).await?;
        landlord.require_kyc_approved()?;

        let unit_id = pending.unit_id().ok_or_else(|| {
            DomainError::PreconditionFailed(
                "add this contract's unit to your portfolio before approving".to_string(),
            )
        })?;
        let unit = self.owned_unit(landlord_id, unit_id).await?;
        unit.require_verified()?;

        // 3. Canonical fingerprint
        let official_unit_info = unit.official_unit_info();
        let corrected = pending.parsed().corrected(&landlord.name, &official_unit_info);
        let corrected_hash = DocumentHash::of(&corrected);

        // 4. Ledger commit, bounded
        let record = LedgerRecord {
            doc_hash: corrected_hash,
            landlord_name: corrected.landlord_name.clone(),
            unit_info: corrected.unit_info.clone(),
            tenant_name: corrected.tenant_name.clone(),
            period_from: corrected.period_from.clone(),
            period_to: corrected.period_to.clone(),
        };
        let receipt = self
            .within_ledger_timeout(self.ledger.commit(&record))
            .await
            .map_err(|e| {
                error!("Ledger commit failed for {}: {}", corrected_hash, e);
                e
            })?;
        let tx_hash = receipt.tx_hash().map(str::to_string);
        if tx_hash.is_none() {
            info!("Hash {} was already on the ledger", corrected_hash);
        }

        // 5. Promote and queue the tenant notification in one step
        let share_url = self.config.share_url(&corrected_hash);
        let approved = ApprovedContract {
            id: Uuid::new_v4(),
            doc_hash: corrected_hash,
            fingerprint: corrected.serialize(),
            landlord_id,
            unit_id: unit.id,
            tenant_email: pending.tenant_email.clone(),
            contract_key: pending.contract_key.clone(),
            tx_hash: tx_hash.clone(),
            approved_at: Utc::now(),
            status: ContractStatus::Active,
            terminated_at: None,
        };
        let message = OutboxMessage::new(
            pending.tenant_email.clone(),
            NotificationKind::ContractApproved {
                doc_hash: corrected_hash,
                details: corrected,
                share_url: share_url.clone(),
            },
        );

        let outcome = match self
            .registry
            .contracts
            .promote(&pending.id, &approved, &message)
            .await
        {
            Ok(outcome) => outcome,
            // a concurrent approval of the same pending record got there first
            Err(DomainError::NotFound(reason)) => {
                return self
                    .settled_approval(landlord_id, &corrected_hash, share_url)
                    .await?
                    .ok_or(DomainError::NotFound(reason));
            }
            Err(e) => return Err(e),
        };
        if outcome == PromotionOutcome::AlreadyApproved {
            warn!(
                "Pending {} canonicalized to already-approved {}; kept existing record",
                doc_hash, corrected_hash
            );
        }

        info!(
            "Contract {} approved as {} (tx {:?})",
            doc_hash, corrected_hash, tx_hash
        );
        Ok(ApprovalReceipt {
            doc_hash: corrected_hash,
            tx_hash,
            share_url,
            outcome,
        })
    }

    /// Receipt for a hash this landlord already holds an approval for.
    async fn settled_approval(
        &self,
        landlord_id: Uuid,
        corrected_hash: &DocumentHash,
        share_url: String,
    ) -> Result<Option<ApprovalReceipt>, DomainError> {
        let existing = self
            .registry
            .contracts
            .find_approved(corrected_hash)
            .await?
            .filter(|c| c.landlord_id == landlord_id);

        Ok(existing.map(|contract| {
            info!(
                "Contract {} was approved concurrently; returning existing record",
                corrected_hash
            );
            ApprovalReceipt {
                doc_hash: contract.doc_hash,
                tx_hash: contract.tx_hash,
                share_url,
                outcome: PromotionOutcome::AlreadyApproved,
            }
        }))
    }

    /// Create a placeholder unit from an unmatched contract's unit text and
    /// attach it. The unit must still be verified before approval.
    pub async fn approve_and_create_unit(
        &self,
        landlord_id: Uuid,
        doc_hash: &DocumentHash,
    ) -> Result<Unit, DomainError> {
        let mut pending = self
            .registry
            .contracts
            .find_pending(doc_hash)
            .await?
            .filter(|c| c.is_assigned_to(landlord_id))
            .ok_or_else(|| DomainError::NotFound("No unmatched pending contract found".to_string()))?;

        let PendingAssignment::Unmatched { unit_text, .. } = &pending.assignment else {
            return Err(DomainError::NotFound(
                "No unmatched pending contract found".to_string(),
            ));
        };

        let unit = Unit::from_contract_text(landlord_id, unit_text);
        pending.attach_unit(unit.id)?;
        self.registry.contracts.attach_new_unit(&pending, &unit).await?;

        info!(
            "Unit '{}' ({}) created from contract {}",
            unit.unit_number, unit.id, doc_hash
        );
        Ok(unit)
    }

    /// Mark an approved contract terminated. The ledger entry is permanent;
    /// only the off-chain status changes.
    pub async fn terminate_contract(
        &self,
        landlord_id: Uuid,
        doc_hash: &DocumentHash,
    ) -> Result<ApprovedContract, DomainError> {
        let mut contract = self
            .registry
            .contracts
            .find_approved(doc_hash)
            .await?
            .filter(|c| c.landlord_id == landlord_id)
            .ok_or_else(|| {
                DomainError::NotFound(
                    "Approved contract not found or you don't have permission".to_string(),
                )
            })?;

        if contract.status == ContractStatus::Terminated {
            return Ok(contract);
        }

        contract.terminate();
        self.registry.contracts.update_approved(&contract).await?;
        info!("Contract {} terminated by landlord {}", doc_hash, landlord_id);
        Ok(contract)
    }

    /// Invite an unregistered landlord to review a contract that found no
    /// landlord at submission.
    pub async fn send_invitation(
        &self,
        doc_hash: &DocumentHash,
        landlord_email: &str,
    ) -> Result<(), DomainError> {
        let landlord_email = normalize_email(landlord_email)?;

        let mut pending = self
            .registry
            .contracts
            .find_pending(doc_hash)
            .await?
            .ok_or_else(|| {
                DomainError::NotFound("No pending contract found for that document hash".to_string())
            })?;

        let PendingAssignment::AwaitingLandlordRegistration { invitee_email, .. } =
            &mut pending.assignment
        else {
            return Err(DomainError::PreconditionFailed(
                "this contract is already assigned to a registered landlord".to_string(),
            ));
        };
        *invitee_email = Some(landlord_email.clone());

        let message = OutboxMessage::new(
            landlord_email.clone(),
            NotificationKind::LandlordInvitation {
                doc_hash: *doc_hash,
                fingerprint: pending.fingerprint.clone(),
                login_url: self.config.login_url(),
            },
        );
        self.registry.contracts.record_invitation(&pending, &message).await?;

        info!("Invitation for {} queued to {}", doc_hash, landlord_email);
        Ok(())
    }

    async fn assigned_pending(
        &self,
        landlord_id: Uuid,
        doc_hash: &DocumentHash,
    ) -> Result<PendingContract, DomainError> {
        self.registry
            .contracts
            .find_pending(doc_hash)
            .await?
            .filter(|c| c.is_assigned_to(landlord_id))
            .ok_or_else(|| DomainError::NotFound("No matching pending contract found".to_string()))
    }
}
