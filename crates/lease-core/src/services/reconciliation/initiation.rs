//! Tenant contract submission

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{normalize_email, InitiationOutcome, ReconciliationEngine, CONTRACTS_FOLDER};
use crate::domain::{PendingAssignment, PendingContract, Unit, UploadedDocument};
use crate::error::DomainError;
use crate::fingerprint::Fingerprint;
use crate::hash::DocumentHash;
use crate::providers::UnitCandidate;
use crate::repositories::InsertOutcome;

impl ReconciliationEngine {
    /// Fingerprint a tenant's contract and park it as pending, resolving the
    /// landlord and unit where possible. Resubmitting an identical contract
    /// never creates a second record.
    pub async fn initiate_contract(
        &self,
        document: &UploadedDocument,
        tenant_email: &str,
    ) -> Result<InitiationOutcome, DomainError> {
        if document.is_empty() {
            return Err(DomainError::PreconditionFailed(
                "a contract file is required".to_string(),
            ));
        }
        let tenant_email = normalize_email(tenant_email)?;

        // 1. Extract and hash the fingerprint exactly as returned
        let fingerprint = self.intelligence.extract_fingerprint(document).await?;
        if fingerprint.trim().is_empty() {
            return Err(DomainError::Extraction(
                "no fingerprint could be read from the contract".to_string(),
            ));
        }
        let doc_hash = DocumentHash::of_text(&fingerprint);
        info!("Contract submitted by {} with hash {}", tenant_email, doc_hash);

        // 2. Same hash already known
        if let Some(existing) = self.existing_outcome(&doc_hash).await? {
            info!("Contract {} already registered: {:?}", doc_hash, existing);
            return Ok(existing);
        }

        // 3. Resolve the landlord by registered name
        let details = Fingerprint::parse(&fingerprint);
        if details.has_missing_fields() {
            warn!("Fingerprint for {} is missing fields: {}", doc_hash, details);
        }
        let landlord = self
            .registry
            .landlords
            .find_approved_by_name(&details.landlord_name)
            .await?;

        // 4. Keep the original file
        let contract_key = self.storage.put(CONTRACTS_FOLDER, document).await?;

        // 5. Resolve the unit
        let (assignment, matched_unit) = match landlord {
            None => {
                info!(
                    "No approved landlord named '{}' for contract {}",
                    details.landlord_name, doc_hash
                );
                (
                    PendingAssignment::AwaitingLandlordRegistration {
                        unit_text: details.unit_info.clone(),
                        invitee_email: None,
                    },
                    None,
                )
            }
            Some(landlord) => {
                // Exact name equality is the only evidence for this link.
                info!(
                    "Contract {} linked to landlord {} by exact name match (low confidence)",
                    doc_hash, landlord.id
                );
                match self.match_unit(landlord.id, &details.unit_info).await? {
                    Some(unit) => (
                        PendingAssignment::Matched {
                            landlord_id: landlord.id,
                            unit_id: unit.id,
                        },
                        Some(unit),
                    ),
                    None => (
                        PendingAssignment::Unmatched {
                            landlord_id: landlord.id,
                            unit_text: details.unit_info.clone(),
                        },
                        None,
                    ),
                }
            }
        };

        // 6. Atomic check-then-insert
        let pending = PendingContract::new(fingerprint, tenant_email, contract_key, assignment);
        if self.registry.contracts.insert_pending(&pending).await? == InsertOutcome::Duplicate {
            debug!(
                "Concurrent submission won for {}; stored file {} is orphaned",
                doc_hash, pending.contract_key
            );
            return Ok(self
                .existing_outcome(&doc_hash)
                .await?
                .unwrap_or(InitiationOutcome::AlreadyPending { doc_hash }));
        }

        let outcome = match (&pending.assignment, matched_unit) {
            (PendingAssignment::AwaitingLandlordRegistration { .. }, _) => {
                InitiationOutcome::AwaitingLandlordRegistration { doc_hash }
            }
            (PendingAssignment::Matched { landlord_id, unit_id }, Some(unit)) if unit.is_verified() => {
                InitiationOutcome::PendingReadyForApproval {
                    doc_hash,
                    landlord_id: *landlord_id,
                    unit_id: *unit_id,
                }
            }
            (PendingAssignment::Matched { landlord_id, unit_id }, _) => {
                InitiationOutcome::PendingAwaitingUnitVerification {
                    doc_hash,
                    landlord_id: *landlord_id,
                    unit_id: *unit_id,
                }
            }
            (PendingAssignment::Unmatched { landlord_id, .. }, _) => {
                InitiationOutcome::PendingUnmatchedUnit {
                    doc_hash,
                    landlord_id: *landlord_id,
                }
            }
        };

        info!("Contract {} stored as pending: {:?}", doc_hash, pending.unit_status());
        Ok(outcome)
    }

    async fn existing_outcome(
        &self,
        doc_hash: &DocumentHash,
    ) -> Result<Option<InitiationOutcome>, DomainError> {
        if self.registry.contracts.find_pending(doc_hash).await?.is_some() {
            return Ok(Some(InitiationOutcome::AlreadyPending { doc_hash: *doc_hash }));
        }
        if self.registry.contracts.find_approved(doc_hash).await?.is_some() {
            return Ok(Some(InitiationOutcome::AlreadyApproved { doc_hash: *doc_hash }));
        }
        Ok(None)
    }

    /// Ask the matcher to pick one of the landlord's active units. Answers
    /// outside the candidate set are discarded.
    async fn match_unit(&self, landlord_id: Uuid, unit_text: &str) -> Result<Option<Unit>, DomainError> {
        let units = self.registry.units.list_active_by_landlord(&landlord_id).await?;
        if units.is_empty() {
            return Ok(None);
        }

        let candidates: Vec<UnitCandidate> = units
            .iter()
            .map(|u| UnitCandidate {
                id: u.id,
                label: u.unit_number.clone(),
            })
            .collect();

        let Some(unit_id) = self
            .intelligence
            .find_best_unit_match(unit_text, &candidates)
            .await
        else {
            debug!("No confident unit match for '{}'", unit_text);
            return Ok(None);
        };

        let matched = units.into_iter().find(|u| u.id == unit_id);
        if matched.is_none() {
            warn!("Unit matcher returned {} which is not a candidate", unit_id);
        }
        Ok(matched)
    }
}
