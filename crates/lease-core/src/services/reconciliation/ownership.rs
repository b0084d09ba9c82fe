//! Unit registration and ownership verification

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    NewUnit, OwnershipDocuments, ReconciliationEngine, UnitVerificationOutcome,
    TITLE_DEEDS_FOLDER, UTILITY_BILLS_FOLDER,
};
use crate::domain::{DeedData, Landlord, Unit, UtilityBillData, VerificationEvidence};
use crate::error::DomainError;

/// What the checks established about a pair of ownership documents.
struct OwnershipFindings {
    deed: DeedData,
    bill: UtilityBillData,
    authenticity_score: f64,
}

impl ReconciliationEngine {
    /// Add a unit to the landlord's portfolio, verified from a title deed and
    /// a utility bill in one step.
    ///
    /// When the entered address does not match the deed the unit is not
    /// created and the deed address is offered instead; resubmitting with
    /// `confirmed` accepts the entered details.
    pub async fn register_unit(
        &self,
        landlord_id: Uuid,
        new_unit: NewUnit,
        documents: OwnershipDocuments,
        confirmed: bool,
    ) -> Result<UnitVerificationOutcome, DomainError> {
        if new_unit.unit_number.trim().is_empty() || new_unit.address.street.trim().is_empty() {
            return Err(DomainError::Validation(
                "unit number and street address are required".to_string(),
            ));
        }

        let landlord = self.load_landlord(landlord_id).await?;
        landlord.require_kyc_approved()?;

        let findings = self.check_ownership(&landlord, &documents).await?;

        let mut unit = Unit::new(landlord_id, new_unit.unit_number.trim(), new_unit.address);
        if !confirmed {
            let entered = unit.entered_address();
            let matches_deed = self
                .intelligence
                .compare_addresses(&entered, &findings.deed.property_address)
                .await;
            if !matches_deed {
                info!(
                    "Entered address for new unit of landlord {} differs from deed",
                    landlord_id
                );
                return Ok(UnitVerificationOutcome::NeedsAddressConfirmation {
                    user_input_address: entered,
                    ai_suggested_address: findings.deed.property_address,
                });
            }
        }

        let evidence = self.store_evidence(&documents, findings).await?;
        unit.mark_verified(evidence);
        let unit = self.registry.units.create(&unit).await?;

        info!("Unit {} ({}) registered and verified", unit.id, unit.unit_number);
        Ok(UnitVerificationOutcome::Verified(unit))
    }

    /// Verify ownership of an existing unit. The unit's stored address is
    /// left as is.
    pub async fn verify_unit(
        &self,
        landlord_id: Uuid,
        unit_id: Uuid,
        documents: OwnershipDocuments,
    ) -> Result<Unit, DomainError> {
        let landlord = self.load_landlord(landlord_id).await?;
        landlord.require_kyc_approved()?;

        let mut unit = self.owned_unit(landlord_id, unit_id).await?;
        if !unit.is_active() {
            return Err(DomainError::PreconditionFailed(
                "unit is archived; restore it before verifying".to_string(),
            ));
        }

        let findings = self.check_ownership(&landlord, &documents).await?;
        let evidence = self.store_evidence(&documents, findings).await?;
        unit.mark_verified(evidence);
        let unit = self.registry.units.update(&unit).await?;

        info!("Unit {} ({}) verified", unit.id, unit.unit_number);
        Ok(unit)
    }

    pub async fn archive_unit(&self, landlord_id: Uuid, unit_id: Uuid) -> Result<Unit, DomainError> {
        let mut unit = self.owned_unit(landlord_id, unit_id).await?;
        unit.archive();
        let unit = self.registry.units.update(&unit).await?;
        info!("Unit {} archived", unit.id);
        Ok(unit)
    }

    pub async fn restore_unit(&self, landlord_id: Uuid, unit_id: Uuid) -> Result<Unit, DomainError> {
        let mut unit = self.owned_unit(landlord_id, unit_id).await?;
        unit.restore();
        let unit = self.registry.units.update(&unit).await?;
        info!("Unit {} restored", unit.id);
        Ok(unit)
    }

    /// Authenticity, three-way name agreement, then deed/bill address
    /// agreement. The first failing check decides the error.
    async fn check_ownership(
        &self,
        landlord: &Landlord,
        documents: &OwnershipDocuments,
    ) -> Result<OwnershipFindings, DomainError> {
        // 1. Forensic score of the deed
        let score = self
            .intelligence
            .check_authenticity(&documents.title_deed)
            .await;
        if score.is_nan() || score < self.config.authenticity_threshold {
            warn!(
                "Deed authenticity {} below {} for landlord {}",
                score, self.config.authenticity_threshold, landlord.id
            );
            return Err(DomainError::AuthenticityTooLow(if score.is_nan() { 0.0 } else { score }));
        }

        // 2. Names on deed and bill against the verified profile
        let (deed, bill) = tokio::try_join!(
            self.intelligence.extract_deed_data(&documents.title_deed),
            self.intelligence.extract_utility_bill_data(&documents.utility_bill),
        )?;

        let landlord_name = landlord.name.to_lowercase();
        if deed.owner_name.to_lowercase() != landlord_name
            || bill.name_on_bill.to_lowercase() != landlord_name
        {
            warn!(
                "Ownership names disagree for landlord {}: deed '{}', bill '{}'",
                landlord.id, deed.owner_name, bill.name_on_bill
            );
            return Err(DomainError::OwnershipMismatch {
                landlord: landlord.name.clone(),
                deed: deed.owner_name,
                bill: bill.name_on_bill,
            });
        }

        // 3. Deed and bill describe the same property
        if !self
            .intelligence
            .compare_addresses(&deed.property_address, &bill.address_on_bill)
            .await
        {
            warn!("Deed and bill addresses disagree for landlord {}", landlord.id);
            return Err(DomainError::AddressMismatch(
                "the address on the title deed does not match the address on the utility bill"
                    .to_string(),
            ));
        }

        Ok(OwnershipFindings {
            deed,
            bill,
            authenticity_score: score,
        })
    }

    async fn store_evidence(
        &self,
        documents: &OwnershipDocuments,
        findings: OwnershipFindings,
    ) -> Result<VerificationEvidence, DomainError> {
        let (title_deed_key, utility_bill_key) = tokio::try_join!(
            self.storage.put(TITLE_DEEDS_FOLDER, &documents.title_deed),
            self.storage.put(UTILITY_BILLS_FOLDER, &documents.utility_bill),
        )?;

        Ok(VerificationEvidence {
            title_deed_key,
            utility_bill_key,
            deed: findings.deed,
            bill: findings.bill,
            authenticity_score: findings.authenticity_score,
            verified_at: Utc::now(),
        })
    }
}
