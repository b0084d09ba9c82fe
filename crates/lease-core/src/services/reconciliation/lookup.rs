//! Public verification and landlord views

use futures::future::join_all;
use tracing::{info, warn};
use uuid::Uuid;

use super::{DocumentCheck, LandlordDashboard, PublicVerification, ReconciliationEngine, UnitView};
use crate::domain::{BlobKey, ContractStatus, UploadedDocument};
use crate::error::DomainError;
use crate::fingerprint::Fingerprint;
use crate::hash::DocumentHash;

impl ReconciliationEngine {
    /// Look a hash up on the ledger and join the off-chain record. A hash that
    /// is on the ledger without an approved record is reported as terminated.
    pub async fn public_verify(&self, doc_hash: &DocumentHash) -> Result<PublicVerification, DomainError> {
        let entry = self
            .within_ledger_timeout(self.ledger.lookup(doc_hash))
            .await?
            .ok_or_else(|| {
                DomainError::NotFound(
                    "A verified record for this document was not found on the blockchain"
                        .to_string(),
                )
            })?;

        let Some(approved) = self.registry.contracts.find_approved(doc_hash).await? else {
            warn!("Hash {} is on the ledger without an off-chain record", doc_hash);
            return Ok(PublicVerification {
                doc_hash: *doc_hash,
                entry,
                contract_status: ContractStatus::Terminated,
                tx_hash: None,
                document_url: None,
                fingerprint: None,
            });
        };

        let document_url = self.signed_url(&approved.contract_key).await;
        Ok(PublicVerification {
            doc_hash: *doc_hash,
            entry,
            contract_status: approved.status,
            tx_hash: approved.tx_hash,
            document_url,
            fingerprint: Some(approved.fingerprint),
        })
    }

    /// Check an uploaded copy of a contract: rebuild its corrected fingerprint
    /// from the registered landlord and unit, then look that hash up.
    pub async fn verify_uploaded_document(
        &self,
        document: &UploadedDocument,
    ) -> Result<DocumentCheck, DomainError> {
        if document.is_empty() {
            return Err(DomainError::PreconditionFailed(
                "a contract file is required".to_string(),
            ));
        }

        let fingerprint = self.intelligence.extract_fingerprint(document).await?;
        let details = Fingerprint::parse(&fingerprint);
        let not_verified = |fingerprint: String| DocumentCheck {
            verified: false,
            doc_hash: None,
            fingerprint,
            entry: None,
        };

        let Some(landlord) = self
            .registry
            .landlords
            .find_by_name(&details.landlord_name)
            .await?
        else {
            return Ok(not_verified(fingerprint));
        };
        let Some(unit) = self
            .registry
            .units
            .find_by_unit_number(&landlord.id, details.unit_number_hint())
            .await?
        else {
            return Ok(not_verified(fingerprint));
        };

        let corrected = details.corrected(&landlord.name, &unit.official_unit_info());
        let corrected_hash = DocumentHash::of(&corrected);
        let entry = self
            .within_ledger_timeout(self.ledger.lookup(&corrected_hash))
            .await?;

        match entry {
            Some(entry) => {
                info!("Uploaded document matches ledger entry {}", corrected_hash);
                Ok(DocumentCheck {
                    verified: true,
                    doc_hash: Some(corrected_hash),
                    fingerprint: corrected.serialize(),
                    entry: Some(entry),
                })
            }
            None => Ok(not_verified(fingerprint)),
        }
    }

    pub async fn landlord_dashboard(&self, landlord_id: Uuid) -> Result<LandlordDashboard, DomainError> {
        let landlord = self.load_landlord(landlord_id).await?;

        let (units, pending, approved) = tokio::try_join!(
            self.registry.units.list_by_landlord(&landlord_id),
            self.registry.contracts.list_pending_for_landlord(&landlord_id),
            self.registry.contracts.list_approved_for_landlord(&landlord_id),
        )?;

        let views = join_all(units.into_iter().map(|unit| async move {
            let (title_deed_url, utility_bill_url) = match unit.verification.evidence() {
                Some(evidence) => tokio::join!(
                    self.signed_url(&evidence.title_deed_key),
                    self.signed_url(&evidence.utility_bill_key),
                ),
                None => (None, None),
            };
            UnitView {
                unit,
                title_deed_url,
                utility_bill_url,
            }
        }))
        .await;

        Ok(LandlordDashboard {
            landlord,
            units: views,
            pending,
            approved,
        })
    }

    /// Presigned link to a stored blob owned by the landlord.
    pub async fn document_url(&self, landlord_id: Uuid, key: &BlobKey) -> Result<String, DomainError> {
        let owns_key = self
            .registry
            .contracts
            .list_approved_for_landlord(&landlord_id)
            .await?
            .iter()
            .any(|c| &c.contract_key == key)
            || self
                .registry
                .contracts
                .list_pending_for_landlord(&landlord_id)
                .await?
                .iter()
                .any(|c| &c.contract_key == key);
        if !owns_key {
            return Err(DomainError::NotFound("Document not found".to_string()));
        }
        self.storage.read_url(key, self.config.read_url_ttl).await
    }

    async fn signed_url(&self, key: &BlobKey) -> Option<String> {
        match self.storage.read_url(key, self.config.read_url_ttl).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!("Could not sign read URL for {}: {}", key, e);
                None
            }
        }
    }
}
