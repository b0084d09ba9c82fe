//! Reconciliation engine.
//!
//! Takes a contract fingerprint from tenant submission to an on-chain record:
//! landlord and unit resolution, unit ownership verification, canonical
//! re-hashing at approval time and public verification.

mod approval;
mod initiation;
mod lookup;
mod ownership;

#[cfg(test)]
mod tests;

use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::{
    ApprovedContract, ContractStatus, Landlord, PendingContract, Unit, UnitAddress,
    UploadedDocument,
};
use crate::error::DomainError;
use crate::hash::DocumentHash;
use crate::providers::{BlobStorage, DocumentIntelligence, LedgerEntry, LedgerGateway};
use crate::repositories::{PromotionOutcome, Registry};

pub(crate) const CONTRACTS_FOLDER: &str = "pending-contracts";
pub(crate) const TITLE_DEEDS_FOLDER: &str = "verified-title-deeds";
pub(crate) const UTILITY_BILLS_FOLDER: &str = "verified-utility-bills";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Minimum deed authenticity score, inclusive.
    pub authenticity_threshold: f64,
    pub ledger_timeout: Duration,
    /// Lifetime of presigned document links.
    pub read_url_ttl: Duration,
    /// Base of share and login links placed in emails.
    pub public_base_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            authenticity_threshold: 85.0,
            ledger_timeout: Duration::from_secs(60),
            read_url_ttl: Duration::from_secs(3600),
            public_base_url: "http://localhost:5173".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn share_url(&self, doc_hash: &DocumentHash) -> String {
        format!("{}/verify/{}", self.public_base_url.trim_end_matches('/'), doc_hash)
    }

    pub fn login_url(&self) -> String {
        format!("{}/login", self.public_base_url.trim_end_matches('/'))
    }
}

/// Result of a tenant submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum InitiationOutcome {
    AlreadyPending {
        doc_hash: DocumentHash,
    },
    AlreadyApproved {
        doc_hash: DocumentHash,
    },
    /// No KYC-approved landlord carries the extracted name.
    AwaitingLandlordRegistration {
        doc_hash: DocumentHash,
    },
    PendingUnmatchedUnit {
        doc_hash: DocumentHash,
        landlord_id: Uuid,
    },
    /// Matched to a unit that still needs ownership verification.
    PendingAwaitingUnitVerification {
        doc_hash: DocumentHash,
        landlord_id: Uuid,
        unit_id: Uuid,
    },
    PendingReadyForApproval {
        doc_hash: DocumentHash,
        landlord_id: Uuid,
        unit_id: Uuid,
    },
}

impl InitiationOutcome {
    pub fn doc_hash(&self) -> &DocumentHash {
        match self {
            InitiationOutcome::AlreadyPending { doc_hash }
            | InitiationOutcome::AlreadyApproved { doc_hash }
            | InitiationOutcome::AwaitingLandlordRegistration { doc_hash }
            | InitiationOutcome::PendingUnmatchedUnit { doc_hash, .. }
            | InitiationOutcome::PendingAwaitingUnitVerification { doc_hash, .. }
            | InitiationOutcome::PendingReadyForApproval { doc_hash, .. } => doc_hash,
        }
    }

    /// Whether this submission created a new pending record.
    pub fn is_new(&self) -> bool {
        !matches!(
            self,
            InitiationOutcome::AlreadyPending { .. } | InitiationOutcome::AlreadyApproved { .. }
        )
    }

    pub fn message(&self) -> &'static str {
        match self {
            InitiationOutcome::AlreadyPending { .. } => {
                "This document has already been submitted and is awaiting landlord approval."
            }
            InitiationOutcome::AlreadyApproved { .. } => {
                "This document has already been approved and recorded on the blockchain."
            }
            InitiationOutcome::AwaitingLandlordRegistration { .. } => {
                "Landlord not found. Please provide their email to invite them."
            }
            InitiationOutcome::PendingUnmatchedUnit { .. } => {
                "Landlord found. The unit must be added to their portfolio before approval."
            }
            InitiationOutcome::PendingAwaitingUnitVerification { .. } => {
                "Landlord found. The unit must pass ownership verification before approval."
            }
            InitiationOutcome::PendingReadyForApproval { .. } => {
                "Landlord found. Contract sent for approval."
            }
        }
    }
}

/// Landlord-entered details for a new unit.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUnit {
    pub unit_number: String,
    pub address: UnitAddress,
}

/// The two scans required for ownership verification.
#[derive(Debug, Clone)]
pub struct OwnershipDocuments {
    pub title_deed: UploadedDocument,
    pub utility_bill: UploadedDocument,
}

impl OwnershipDocuments {
    pub fn from_uploads(
        title_deed: Option<UploadedDocument>,
        utility_bill: Option<UploadedDocument>,
    ) -> Result<Self, DomainError> {
        match (title_deed, utility_bill) {
            (Some(title_deed), Some(utility_bill))
                if !title_deed.is_empty() && !utility_bill.is_empty() =>
            {
                Ok(Self { title_deed, utility_bill })
            }
            _ => Err(DomainError::PreconditionFailed(
                "both a title deed and a utility bill are required".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub enum UnitVerificationOutcome {
    Verified(Unit),
    /// The entered address differs from the deed; resubmit with `confirmed`.
    NeedsAddressConfirmation {
        user_input_address: String,
        ai_suggested_address: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalReceipt {
    /// Hash of the corrected fingerprint.
    pub doc_hash: DocumentHash,
    pub tx_hash: Option<String>,
    pub share_url: String,
    #[serde(skip)]
    pub outcome: PromotionOutcome,
}

/// Public answer for a hash that exists on the ledger.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicVerification {
    pub doc_hash: DocumentHash,
    pub entry: LedgerEntry,
    pub contract_status: ContractStatus,
    pub tx_hash: Option<String>,
    pub document_url: Option<String>,
    pub fingerprint: Option<String>,
}

/// Result of checking an uploaded copy against the ledger.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentCheck {
    pub verified: bool,
    pub doc_hash: Option<DocumentHash>,
    pub fingerprint: String,
    pub entry: Option<LedgerEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitView {
    pub unit: Unit,
    pub title_deed_url: Option<String>,
    pub utility_bill_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LandlordDashboard {
    pub landlord: Landlord,
    pub units: Vec<UnitView>,
    pub pending: Vec<PendingContract>,
    pub approved: Vec<ApprovedContract>,
}

pub struct ReconciliationEngine {
    registry: Registry,
    intelligence: Arc<dyn DocumentIntelligence>,
    ledger: Arc<dyn LedgerGateway>,
    storage: Arc<dyn BlobStorage>,
    config: EngineConfig,
}

impl ReconciliationEngine {
    pub fn new(
        registry: Registry,
        intelligence: Arc<dyn DocumentIntelligence>,
        ledger: Arc<dyn LedgerGateway>,
        storage: Arc<dyn BlobStorage>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            intelligence,
            ledger,
            storage,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) async fn load_landlord(&self, landlord_id: Uuid) -> Result<Landlord, DomainError> {
        self.registry
            .landlords
            .find_by_id(&landlord_id)
            .await?
            .ok_or_else(|| DomainError::NotFound("Landlord not found".to_string()))
    }

    /// A unit owned by the landlord; other landlords' units are reported as
    /// missing.
    pub(crate) async fn owned_unit(&self, landlord_id: Uuid, unit_id: Uuid) -> Result<Unit, DomainError> {
        self.registry
            .units
            .find_by_id(&unit_id)
            .await?
            .filter(|u| u.landlord_id == landlord_id)
            .ok_or_else(|| {
                DomainError::NotFound("Unit not found or you don't have permission".to_string())
            })
    }

    /// Bound a ledger call by the configured timeout.
    pub(crate) async fn within_ledger_timeout<T, F>(&self, call: F) -> Result<T, DomainError>
    where
        F: Future<Output = Result<T, DomainError>>,
    {
        match tokio::time::timeout(self.config.ledger_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(DomainError::LedgerUnavailable(format!(
                "no confirmation within {}s",
                self.config.ledger_timeout.as_secs()
            ))),
        }
    }
}

pub(crate) fn normalize_email(email: &str) -> Result<String, DomainError> {
    let email = email.trim().to_lowercase();
    if email_address::EmailAddress::is_valid(&email) {
        Ok(email)
    } else {
        Err(DomainError::Validation(format!("'{}' is not a valid email address", email)))
    }
}
