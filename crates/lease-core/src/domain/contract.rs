//! Pending and approved contract entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::BlobKey;
use crate::error::DomainError;
use crate::fingerprint::Fingerprint;
use crate::hash::DocumentHash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitMatchStatus {
    Matched,
    Unmatched,
    AwaitingLandlordRegistration,
}

impl UnitMatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitMatchStatus::Matched => "matched",
            UnitMatchStatus::Unmatched => "unmatched",
            UnitMatchStatus::AwaitingLandlordRegistration => "awaiting_landlord_registration",
        }
    }
}

/// Who a pending contract is waiting on. A matched contract always names its
/// unit; an unmatched one keeps the raw unit text for later unit creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "unitStatus", rename_all = "snake_case")]
pub enum PendingAssignment {
    AwaitingLandlordRegistration {
        unit_text: String,
        invitee_email: Option<String>,
    },
    Unmatched {
        landlord_id: Uuid,
        unit_text: String,
    },
    Matched {
        landlord_id: Uuid,
        unit_id: Uuid,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingContract {
    pub id: Uuid,
    pub doc_hash: DocumentHash,
    /// Fingerprint text exactly as extracted; `doc_hash` is its hash.
    pub fingerprint: String,
    pub tenant_email: String,
    pub contract_key: BlobKey,
    pub assignment: PendingAssignment,
    pub created_at: DateTime<Utc>,
}

impl PendingContract {
    pub fn new(
        fingerprint: String,
        tenant_email: String,
        contract_key: BlobKey,
        assignment: PendingAssignment,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            doc_hash: DocumentHash::of_text(&fingerprint),
            fingerprint,
            tenant_email,
            contract_key,
            assignment,
            created_at: Utc::now(),
        }
    }

    pub fn parsed(&self) -> Fingerprint {
        Fingerprint::parse(&self.fingerprint)
    }

    pub fn unit_status(&self) -> UnitMatchStatus {
        match self.assignment {
            PendingAssignment::AwaitingLandlordRegistration { .. } => {
                UnitMatchStatus::AwaitingLandlordRegistration
            }
            PendingAssignment::Unmatched { .. } => UnitMatchStatus::Unmatched,
            PendingAssignment::Matched { .. } => UnitMatchStatus::Matched,
        }
    }

    pub fn assigned_landlord_id(&self) -> Option<Uuid> {
        match self.assignment {
            PendingAssignment::AwaitingLandlordRegistration { .. } => None,
            PendingAssignment::Unmatched { landlord_id, .. }
            | PendingAssignment::Matched { landlord_id, .. } => Some(landlord_id),
        }
    }

    pub fn unit_id(&self) -> Option<Uuid> {
        match self.assignment {
            PendingAssignment::Matched { unit_id, .. } => Some(unit_id),
            _ => None,
        }
    }

    pub fn is_assigned_to(&self, landlord_id: Uuid) -> bool {
        self.assigned_landlord_id() == Some(landlord_id)
    }

    /// Attach a freshly created unit to an unmatched contract.
    pub fn attach_unit(&mut self, unit_id: Uuid) -> Result<(), DomainError> {
        match self.assignment {
            PendingAssignment::Unmatched { landlord_id, .. } => {
                self.assignment = PendingAssignment::Matched { landlord_id, unit_id };
                Ok(())
            }
            _ => Err(DomainError::PreconditionFailed(format!(
                "contract is {}, not unmatched",
                self.unit_status().as_str()
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContractStatus {
    #[default]
    Active,
    Terminated,
}

impl ContractStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::Active => "active",
            ContractStatus::Terminated => "terminated",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(ContractStatus::Active),
            "terminated" => Some(ContractStatus::Terminated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovedContract {
    pub id: Uuid,
    /// Hash of the corrected fingerprint; the contract's public identifier.
    pub doc_hash: DocumentHash,
    pub fingerprint: String,
    pub landlord_id: Uuid,
    pub unit_id: Uuid,
    pub tenant_email: String,
    pub contract_key: BlobKey,
    /// `None` when the ledger already held this hash.
    pub tx_hash: Option<String>,
    pub approved_at: DateTime<Utc>,
    pub status: ContractStatus,
    pub terminated_at: Option<DateTime<Utc>>,
}

impl ApprovedContract {
    pub fn terminate(&mut self) {
        self.status = ContractStatus::Terminated;
        self.terminated_at = Some(Utc::now());
    }
}
