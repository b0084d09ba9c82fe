//! Rental unit domain entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::BlobKey;
use crate::error::DomainError;
use crate::fingerprint::leading_segment;

/// Flat verification status as stored and reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Unverified,
    PendingScan,
    VerifiedByAi,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Unverified => "unverified",
            VerificationStatus::PendingScan => "pending_scan",
            VerificationStatus::VerifiedByAi => "verified_by_ai",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "unverified" => Some(VerificationStatus::Unverified),
            "pending_scan" => Some(VerificationStatus::PendingScan),
            "verified_by_ai" => Some(VerificationStatus::VerifiedByAi),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    #[default]
    Active,
    Archived,
}

impl UnitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::Active => "active",
            UnitStatus::Archived => "archived",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(UnitStatus::Active),
            "archived" => Some(UnitStatus::Archived),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UnitAddress {
    pub street: String,
    pub city: String,
    pub province: String,
    pub zip_code: String,
    pub country: String,
}

/// Owner and address read from a title deed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeedData {
    pub owner_name: String,
    pub property_address: String,
}

/// Account holder and service address read from a utility bill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtilityBillData {
    pub name_on_bill: String,
    pub address_on_bill: String,
}

/// Audit trail for a successful ownership verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationEvidence {
    pub title_deed_key: BlobKey,
    pub utility_bill_key: BlobKey,
    pub deed: DeedData,
    pub bill: UtilityBillData,
    pub authenticity_score: f64,
    pub verified_at: DateTime<Utc>,
}

/// Verification state. Evidence exists exactly when the unit is verified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "evidence", rename_all = "snake_case")]
pub enum UnitVerification {
    Unverified,
    PendingScan,
    VerifiedByAi(VerificationEvidence),
}

impl UnitVerification {
    pub fn status(&self) -> VerificationStatus {
        match self {
            UnitVerification::Unverified => VerificationStatus::Unverified,
            UnitVerification::PendingScan => VerificationStatus::PendingScan,
            UnitVerification::VerifiedByAi(_) => VerificationStatus::VerifiedByAi,
        }
    }

    pub fn evidence(&self) -> Option<&VerificationEvidence> {
        match self {
            UnitVerification::VerifiedByAi(evidence) => Some(evidence),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: Uuid,
    pub landlord_id: Uuid,
    pub unit_number: String,
    pub address: UnitAddress,
    pub verification: UnitVerification,
    pub status: UnitStatus,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Unit {
    pub fn new(landlord_id: Uuid, unit_number: impl Into<String>, address: UnitAddress) -> Self {
        Self {
            id: Uuid::new_v4(),
            landlord_id,
            unit_number: unit_number.into(),
            address,
            verification: UnitVerification::Unverified,
            status: UnitStatus::Active,
            archived_at: None,
            created_at: Utc::now(),
        }
    }

    /// Placeholder unit built from the raw unit text of an unmatched contract.
    /// It stays unverified until the landlord scans its deed and bill.
    pub fn from_contract_text(landlord_id: Uuid, unit_text: &str) -> Self {
        let address = UnitAddress {
            street: format!("Details from contract: {}", unit_text),
            ..UnitAddress::default()
        };
        let mut unit = Self::new(landlord_id, leading_segment(unit_text), address);
        unit.verification = UnitVerification::PendingScan;
        unit
    }

    pub fn is_verified(&self) -> bool {
        matches!(self.verification, UnitVerification::VerifiedByAi(_))
    }

    pub fn is_active(&self) -> bool {
        self.status == UnitStatus::Active
    }

    pub fn verification_status(&self) -> VerificationStatus {
        self.verification.status()
    }

    /// Unit text written into corrected fingerprints and on-chain records.
    pub fn official_unit_info(&self) -> String {
        format!(
            "{}, {}, {}",
            self.unit_number, self.address.street, self.address.city
        )
    }

    /// Full address as entered by the landlord, for comparison with a deed.
    pub fn entered_address(&self) -> String {
        format!(
            "{}, {}, {}, {}, {}, {}",
            self.unit_number,
            self.address.street,
            self.address.city,
            self.address.province,
            self.address.zip_code,
            self.address.country
        )
    }

    pub fn mark_verified(&mut self, evidence: VerificationEvidence) {
        self.verification = UnitVerification::VerifiedByAi(evidence);
    }

    pub fn require_verified(&self) -> Result<(), DomainError> {
        if self.is_verified() {
            Ok(())
        } else {
            Err(DomainError::PreconditionFailed(format!(
                "unit '{}' must pass title deed verification before contracts can be approved",
                self.unit_number
            )))
        }
    }

    pub fn archive(&mut self) {
        self.status = UnitStatus::Archived;
        self.archived_at = Some(Utc::now());
    }

    pub fn restore(&mut self) {
        self.status = UnitStatus::Active;
        self.archived_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> UnitAddress {
        UnitAddress {
            street: "285 Soi Sukhumvit 72".into(),
            city: "Samut Prakan".into(),
            province: "Samut Prakan".into(),
            zip_code: "10270".into(),
            country: "Thailand".into(),
        }
    }

    fn evidence() -> VerificationEvidence {
        VerificationEvidence {
            title_deed_key: BlobKey("verified-title-deeds/a.png".into()),
            utility_bill_key: BlobKey("verified-utility-bills/b.png".into()),
            deed: DeedData {
                owner_name: "Somchai Jaidee".into(),
                property_address: "285 Soi Sukhumvit 72".into(),
            },
            bill: UtilityBillData {
                name_on_bill: "Somchai Jaidee".into(),
                address_on_bill: "285 Sukhumvit 72".into(),
            },
            authenticity_score: 97.5,
            verified_at: Utc::now(),
        }
    }

    #[test]
    fn test_official_and_entered_addresses() {
        let unit = Unit::new(Uuid::new_v4(), "279/19", address());
        assert_eq!(unit.official_unit_info(), "279/19, 285 Soi Sukhumvit 72, Samut Prakan");
        assert_eq!(
            unit.entered_address(),
            "279/19, 285 Soi Sukhumvit 72, Samut Prakan, Samut Prakan, 10270, Thailand"
        );
    }

    #[test]
    fn test_from_contract_text() {
        let unit = Unit::from_contract_text(Uuid::new_v4(), "Room 12B, Sathorn Road, Bangkok");
        assert_eq!(unit.unit_number, "Room 12B");
        assert_eq!(unit.address.street, "Details from contract: Room 12B, Sathorn Road, Bangkok");
        assert_eq!(unit.verification_status(), VerificationStatus::PendingScan);
        assert!(!unit.is_verified());
        assert!(unit.require_verified().is_err());
    }

    #[test]
    fn test_verification_carries_evidence() {
        let mut unit = Unit::new(Uuid::new_v4(), "5", address());
        assert!(unit.verification.evidence().is_none());
        unit.mark_verified(evidence());
        assert!(unit.is_verified());
        assert_eq!(unit.verification_status(), VerificationStatus::VerifiedByAi);
        assert_eq!(unit.verification.evidence().unwrap().authenticity_score, 97.5);
    }

    #[test]
    fn test_archive_restore() {
        let mut unit = Unit::new(Uuid::new_v4(), "5", address());
        unit.archive();
        assert!(!unit.is_active());
        assert!(unit.archived_at.is_some());
        unit.restore();
        assert!(unit.is_active());
        assert!(unit.archived_at.is_none());
    }

    #[test]
    fn test_verification_serde_shape() {
        let json = serde_json::to_value(UnitVerification::PendingScan).unwrap();
        assert_eq!(json["status"], "pending_scan");

        let json = serde_json::to_value(UnitVerification::VerifiedByAi(evidence())).unwrap();
        assert_eq!(json["status"], "verified_by_ai");
        assert_eq!(json["evidence"]["deed"]["ownerName"], "Somchai Jaidee");
    }
}
