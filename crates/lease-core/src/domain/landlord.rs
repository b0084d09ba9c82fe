//! Landlord domain entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identity verification status reported by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KycStatus {
    #[default]
    Pending,
    Approved,
    Failed,
}

impl KycStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KycStatus::Pending => "pending",
            KycStatus::Approved => "approved",
            KycStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(KycStatus::Pending),
            "approved" => Some(KycStatus::Approved),
            "failed" => Some(KycStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Landlord {
    pub id: Uuid,
    /// Registered full name. Contract matching joins on this exact string.
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub kyc_status: KycStatus,
    pub identity_session_id: Option<String>,
    /// Identity data returned with the last KYC decision, kept for audit.
    pub kyc_data: Option<serde_json::Value>,
    pub last_kyc_update: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Landlord {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into().to_lowercase(),
            phone: None,
            kyc_status: KycStatus::Pending,
            identity_session_id: None,
            kyc_data: None,
            last_kyc_update: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_kyc_approved(&self) -> bool {
        self.kyc_status == KycStatus::Approved
    }

    pub fn require_kyc_approved(&self) -> Result<(), DomainError> {
        if self.is_kyc_approved() {
            Ok(())
        } else {
            Err(DomainError::PreconditionFailed(format!(
                "identity verification must be approved first (current status: {})",
                self.kyc_status.as_str()
            )))
        }
    }

    /// Given and family name as sent to the identity provider.
    pub fn person_names(&self) -> (String, String) {
        let mut parts = self.name.split_whitespace();
        let first = parts.next().unwrap_or_default().to_string();
        let rest = parts.collect::<Vec<_>>().join(" ");
        if rest.is_empty() {
            (first, self.name.clone())
        } else {
            (first, rest)
        }
    }
}
