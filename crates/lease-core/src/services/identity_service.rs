//! Landlord identity verification (KYC).
//!
//! Sessions are created with the external provider; decisions arrive later
//! through a signed callback.

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::KycStatus;
use crate::error::DomainError;
use crate::providers::{IdentityProvider, IdentitySessionRequest};
use crate::repositories::LandlordRepository;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Applied { landlord_id: Uuid, status: KycStatus },
    /// Authentic but carries no decision for us.
    Ignored,
}

#[derive(Debug, Deserialize)]
struct CallbackEvent {
    status: String,
    verification: Option<CallbackVerification>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallbackVerification {
    status: String,
    vendor_data: Option<String>,
    person: Option<CallbackPerson>,
    document: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallbackPerson {
    first_name: Option<String>,
    full_name: Option<String>,
    date_of_birth: Option<String>,
}

pub struct IdentityService {
    landlords: Arc<dyn LandlordRepository>,
    provider: Arc<dyn IdentityProvider>,
    shared_secret: String,
}

impl IdentityService {
    pub fn new(
        landlords: Arc<dyn LandlordRepository>,
        provider: Arc<dyn IdentityProvider>,
        shared_secret: String,
    ) -> Self {
        Self {
            landlords,
            provider,
            shared_secret,
        }
    }

    /// Open a verification session and return the provider's redirect URL.
    pub async fn start_session(&self, landlord_id: Uuid) -> Result<String, DomainError> {
        let mut landlord = self
            .landlords
            .find_by_id(&landlord_id)
            .await?
            .ok_or_else(|| DomainError::NotFound("Landlord not found".to_string()))?;

        let (first_name, last_name) = landlord.person_names();
        let session = self
            .provider
            .create_session(&IdentitySessionRequest {
                vendor_data: landlord.id.to_string(),
                first_name,
                last_name,
            })
            .await?;

        landlord.identity_session_id = Some(session.session_id.clone());
        self.landlords.update(&landlord).await?;

        info!("KYC session {} opened for landlord {}", session.session_id, landlord_id);
        Ok(session.redirect_url)
    }

    /// Constant-time check of a hex HMAC-SHA256 over the raw body.
    pub fn verify_signature(&self, raw_body: &[u8], signature: Option<&str>) -> Result<(), DomainError> {
        let signature = signature.ok_or(DomainError::InvalidSignature)?;
        let expected = hex::decode(signature.trim()).map_err(|_| DomainError::InvalidSignature)?;

        let mut mac = HmacSha256::new_from_slice(self.shared_secret.as_bytes())
            .map_err(|e| DomainError::Internal(format!("HMAC key error: {}", e)))?;
        mac.update(raw_body);
        mac.verify_slice(&expected)
            .map_err(|_| DomainError::InvalidSignature)
    }

    /// Apply a provider callback. Unsigned or mis-signed bodies are rejected
    /// before they are parsed.
    pub async fn handle_callback(
        &self,
        raw_body: &[u8],
        signature: Option<&str>,
    ) -> Result<CallbackOutcome, DomainError> {
        if let Err(e) = self.verify_signature(raw_body, signature) {
            warn!("Rejected KYC callback with invalid signature");
            return Err(e);
        }

        let event: CallbackEvent = serde_json::from_slice(raw_body)
            .map_err(|e| DomainError::Validation(format!("malformed callback body: {}", e)))?;

        let Some(verification) = event.verification else {
            return Ok(CallbackOutcome::Ignored);
        };
        let Some(person) = verification
            .person
            .as_ref()
            .filter(|p| p.first_name.as_deref().is_some_and(|n| !n.is_empty()))
        else {
            return Ok(CallbackOutcome::Ignored);
        };
        if event.status != "success" {
            return Ok(CallbackOutcome::Ignored);
        }

        let Some(landlord_id) = verification
            .vendor_data
            .as_deref()
            .and_then(|v| Uuid::parse_str(v).ok())
        else {
            warn!("KYC callback without a usable landlord reference");
            return Ok(CallbackOutcome::Ignored);
        };
        let Some(mut landlord) = self.landlords.find_by_id(&landlord_id).await? else {
            warn!("KYC callback for unknown landlord {}", landlord_id);
            return Ok(CallbackOutcome::Ignored);
        };

        let status = if verification.status == "approved" {
            KycStatus::Approved
        } else {
            KycStatus::Failed
        };
        landlord.kyc_status = status;
        landlord.kyc_data = Some(serde_json::json!({
            "decision": verification.status,
            "fullName": person.full_name,
            "dateOfBirth": person.date_of_birth,
            "address": verification
                .document
                .as_ref()
                .and_then(|d| d.get("address").cloned()),
        }));
        landlord.last_kyc_update = Some(Utc::now());
        self.landlords.update(&landlord).await?;

        info!("KYC decision '{}' recorded for landlord {}", verification.status, landlord_id);
        Ok(CallbackOutcome::Applied { landlord_id, status })
    }
}
