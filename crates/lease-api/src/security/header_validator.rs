//! Trust boundary between the web front end and this API.
//!
//! The front end authenticates landlords itself and forwards the result in
//! `X-Landlord-Id`. That header is only believed once the service headers
//! check out, and when signing is on the signature covers it too.

use axum::http::HeaderMap;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::utils::error::ApiError;

type HmacSha256 = Hmac<Sha256>;

pub const APP_ID_HEADER: &str = "X-App-ID";
pub const API_KEY_HEADER: &str = "X-API-Key";
pub const TIMESTAMP_HEADER: &str = "X-Request-Timestamp";
pub const SIGNATURE_HEADER: &str = "X-Request-Signature";
pub const LANDLORD_HEADER: &str = "X-Landlord-Id";

#[derive(Debug, Clone)]
pub struct ServiceHeaderValidator {
    app_id: String,
    api_key: String,
    require_signature: bool,
    /// Accepted clock skew in seconds, either direction.
    max_skew_secs: i64,
}

/// What a protected request proved about its caller.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub app_id: String,
    pub timestamp: i64,
    pub landlord_id: Option<Uuid>,
}

impl ServiceHeaderValidator {
    pub fn new(app_id: String, api_key: String, require_signature: bool, max_skew_secs: i64) -> Self {
        Self {
            app_id,
            api_key,
            require_signature,
            max_skew_secs,
        }
    }

    pub fn validate(&self, headers: &HeaderMap) -> Result<ValidatedRequest, ApiError> {
        let app_id = required(headers, APP_ID_HEADER)?;
        if app_id != self.app_id {
            warn!("Rejected caller app '{}'", app_id);
            return Err(unauthorized("Unknown application"));
        }
        if required(headers, API_KEY_HEADER)? != self.api_key {
            warn!("Rejected API key for app '{}'", app_id);
            return Err(unauthorized("Invalid API key"));
        }

        let timestamp: i64 = required(headers, TIMESTAMP_HEADER)?
            .parse()
            .map_err(|_| unauthorized("Malformed request timestamp"))?;
        let skew = (Utc::now().timestamp() - timestamp).abs();
        if skew > self.max_skew_secs {
            warn!("Request timestamp skewed by {}s", skew);
            return Err(unauthorized("Request timestamp outside the accepted window"));
        }

        let landlord_raw = optional(headers, LANDLORD_HEADER);
        let landlord_id = landlord_raw
            .map(|raw| {
                Uuid::parse_str(raw)
                    .map_err(|_| unauthorized(&format!("Malformed {} header", LANDLORD_HEADER)))
            })
            .transpose()?;

        if self.require_signature {
            let provided = required(headers, SIGNATURE_HEADER)?;
            let payload = signing_payload(app_id, timestamp, landlord_raw.unwrap_or_default());
            if !self.signature_matches(&payload, provided)? {
                warn!("Bad request signature from app '{}'", app_id);
                return Err(unauthorized("Invalid request signature"));
            }
        }

        debug!("Service headers accepted for app '{}'", app_id);
        Ok(ValidatedRequest {
            app_id: app_id.to_string(),
            timestamp,
            landlord_id,
        })
    }

    fn keyed_mac(&self, payload: &str) -> Result<HmacSha256, ApiError> {
        let mut mac = HmacSha256::new_from_slice(self.api_key.as_bytes())
            .map_err(|e| ApiError::InternalError(format!("request signing key: {}", e)))?;
        mac.update(payload.as_bytes());
        Ok(mac)
    }

    fn signature_matches(&self, payload: &str, provided: &str) -> Result<bool, ApiError> {
        match hex::decode(provided) {
            Ok(bytes) => Ok(self.keyed_mac(payload)?.verify_slice(&bytes).is_ok()),
            Err(_) => Ok(false),
        }
    }

    /// Hex signature over `app_id + timestamp + landlord_id` (landlord empty
    /// when absent).
    pub fn sign(&self, app_id: &str, timestamp: i64, landlord_id: Option<Uuid>) -> Result<String, ApiError> {
        let landlord = landlord_id.map(|id| id.to_string()).unwrap_or_default();
        let mac = self.keyed_mac(&signing_payload(app_id, timestamp, &landlord))?;
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

fn signing_payload(app_id: &str, timestamp: i64, landlord: &str) -> String {
    format!("{}{}{}", app_id, timestamp, landlord)
}

fn unauthorized(message: &str) -> ApiError {
    ApiError::Unauthorized(message.to_string())
}

fn optional<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn required<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, ApiError> {
    optional(headers, name).ok_or_else(|| unauthorized(&format!("Missing {} header", name)))
}
