//! Identity-verification (KYC) provider port

use async_trait::async_trait;

use crate::error::DomainError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentitySessionRequest {
    /// Echoed back in the callback; we send the landlord id.
    pub vendor_data: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentitySession {
    pub session_id: String,
    pub redirect_url: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn create_session(
        &self,
        request: &IdentitySessionRequest,
    ) -> Result<IdentitySession, DomainError>;
}
