//! Landlord repository trait (port)

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::Landlord;
use crate::error::DomainError;

#[async_trait]
pub trait LandlordRepository: Send + Sync {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<Landlord>, DomainError>;

    /// Exact registered-name match, any KYC status.
    async fn find_by_name(&self, name: &str) -> Result<Option<Landlord>, DomainError>;

    /// Exact registered-name match restricted to KYC-approved landlords.
    async fn find_approved_by_name(&self, name: &str) -> Result<Option<Landlord>, DomainError>;

    async fn create(&self, landlord: &Landlord) -> Result<Landlord, DomainError>;
    async fn update(&self, landlord: &Landlord) -> Result<Landlord, DomainError>;
}
