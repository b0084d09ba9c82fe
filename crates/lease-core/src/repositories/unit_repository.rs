//! Unit repository trait (port)

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::Unit;
use crate::error::DomainError;

#[async_trait]
pub trait UnitRepository: Send + Sync {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<Unit>, DomainError>;

    /// Every unit the landlord owns, archived ones included.
    async fn list_by_landlord(&self, landlord_id: &Uuid) -> Result<Vec<Unit>, DomainError>;

    async fn list_active_by_landlord(&self, landlord_id: &Uuid) -> Result<Vec<Unit>, DomainError>;

    async fn find_by_unit_number(
        &self,
        landlord_id: &Uuid,
        unit_number: &str,
    ) -> Result<Option<Unit>, DomainError>;

    async fn create(&self, unit: &Unit) -> Result<Unit, DomainError>;
    async fn update(&self, unit: &Unit) -> Result<Unit, DomainError>;
}
