//! Repository traits (ports)

pub mod contract_repository;
pub mod landlord_repository;
pub mod memory;
pub mod outbox_repository;
pub mod unit_repository;

pub use contract_repository::{ContractRepository, InsertOutcome, PromotionOutcome};
pub use landlord_repository::LandlordRepository;
pub use memory::InMemoryRegistry;
pub use outbox_repository::OutboxRepository;
pub use unit_repository::UnitRepository;

use std::sync::Arc;

/// The repository ports the services need, bundled for injection.
#[derive(Clone)]
pub struct Registry {
    pub landlords: Arc<dyn LandlordRepository>,
    pub units: Arc<dyn UnitRepository>,
    pub contracts: Arc<dyn ContractRepository>,
    pub outbox: Arc<dyn OutboxRepository>,
}

impl Registry {
    /// Use one backend for every port.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: LandlordRepository + UnitRepository + ContractRepository + OutboxRepository + 'static,
    {
        Self {
            landlords: backend.clone(),
            units: backend.clone(),
            contracts: backend.clone(),
            outbox: backend,
        }
    }
}
