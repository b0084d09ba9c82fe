//! Database module (PostgreSQL adapters)

pub mod connection;
pub mod postgres;

pub use connection::{create_pool, run_migrations};
pub use postgres::{
    PgContractRepository, PgLandlordRepository, PgOutboxRepository, PgUnitRepository,
};

use lease_core::repositories::Registry;
use sqlx::PgPool;
use std::sync::Arc;

/// Registry whose repositories share one pool.
pub fn postgres_registry(pool: PgPool) -> Registry {
    Registry {
        landlords: Arc::new(PgLandlordRepository::new(pool.clone())),
        units: Arc::new(PgUnitRepository::new(pool.clone())),
        contracts: Arc::new(PgContractRepository::new(pool.clone())),
        outbox: Arc::new(PgOutboxRepository::new(pool)),
    }
}
