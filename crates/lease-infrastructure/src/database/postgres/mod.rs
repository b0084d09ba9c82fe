//! PostgreSQL repository implementations

pub mod contract_repo_impl;
pub mod landlord_repo_impl;
pub mod outbox_repo_impl;
pub mod unit_repo_impl;

pub use contract_repo_impl::PgContractRepository;
pub use landlord_repo_impl::PgLandlordRepository;
pub use outbox_repo_impl::PgOutboxRepository;
pub use unit_repo_impl::PgUnitRepository;

use lease_core::error::DomainError;
use tracing::error;

/// Log the driver error and hand back a generic database error.
pub(crate) fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> DomainError {
    move |e| {
        error!("Database error {}: {}", context, e);
        DomainError::Database(format!("failed {}", context))
    }
}

pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map(|d| d.is_unique_violation())
        .unwrap_or(false)
}
