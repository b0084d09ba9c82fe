//! # Lease Infrastructure
//!
//! Adapters for the core ports: PostgreSQL registry, Gemini document
//! intelligence, HTTP ledger gateway, local blob storage, SMTP mail and the
//! identity-verification provider.

pub mod database;
pub mod gemini;
pub mod identity;
pub mod ledger;
pub mod limiters;
pub mod mailer;
pub mod storage;

pub use database::{
    create_pool, postgres_registry, run_migrations, PgContractRepository, PgLandlordRepository,
    PgOutboxRepository, PgUnitRepository,
};
pub use gemini::{GeminiClient, GeminiConfig};
pub use identity::{IdentityConfig, VeriffClient};
pub use ledger::{HttpLedgerGateway, LedgerConfig};
pub use limiters::Limiters;
pub use mailer::{SmtpConfig, SmtpNotifier};
pub use storage::{LocalBlobStorage, StorageConfig};
