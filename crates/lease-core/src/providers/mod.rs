//! Provider traits (ports) for external collaborators.
//!
//! Implementations are built once at startup and injected; none of these
//! traits carries session state between calls.

pub mod document_intelligence;
pub mod identity;
pub mod ledger;
pub mod notifier;
pub mod storage;

pub use document_intelligence::{resolve_unit_match, DocumentIntelligence, UnitCandidate};
pub use identity::{IdentityProvider, IdentitySession, IdentitySessionRequest};
pub use ledger::{CommitReceipt, InMemoryLedger, LedgerEntry, LedgerGateway, LedgerRecord};
pub use notifier::Notifier;
pub use storage::BlobStorage;

#[cfg(test)]
pub use document_intelligence::MockDocumentIntelligence;
#[cfg(test)]
pub use ledger::MockLedgerGateway;
#[cfg(test)]
pub use notifier::MockNotifier;
#[cfg(test)]
pub use storage::MockBlobStorage;
#[cfg(test)]
pub use identity::MockIdentityProvider;
