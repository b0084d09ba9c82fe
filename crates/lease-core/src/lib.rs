//! # Lease Core
//!
//! Domain entities, the contract fingerprint codec, repository and provider
//! ports, and the reconciliation engine for tenant-submitted rental contracts.

pub mod domain;
pub mod error;
pub mod fingerprint;
pub mod hash;
pub mod providers;
pub mod repositories;
pub mod services;

// Re-export domain entities
pub use domain::*;
pub use error::DomainError;
pub use fingerprint::Fingerprint;
pub use hash::DocumentHash;
