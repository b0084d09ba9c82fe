//! Domain errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    /// The document-intelligence service failed or returned unusable data.
    #[error("Document analysis failed: {0}")]
    Extraction(String),

    #[error("Ownership mismatch: the names on the uploaded documents ({deed}, {bill}) do not match your verified profile name ({landlord})")]
    OwnershipMismatch {
        landlord: String,
        deed: String,
        bill: String,
    },

    #[error("Address mismatch: {0}")]
    AddressMismatch(String),

    #[error("Document authenticity score is too low ({0}%)")]
    AuthenticityTooLow(f64),

    #[error("Action required: {0}")]
    PreconditionFailed(String),

    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid callback signature")]
    InvalidSignature,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    /// Failures the caller can retry without changing their input.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DomainError::Extraction(_) | DomainError::LedgerUnavailable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(DomainError::Extraction("empty".into()).is_retryable());
        assert!(DomainError::LedgerUnavailable("timeout".into()).is_retryable());
        assert!(!DomainError::AuthenticityTooLow(12.0).is_retryable());
        assert!(!DomainError::InvalidSignature.is_retryable());
    }

    #[test]
    fn test_ownership_mismatch_names_values() {
        let err = DomainError::OwnershipMismatch {
            landlord: "Somchai Jaidee".into(),
            deed: "somchai jaidee".into(),
            bill: "somchai j.".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Somchai Jaidee"));
        assert!(msg.contains("somchai j."));
    }
}
