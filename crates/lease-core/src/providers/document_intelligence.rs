//! Document-understanding service port

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{DeedData, UploadedDocument, UtilityBillData};
use crate::error::DomainError;

/// One of the landlord's units offered to the matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitCandidate {
    pub id: Uuid,
    pub label: String,
}

/// Every call is a single bounded request to an external model. Scoring and
/// comparison fail closed (0 and `false`); extraction fails loudly.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentIntelligence: Send + Sync {
    /// Fingerprint text in the exact codec serialization.
    async fn extract_fingerprint(&self, document: &UploadedDocument) -> Result<String, DomainError>;

    /// Forensic authenticity score in `[0, 100]`; 0 when unavailable.
    async fn check_authenticity(&self, document: &UploadedDocument) -> f64;

    async fn extract_deed_data(&self, document: &UploadedDocument) -> Result<DeedData, DomainError>;

    async fn extract_utility_bill_data(
        &self,
        document: &UploadedDocument,
    ) -> Result<UtilityBillData, DomainError>;

    /// Fuzzy same-property check; `false` on any service error.
    async fn compare_addresses(&self, a: &str, b: &str) -> bool;

    /// Best candidate for the free text, or `None` when not confident.
    async fn find_best_unit_match(&self, query: &str, candidates: &[UnitCandidate]) -> Option<Uuid>;
}

/// Map a model's answer back onto the candidate set. Answers that are not an
/// exact candidate label (including `none`) mean no match.
pub fn resolve_unit_match(answer: &str, candidates: &[UnitCandidate]) -> Option<Uuid> {
    let answer = answer.trim().trim_matches(|c| c == '"' || c == '\'' || c == '`').trim();
    if answer.is_empty() || answer.eq_ignore_ascii_case("none") {
        return None;
    }
    candidates
        .iter()
        .find(|c| c.label == answer)
        .map(|c| c.id)
}
