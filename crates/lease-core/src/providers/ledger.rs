//! Ledger gateway port.
//!
//! The ledger is an append-only registry keyed by document hash. Records
//! outlive any off-chain data.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::DomainError;
use crate::hash::DocumentHash;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRecord {
    pub doc_hash: DocumentHash,
    pub landlord_name: String,
    pub unit_info: String,
    pub tenant_name: String,
    pub period_from: String,
    pub period_to: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitReceipt {
    Committed { tx_hash: String },
    /// The hash was already on the ledger; equivalent to success.
    AlreadyRecorded,
}

impl CommitReceipt {
    pub fn tx_hash(&self) -> Option<&str> {
        match self {
            CommitReceipt::Committed { tx_hash } => Some(tx_hash),
            CommitReceipt::AlreadyRecorded => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub landlord_name: String,
    pub unit_info: String,
    pub tenant_name: String,
    pub period_from: String,
    pub period_to: String,
    pub approved_at: DateTime<Utc>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    async fn commit(&self, record: &LedgerRecord) -> Result<CommitReceipt, DomainError>;
    async fn lookup(&self, doc_hash: &DocumentHash) -> Result<Option<LedgerEntry>, DomainError>;
}

/// Process-local ledger for tests and development.
#[derive(Default)]
pub struct InMemoryLedger {
    entries: RwLock<HashMap<DocumentHash, LedgerEntry>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl LedgerGateway for InMemoryLedger {
    async fn commit(&self, record: &LedgerRecord) -> Result<CommitReceipt, DomainError> {
        let mut entries = self.entries.write();
        if entries.contains_key(&record.doc_hash) {
            return Ok(CommitReceipt::AlreadyRecorded);
        }
        entries.insert(
            record.doc_hash,
            LedgerEntry {
                landlord_name: record.landlord_name.clone(),
                unit_info: record.unit_info.clone(),
                tenant_name: record.tenant_name.clone(),
                period_from: record.period_from.clone(),
                period_to: record.period_to.clone(),
                approved_at: Utc::now(),
            },
        );
        Ok(CommitReceipt::Committed {
            tx_hash: DocumentHash::of_text(&format!("tx:{}", record.doc_hash)).to_hex(),
        })
    }

    async fn lookup(&self, doc_hash: &DocumentHash) -> Result<Option<LedgerEntry>, DomainError> {
        Ok(self.entries.read().get(doc_hash).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_ledger_is_append_only() {
        let ledger = InMemoryLedger::new();
        let record = LedgerRecord {
            doc_hash: DocumentHash::of_text("x"),
            landlord_name: "A".into(),
            unit_info: "1, Road, City".into(),
            tenant_name: "B".into(),
            period_from: "01/01/2025".into(),
            period_to: "31/12/2025".into(),
        };

        let first = ledger.commit(&record).await.unwrap();
        assert!(first.tx_hash().is_some());

        let changed = LedgerRecord { tenant_name: "C".into(), ..record.clone() };
        assert_eq!(ledger.commit(&changed).await.unwrap(), CommitReceipt::AlreadyRecorded);

        let entry = ledger.lookup(&record.doc_hash).await.unwrap().unwrap();
        assert_eq!(entry.tenant_name, "B");
        assert!(ledger.lookup(&DocumentHash::of_text("y")).await.unwrap().is_none());
    }
}
