//! HTTP client for the ledger gateway service.
//!
//! The gateway fronts the on-chain registry and holds the signing key; this
//! process only ever sees document hashes and the record fields.

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use lease_core::error::DomainError;
use lease_core::hash::DocumentHash;
use lease_core::providers::{CommitReceipt, LedgerEntry, LedgerGateway, LedgerRecord};

use crate::limiters::Limiters;

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_commit_timeout")]
    pub commit_timeout_secs: u64,
    #[serde(default = "default_lookup_timeout")]
    pub lookup_timeout_secs: u64,
    /// Commits in flight at once; the gateway signs with a single key.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_concurrency() -> usize {
    1
}

fn default_commit_timeout() -> u64 {
    60
}

fn default_lookup_timeout() -> u64 {
    15
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitResponse {
    tx_hash: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupResponse {
    exists: bool,
    #[serde(default)]
    landlord_name: String,
    #[serde(default)]
    unit_info: String,
    #[serde(default)]
    tenant_name: String,
    #[serde(default)]
    period_from: String,
    #[serde(default)]
    period_to: String,
    /// Block timestamp, unix seconds.
    #[serde(default)]
    timestamp: i64,
}

pub struct HttpLedgerGateway {
    client: Client,
    config: LedgerConfig,
    limiters: Arc<Limiters>,
}

impl HttpLedgerGateway {
    pub fn new(config: LedgerConfig, limiters: Arc<Limiters>) -> Self {
        Self {
            client: Client::new(),
            config,
            limiters,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

fn unavailable(context: &str, detail: impl std::fmt::Display) -> DomainError {
    error!("Ledger {} failed: {}", context, detail);
    DomainError::LedgerUnavailable("the blockchain ledger could not be reached, try again".to_string())
}

#[async_trait]
impl LedgerGateway for HttpLedgerGateway {
    async fn commit(&self, record: &LedgerRecord) -> Result<CommitReceipt, DomainError> {
        let (_permit, _wait) = Limiters::acquire_timed(
            self.limiters.ledger.clone(),
            self.limiters.acquire_timeout,
            "ledger_commit",
        )
        .await
        .map_err(|e| unavailable("commit", e))?;

        let response = self
            .client
            .post(self.url("/documents"))
            .header("x-api-key", &self.config.api_key)
            .timeout(Duration::from_secs(self.config.commit_timeout_secs.max(1)))
            .json(record)
            .send()
            .await
            .map_err(|e| unavailable("commit", e))?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => {
                let body: CommitResponse = response
                    .json()
                    .await
                    .map_err(|e| unavailable("commit response", e))?;
                info!("Ledger committed {} in tx {}", record.doc_hash, body.tx_hash);
                Ok(CommitReceipt::Committed {
                    tx_hash: body.tx_hash,
                })
            }
            StatusCode::CONFLICT => {
                warn!("Ledger already holds {}", record.doc_hash);
                Ok(CommitReceipt::AlreadyRecorded)
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(unavailable("commit", format!("{} {}", status, body)))
            }
        }
    }

    async fn lookup(&self, doc_hash: &DocumentHash) -> Result<Option<LedgerEntry>, DomainError> {
        let response = self
            .client
            .get(self.url(&format!("/documents/{}", doc_hash)))
            .header("x-api-key", &self.config.api_key)
            .timeout(Duration::from_secs(self.config.lookup_timeout_secs.max(1)))
            .send()
            .await
            .map_err(|e| unavailable("lookup", e))?;

        match response.status() {
            StatusCode::OK => {
                let body: LookupResponse = response
                    .json()
                    .await
                    .map_err(|e| unavailable("lookup response", e))?;
                if !body.exists {
                    return Ok(None);
                }
                let approved_at = DateTime::from_timestamp(body.timestamp, 0)
                    .ok_or_else(|| unavailable("lookup timestamp", body.timestamp))?;
                Ok(Some(LedgerEntry {
                    landlord_name: body.landlord_name,
                    unit_info: body.unit_info,
                    tenant_name: body.tenant_name,
                    period_from: body.period_from,
                    period_to: body.period_to,
                    approved_at,
                }))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(unavailable("lookup", format!("{} {}", status, body)))
            }
        }
    }
}
