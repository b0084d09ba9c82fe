use anyhow::Result;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Concurrency caps for outbound calls that are slow or metered.
#[derive(Clone)]
pub struct Limiters {
    pub document_ai: Arc<Semaphore>,
    pub ledger: Arc<Semaphore>,
    pub acquire_timeout: Duration,
}

impl Limiters {
    pub fn new(document_ai_concurrency: usize, ledger_concurrency: usize, acquire_timeout_ms: u64) -> Self {
        Self {
            document_ai: Arc::new(Semaphore::new(document_ai_concurrency.max(1))),
            ledger: Arc::new(Semaphore::new(ledger_concurrency.max(1))),
            acquire_timeout: Duration::from_millis(acquire_timeout_ms.max(1)),
        }
    }

    pub async fn acquire_timed(
        sem: Arc<Semaphore>,
        acquire_timeout: Duration,
        op: &'static str,
    ) -> Result<(OwnedSemaphorePermit, Duration)> {
        let start = Instant::now();

        let permit = tokio::time::timeout(acquire_timeout, sem.acquire_owned())
            .await
            .map_err(|_| anyhow::anyhow!("Limiter acquire timeout for op={}", op))??;

        Ok((permit, start.elapsed()))
    }
}
