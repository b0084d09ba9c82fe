use std::sync::Arc;
use tracing::{error, info};

use lease_core::repositories::Registry;
use lease_core::services::{IdentityService, OutboxDispatcher, ReconciliationEngine};
use lease_infrastructure::LocalBlobStorage;

use crate::security::ServiceHeaderValidator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Registry,
    pub engine: Arc<ReconciliationEngine>,
    pub identity: Arc<IdentityService>,
    pub dispatcher: Arc<OutboxDispatcher>,
    /// Also held by the engine as a port; handlers use it to serve signed reads.
    pub storage: Arc<LocalBlobStorage>,
    pub header_validator: Arc<ServiceHeaderValidator>,
}

impl AppState {
    /// Deliver queued mail in the background. Failures stay queued.
    pub fn kick_outbox(&self) {
        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move {
            match dispatcher.drain().await {
                Ok(report) if report.delivered + report.failed > 0 => {
                    info!("Outbox drained: {} delivered, {} failed", report.delivered, report.failed)
                }
                Ok(_) => {}
                Err(e) => error!("Outbox drain failed: {}", e),
            }
        });
    }
}
