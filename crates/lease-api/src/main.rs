use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lease_api::build_router;
use lease_api::config::{RegistryBackend, Settings};
use lease_api::security::ServiceHeaderValidator;
use lease_api::state::AppState;
use lease_core::repositories::{InMemoryRegistry, Registry};
use lease_core::services::{EmailTemplates, IdentityService, OutboxDispatcher, ReconciliationEngine};
use lease_infrastructure::{
    create_pool, postgres_registry, run_migrations, GeminiClient, HttpLedgerGateway, Limiters,
    LocalBlobStorage, SmtpNotifier, VeriffClient,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,lease_api=debug,lease_core=debug")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .init();

    info!("Starting lease API server");

    // Load configuration
    let settings = Settings::load()?;
    info!("Configuration loaded");

    // Registry
    let registry = match settings.registry.backend {
        RegistryBackend::Postgres => {
            let pool = create_pool(
                &settings.database.url,
                settings.database.pool_max_size,
                std::time::Duration::from_secs(settings.database.pool_timeout_seconds),
            )
            .await?;
            run_migrations(&pool).await?;
            info!("Database connection established, migrations applied");
            postgres_registry(pool)
        }
        RegistryBackend::Memory => {
            warn!("Using the in-memory registry; all state is lost on restart");
            Registry::from_backend(Arc::new(InMemoryRegistry::new()))
        }
    };

    // External clients, one per process
    let limiters = Arc::new(Limiters::new(
        settings.gemini.concurrency,
        settings.ledger.concurrency,
        settings.gemini.acquire_timeout_ms,
    ));
    let intelligence = Arc::new(GeminiClient::new(settings.gemini.clone(), limiters.clone()));
    let ledger = Arc::new(HttpLedgerGateway::new(settings.ledger.clone(), limiters));
    let storage = Arc::new(LocalBlobStorage::new(&settings.storage));
    let notifier = Arc::new(SmtpNotifier::new(&settings.smtp)?);
    let identity_provider = Arc::new(VeriffClient::new(settings.identity.clone()));

    // Services
    let engine = Arc::new(ReconciliationEngine::new(
        registry.clone(),
        intelligence,
        ledger,
        storage.clone(),
        settings.engine_config(),
    ));
    let identity = Arc::new(IdentityService::new(
        registry.landlords.clone(),
        identity_provider,
        settings.identity.shared_secret.clone(),
    ));
    let dispatcher = Arc::new(OutboxDispatcher::new(
        registry.outbox.clone(),
        notifier,
        EmailTemplates::new()?,
        settings.outbox.batch_size,
        settings.outbox.max_attempts,
    ));

    let header_validator = Arc::new(ServiceHeaderValidator::new(
        settings.security.app_id.clone(),
        settings.security.api_key.clone(),
        settings.signature_enabled(),
        settings.security.timestamp_tolerance,
    ));

    let state = AppState {
        registry,
        engine,
        identity,
        dispatcher,
        storage,
        header_validator,
    };

    // Mail left over from a previous run
    state.kick_outbox();

    let app = build_router(state);

    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
