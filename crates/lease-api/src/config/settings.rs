use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

use lease_core::services::EngineConfig;
use lease_infrastructure::{GeminiConfig, IdentityConfig, LedgerConfig, SmtpConfig, StorageConfig};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub security: SecurityConfig,
    pub database: DatabaseConfig,
    pub registry: RegistryConfig,
    pub gemini: GeminiConfig,
    pub ledger: LedgerConfig,
    pub storage: StorageConfig,
    pub smtp: SmtpConfig,
    pub identity: IdentityConfig,
    pub engine: EngineSettings,
    pub outbox: OutboxSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SecurityConfig {
    pub app_id: String,
    pub api_key: String,
    pub request_signature: String,
    pub timestamp_tolerance: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_max_size: u32,
    pub pool_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RegistryBackend {
    Postgres,
    /// Process-local; state is lost on restart.
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RegistryConfig {
    pub backend: RegistryBackend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineSettings {
    pub authenticity_threshold: f64,
    pub public_base_url: String,
    pub ledger_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutboxSettings {
    pub batch_size: usize,
    pub max_attempts: i32,
}

impl Settings {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = std::env::var("APP_CONFIG").unwrap_or_else(|_| "config/settings".to_string());
        let config = Config::builder()
            .add_source(File::with_name(&path).required(true))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            authenticity_threshold: self.engine.authenticity_threshold,
            ledger_timeout: Duration::from_secs(self.engine.ledger_timeout_secs.max(1)),
            read_url_ttl: Duration::from_secs(self.storage.read_url_ttl_secs.max(1)),
            public_base_url: self.engine.public_base_url.clone(),
        }
    }

    pub fn signature_enabled(&self) -> bool {
        self.security.request_signature == "enabled"
    }
}
