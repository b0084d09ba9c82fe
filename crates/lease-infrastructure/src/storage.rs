//! Filesystem blob storage with HMAC-signed, expiring read URLs.

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

use lease_core::domain::{BlobKey, UploadedDocument};
use lease_core::error::DomainError;
use lease_core::providers::BlobStorage;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub root_dir: PathBuf,
    /// Base the signed `/files/...` URLs are served from.
    pub public_base_url: String,
    pub signing_key: String,
    #[serde(default = "default_read_url_ttl")]
    pub read_url_ttl_secs: u64,
}

fn default_read_url_ttl() -> u64 {
    3600
}

pub struct LocalBlobStorage {
    root: PathBuf,
    public_base_url: String,
    signing_key: Vec<u8>,
}

impl LocalBlobStorage {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            root: config.root_dir.clone(),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
            signing_key: config.signing_key.as_bytes().to_vec(),
        }
    }

    fn mac(&self, key: &str, expires: i64) -> Result<HmacSha256, DomainError> {
        let mut mac = HmacSha256::new_from_slice(&self.signing_key)
            .map_err(|e| DomainError::Internal(format!("HMAC key error: {}", e)))?;
        mac.update(format!("{}:{}", key, expires).as_bytes());
        Ok(mac)
    }

    fn sign(&self, key: &str, expires: i64) -> Result<String, DomainError> {
        Ok(hex::encode(self.mac(key, expires)?.finalize().into_bytes()))
    }

    /// Check a signed read request; the comparison is constant time.
    pub fn verify_read(&self, key: &str, expires: i64, signature: &str) -> Result<(), DomainError> {
        if expires < Utc::now().timestamp() {
            warn!("Expired read link for {}", key);
            return Err(DomainError::InvalidSignature);
        }
        let provided = hex::decode(signature).map_err(|_| DomainError::InvalidSignature)?;
        self.mac(key, expires)?.verify_slice(&provided).map_err(|_| {
            warn!("Bad read signature for {}", key);
            DomainError::InvalidSignature
        })
    }

    /// Resolve a key to a path under the root, refusing anything that escapes it.
    fn path_for(&self, key: &str) -> Result<PathBuf, DomainError> {
        let relative = Path::new(key);
        let clean = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(DomainError::Validation(format!("invalid blob key '{}'", key)));
        }
        Ok(self.root.join(relative))
    }

    pub async fn read(&self, key: &str) -> Result<Vec<u8>, DomainError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(DomainError::NotFound(format!("file {}", key)))
            }
            Err(e) => {
                error!("Failed to read {}: {}", path.display(), e);
                Err(DomainError::Storage("failed to read file".to_string()))
            }
        }
    }
}

/// Extension from a user-supplied file name, reduced to something safe.
fn safe_extension(document: &UploadedDocument) -> String {
    let ext = document.extension();
    if !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        ext
    } else {
        "bin".to_string()
    }
}

pub fn content_type(key: &str) -> &'static str {
    match key.rsplit('.').next().unwrap_or_default() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "heic" => "image/heic",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl BlobStorage for LocalBlobStorage {
    async fn put(&self, folder: &str, document: &UploadedDocument) -> Result<BlobKey, DomainError> {
        let key = format!("{}/{}.{}", folder, Uuid::new_v4(), safe_extension(document));
        let path = self.path_for(&key)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                error!("Failed to create {}: {}", parent.display(), e);
                DomainError::Storage("failed to store file".to_string())
            })?;
        }
        tokio::fs::write(&path, &document.bytes).await.map_err(|e| {
            error!("Failed to write {}: {}", path.display(), e);
            DomainError::Storage("failed to store file".to_string())
        })?;

        debug!("Stored {:?} as {}", document, key);
        Ok(BlobKey(key))
    }

    async fn read_url(&self, key: &BlobKey, ttl: Duration) -> Result<String, DomainError> {
        let expires = Utc::now().timestamp() + ttl.as_secs() as i64;
        Ok(format!(
            "{}/files/{}?expires={}&signature={}",
            self.public_base_url,
            key,
            expires,
            self.sign(key.as_str(), expires)?
        ))
    }
}
