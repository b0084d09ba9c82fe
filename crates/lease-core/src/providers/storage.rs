//! Blob storage port

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::{BlobKey, UploadedDocument};
use crate::error::DomainError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Store the document under a logical folder and return its opaque key.
    async fn put(&self, folder: &str, document: &UploadedDocument) -> Result<BlobKey, DomainError>;

    /// Temporary read URL valid for `ttl`.
    async fn read_url(&self, key: &BlobKey, ttl: Duration) -> Result<String, DomainError>;
}
