//! Blob storage for uploaded spreadsheets.
//!
//! [`BlobStore`] abstracts the object store. [`S3BlobStore`] talks to any
//! S3-compatible service and mints presigned PUT URLs for direct client
//! uploads. [`MemoryBlobStore`] keeps objects in process for tests and local
//! development.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::config::StorageConfig;

pub mod memory;
pub mod s3;

pub use memory::MemoryBlobStore;
pub use s3::S3BlobStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("invalid presign request: {0}")]
    Presign(String),
}

/// A presigned direct-upload target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignedUpload {
    /// Time-limited URL the client PUTs the bytes to
    pub upload_url: String,
    /// Permanent (unsigned) address of the object
    pub blob_url: String,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `path`, replacing any existing object.
    async fn put(&self, path: &str, data: Bytes, content_type: &str) -> Result<(), StorageError>;

    /// Read the whole object at `path`.
    async fn get(&self, path: &str) -> Result<Bytes, StorageError>;

    /// Mint a write-only URL for `path` valid for `ttl`.
    async fn presign_upload(
        &self,
        path: &str,
        ttl: Duration,
    ) -> Result<PresignedUpload, StorageError>;

    /// Permanent (unsigned) address of the object at `path`.
    fn object_url(&self, path: &str) -> String;

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;
}

/// Builds the configured store.
///
/// Returns `None` when no bucket is configured outside the `local`/`test`
/// profiles; blob endpoints then answer "Storage not configured".
pub async fn build_blob_store(
    config: &StorageConfig,
    dev_profile: bool,
) -> Option<Arc<dyn BlobStore>> {
    if config.is_configured() {
        let store = S3BlobStore::from_config(config).await;
        if let Err(err) = store.ensure_bucket().await {
            tracing::warn!(error = %err, "Could not verify storage bucket; continuing");
        }
        return Some(Arc::new(store));
    }

    if dev_profile {
        tracing::warn!(
            "No storage bucket configured; using in-memory blob store (contents are lost on restart)"
        );
        return Some(Arc::new(MemoryBlobStore::new()));
    }

    tracing::warn!("No storage bucket configured; blob endpoints are disabled");
    None
}

/// Blob path for a file uploaded through the API.
pub fn upload_blob_path(tenant_id: Uuid, file_id: Uuid, filename: &str) -> String {
    format!("tenant_{tenant_id}/file_{file_id}/raw/{filename}")
}

/// Blob name for a presigned direct upload, partitioned by tenant and date.
pub fn sas_blob_name(tenant_id: &str, filename: &str, now: DateTime<Utc>) -> String {
    format!(
        "tenant={}/uploads/{}/{}-{}",
        tenant_id,
        now.format("%Y/%m/%d"),
        Uuid::new_v4(),
        safe_filename(filename)
    )
}

/// Strips path separators and whitespace runs from a client-supplied filename.
pub fn safe_filename(filename: &str) -> String {
    filename
        .replace(['/', '\\'], "_")
        .trim()
        .replace(' ', "-")
}
