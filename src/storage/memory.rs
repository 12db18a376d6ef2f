//! Process-local [`BlobStore`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use super::{BlobStore, PresignedUpload, StorageError};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: String,
}

/// Keeps objects in a map; counts backend calls so tests can assert on them.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: RwLock<HashMap<String, StoredObject>>,
    calls: AtomicUsize,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of trait calls served so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Content type recorded for `path`, if stored.
    pub async fn content_type(&self, path: &str) -> Option<String> {
        self.objects
            .read()
            .await
            .get(path)
            .map(|object| object.content_type.clone())
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, path: &str, data: Bytes, content_type: &str) -> Result<(), StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.objects.write().await.insert(
            path.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Bytes, StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.objects
            .read()
            .await
            .get(path)
            .map(|object| object.data.clone())
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    async fn presign_upload(
        &self,
        path: &str,
        ttl: Duration,
    ) -> Result<PresignedUpload, StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let blob_url = self.object_url(path);
        Ok(PresignedUpload {
            upload_url: format!("{blob_url}?expires_in={}", ttl.as_secs()),
            blob_url,
        })
    }

    fn object_url(&self, path: &str) -> String {
        format!("memory://{path}")
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
