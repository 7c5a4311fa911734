//! In-memory blob store for tests.
//!
//! Supports injecting per-key failures for put and delete so callers can
//! exercise rollback and partial-failure paths deterministically.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::traits::{BatchDeleteOutcome, BlobStore, StorageError, StorageResult};
use pictor_core::BlobMetadata;

#[derive(Default)]
struct Inner {
    blobs: HashMap<String, (Bytes, String)>,
    fail_put: HashSet<String>,
    fail_delete: HashSet<String>,
}

/// In-memory blob store with failure injection.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `put` for `key` fail.
    pub fn fail_put_on(&self, key: &str) {
        self.inner.lock().unwrap().fail_put.insert(key.to_string());
    }

    /// Make every subsequent `delete` for `key` fail.
    pub fn fail_delete_on(&self, key: &str) {
        self.inner.lock().unwrap().fail_delete.insert(key.to_string());
    }

    /// Check blob presence without going through the async trait (for
    /// test assertions).
    pub fn has_blob(&self, key: &str) -> bool {
        self.inner.lock().unwrap().blobs.contains_key(key)
    }

    pub fn blob_count(&self) -> usize {
        self.inner.lock().unwrap().blobs.len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_put.contains(key) {
            return Err(StorageError::UploadFailed(format!(
                "Injected put failure for {}",
                key
            )));
        }
        inner
            .blobs
            .insert(key.to_string(), (data, content_type.to_string()));
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let inner = self.inner.lock().unwrap();
        inner
            .blobs
            .get(key)
            .map(|(data, _)| data.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_delete.contains(key) {
            return Err(StorageError::DeleteFailed(format!(
                "Injected delete failure for {}",
                key
            )));
        }
        inner.blobs.remove(key);
        Ok(())
    }

    async fn delete_batch(&self, keys: &[String]) -> StorageResult<BatchDeleteOutcome> {
        let mut deleted = 0usize;
        let mut failures = Vec::new();
        for key in keys {
            match self.delete(key).await {
                Ok(()) => deleted += 1,
                Err(e) => failures.push((key.clone(), e.to_string())),
            }
        }
        Ok(BatchDeleteOutcome {
            requested: keys.len(),
            deleted,
            failures,
        })
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.inner.lock().unwrap().blobs.contains_key(key))
    }

    async fn metadata(&self, key: &str) -> StorageResult<BlobMetadata> {
        let inner = self.inner.lock().unwrap();
        let (data, content_type) = inner
            .blobs
            .get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        Ok(BlobMetadata {
            key: key.to_string(),
            size_bytes: data.len() as u64,
            content_type: Some(content_type.clone()),
            last_modified: Some(Utc::now()),
            etag: None,
        })
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let inner = self.inner.lock().unwrap();
        let mut keys: Vec<String> = inner
            .blobs
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn rename(&self, from_key: &str, to_key: &str) -> StorageResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let value = inner
            .blobs
            .remove(from_key)
            .ok_or_else(|| StorageError::NotFound(from_key.to_string()))?;
        inner.blobs.insert(to_key.to_string(), value);
        Ok(())
    }
}
