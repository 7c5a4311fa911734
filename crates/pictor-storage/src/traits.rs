//! Storage abstraction trait
//!
//! This module defines the BlobStore trait that all storage backends must
//! implement.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use pictor_core::BlobMetadata;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Invalid blob key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Outcome of a batch delete. Per-key failures are collected rather than
/// aborting the batch, so a retry can converge on the remaining keys.
#[derive(Debug, Clone)]
pub struct BatchDeleteOutcome {
    pub requested: usize,
    pub deleted: usize,
    /// (key, error message) for every delete that failed.
    pub failures: Vec<(String, String)>,
}

impl BatchDeleteOutcome {
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Key-value blob storage with path-addressed operations.
///
/// All backends (local filesystem, in-memory) implement this trait so the
/// uploader and migration engine work against any backend without coupling
/// to implementation details.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write a blob at `key`, replacing any existing content.
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()>;

    /// Read a blob's full content.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Delete a blob. Deleting a missing key is Ok, not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Delete many blobs, collecting per-key failures.
    async fn delete_batch(&self, keys: &[String]) -> StorageResult<BatchDeleteOutcome>;

    /// Check whether a blob exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Fetch descriptive metadata for a blob.
    async fn metadata(&self, key: &str) -> StorageResult<BlobMetadata>;

    /// List keys under a prefix.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Move a blob (copy then delete source). Used to promote a temporary
    /// upload-area object into its permanent key.
    async fn rename(&self, from_key: &str, to_key: &str) -> StorageResult<()>;
}
