//! Atomic multi-rendition uploader.
//!
//! Uploads every derived size of one logical image or none of them. On the
//! first failure all renditions already written are deleted best-effort
//! before failure is returned, so callers never observe a logical image
//! with only some sizes present. A rollback delete that itself fails is
//! logged and reported through `cleanup_completed`, never masking the
//! original failure.

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;

use crate::traits::{BlobStore, StorageError, StorageResult};
use pictor_core::validation::validate_rendition_name;
use pictor_core::{AtomicUploadResult, PictorConfig};

/// One derived size of a logical image, ready to upload.
#[derive(Debug, Clone)]
pub struct NamedRendition {
    /// Rendition name, e.g. "thumbnail", "medium", "original". Becomes the
    /// final path segment of the blob key.
    pub name: String,
    pub extension: String,
    pub data: Bytes,
}

impl NamedRendition {
    pub fn new(name: impl Into<String>, extension: impl Into<String>, data: Bytes) -> Self {
        Self {
            name: name.into(),
            extension: extension.into(),
            data,
        }
    }

    fn key(&self, base_path: &str) -> String {
        format!(
            "{}/{}.{}",
            base_path.trim_end_matches('/'),
            self.name,
            self.extension
        )
    }
}

#[derive(Debug, Clone)]
pub struct UploaderConfig {
    /// Bounded retry count for a single blob write; each retry re-attempts
    /// the whole write.
    pub max_retries: u32,
    /// Fan-out bound for multi-rendition uploads.
    pub fanout: usize,
    /// Delay between retry attempts.
    pub retry_backoff: Duration,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            fanout: 4,
            retry_backoff: Duration::from_millis(50),
        }
    }
}

impl From<&PictorConfig> for UploaderConfig {
    fn from(config: &PictorConfig) -> Self {
        Self {
            max_retries: config.upload_max_retries,
            fanout: config.upload_fanout,
            ..Self::default()
        }
    }
}

pub struct AtomicMultiSizeUploader {
    store: Arc<dyn BlobStore>,
    config: UploaderConfig,
}

impl AtomicMultiSizeUploader {
    pub fn new(store: Arc<dyn BlobStore>, config: UploaderConfig) -> Self {
        Self { store, config }
    }

    /// Upload a single blob, retrying transient failures up to the
    /// configured bound before surfacing a terminal error.
    pub async fn upload_with_retry(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<()> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.store.put(key, data.clone(), content_type).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt <= self.config.max_retries => {
                    tracing::warn!(
                        key = %key,
                        attempt,
                        max_retries = self.config.max_retries,
                        error = %e,
                        "Blob upload failed, retrying"
                    );
                    tokio::time::sleep(self.config.retry_backoff).await;
                }
                Err(e) => {
                    tracing::error!(
                        key = %key,
                        attempts = attempt,
                        error = %e,
                        "Blob upload failed after exhausting retries"
                    );
                    return Err(e);
                }
            }
        }
    }

    /// Upload all renditions of one logical image under `base_path`, or
    /// none. Renditions are written concurrently up to the fan-out bound.
    pub async fn upload_multiple_sizes(
        &self,
        renditions: Vec<NamedRendition>,
        base_path: &str,
        content_type: &str,
    ) -> AtomicUploadResult {
        if renditions.is_empty() {
            return AtomicUploadResult::failure("No renditions to upload", Vec::new(), true);
        }
        for r in &renditions {
            if let Err(e) = validate_rendition_name(&r.name) {
                return AtomicUploadResult::failure(e.to_string(), Vec::new(), true);
            }
        }
        let mut names: Vec<&str> = renditions.iter().map(|r| r.name.as_str()).collect();
        names.sort_unstable();
        if names.windows(2).any(|w| w[0] == w[1]) {
            return AtomicUploadResult::failure(
                "Duplicate rendition names in upload set",
                Vec::new(),
                true,
            );
        }

        let expected = renditions.len();
        let outcomes: Vec<(String, StorageResult<()>)> = stream::iter(renditions)
            .map(|rendition| {
                let key = rendition.key(base_path);
                async move {
                    let result = self
                        .upload_with_retry(&key, rendition.data, content_type)
                        .await;
                    (key, result)
                }
            })
            .buffer_unordered(self.config.fanout.max(1))
            .collect()
            .await;

        let mut written = Vec::new();
        let mut first_error: Option<(String, StorageError)> = None;
        for (key, result) in outcomes {
            match result {
                Ok(()) => written.push(key),
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some((key, e));
                    }
                }
            }
        }

        let Some((failed_key, error)) = first_error else {
            tracing::info!(
                base_path = %base_path,
                rendition_count = written.len(),
                "Atomic multi-size upload complete"
            );
            return AtomicUploadResult::success(written);
        };

        // Roll back every rendition already written for this image.
        tracing::warn!(
            base_path = %base_path,
            failed_key = %failed_key,
            written = written.len(),
            expected,
            error = %error,
            "Multi-size upload failed, rolling back partial writes"
        );

        let mut rolled_back = Vec::new();
        let mut cleanup_completed = true;
        for key in &written {
            match self.store.delete(key).await {
                Ok(()) => rolled_back.push(key.clone()),
                Err(e) => {
                    cleanup_completed = false;
                    tracing::error!(
                        key = %key,
                        error = %e,
                        "Rollback delete failed, blob orphaned"
                    );
                }
            }
        }

        AtomicUploadResult::failure(
            format!(
                "Upload of {} failed after {} of {} renditions written: {}",
                failed_key,
                written.len(),
                expected,
                error
            ),
            rolled_back,
            cleanup_completed,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBlobStore;

    fn uploader(store: &MemoryBlobStore) -> AtomicMultiSizeUploader {
        AtomicMultiSizeUploader::new(
            Arc::new(store.clone()),
            UploaderConfig {
                retry_backoff: Duration::from_millis(1),
                ..UploaderConfig::default()
            },
        )
    }

    fn renditions() -> Vec<NamedRendition> {
        vec![
            NamedRendition::new("thumbnail", "jpg", Bytes::from_static(b"t")),
            NamedRendition::new("medium", "jpg", Bytes::from_static(b"m")),
            NamedRendition::new("original", "jpg", Bytes::from_static(b"o")),
        ]
    }

    #[tokio::test]
    async fn test_all_renditions_uploaded() {
        let store = MemoryBlobStore::new();
        let result = uploader(&store)
            .upload_multiple_sizes(renditions(), "images/abc", "image/jpeg")
            .await;

        assert!(result.is_success);
        assert_eq!(result.uploaded_keys.len(), 3);
        assert!(store.has_blob("images/abc/thumbnail.jpg"));
        assert!(store.has_blob("images/abc/medium.jpg"));
        assert!(store.has_blob("images/abc/original.jpg"));
    }

    #[tokio::test]
    async fn test_failure_rolls_back_all_partial_writes() {
        let store = MemoryBlobStore::new();
        // Fail the last rendition; the other two must be rolled back.
        store.fail_put_on("images/abc/original.jpg");

        let result = uploader(&store)
            .upload_multiple_sizes(renditions(), "images/abc", "image/jpeg")
            .await;

        assert!(!result.is_success);
        assert!(result.cleanup_completed);
        assert_eq!(store.blob_count(), 0);
    }

    #[tokio::test]
    async fn test_rollback_failure_reported_not_masked() {
        let store = MemoryBlobStore::new();
        store.fail_put_on("images/abc/original.jpg");
        store.fail_delete_on("images/abc/thumbnail.jpg");

        let result = uploader(&store)
            .upload_multiple_sizes(renditions(), "images/abc", "image/jpeg")
            .await;

        assert!(!result.is_success);
        assert!(!result.cleanup_completed);
        // The original upload error stays the reported one.
        assert!(result.error.as_deref().unwrap().contains("original.jpg"));
        assert!(store.has_blob("images/abc/thumbnail.jpg"));
    }

    #[tokio::test]
    async fn test_empty_rendition_set_is_validation_failure() {
        let store = MemoryBlobStore::new();
        let result = uploader(&store)
            .upload_multiple_sizes(Vec::new(), "images/abc", "image/jpeg")
            .await;

        assert!(!result.is_success);
        assert_eq!(store.blob_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_rendition_names_rejected() {
        let store = MemoryBlobStore::new();
        let dupes = vec![
            NamedRendition::new("thumbnail", "jpg", Bytes::from_static(b"a")),
            NamedRendition::new("thumbnail", "jpg", Bytes::from_static(b"b")),
        ];
        let result = uploader(&store)
            .upload_multiple_sizes(dupes, "images/abc", "image/jpeg")
            .await;

        assert!(!result.is_success);
        assert_eq!(store.blob_count(), 0);
    }

    #[tokio::test]
    async fn test_upload_with_retry_survives_transient_failure() {
        // MemoryBlobStore failures are persistent, so a key that always
        // fails must exhaust retries and surface the terminal error.
        let store = MemoryBlobStore::new();
        store.fail_put_on("sticky.jpg");

        let result = uploader(&store)
            .upload_with_retry("sticky.jpg", Bytes::from_static(b"x"), "image/jpeg")
            .await;
        assert!(matches!(result, Err(StorageError::UploadFailed(_))));

        let ok = uploader(&store)
            .upload_with_retry("fine.jpg", Bytes::from_static(b"x"), "image/jpeg")
            .await;
        assert!(ok.is_ok());
    }
}
