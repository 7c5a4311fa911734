use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::traits::{BatchDeleteOutcome, BlobStore, StorageError, StorageResult};
use pictor_core::BlobMetadata;

/// Local filesystem blob store.
#[derive(Clone)]
pub struct LocalBlobStore {
    base_path: PathBuf,
}

impl LocalBlobStore {
    /// Create a new LocalBlobStore rooted at `base_path`, creating the
    /// directory if needed.
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalBlobStore { base_path })
    }

    /// Convert blob key to filesystem path with traversal validation.
    ///
    /// Keys must not contain `..` segments or start with `/`; anything that
    /// would resolve outside the base directory is rejected.
    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("Blob key is empty".to_string()));
        }
        if key.starts_with('/') || key.split('/').any(|seg| seg == "..") {
            return Err(StorageError::InvalidKey(
                "Blob key contains invalid path segments".to_string(),
            ));
        }
        Ok(self.base_path.join(key))
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Derive a content type from the key's extension; the filesystem has
    /// nowhere to persist the one given at put time.
    fn content_type_from_key(key: &str) -> Option<String> {
        let ext = key.rsplit('.').next()?;
        let ct = match ext {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "gif" => "image/gif",
            "webp" => "image/webp",
            _ => return None,
        };
        Some(ct.to_string())
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        let size = data.len();

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        file.write_all(&data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local blob store put successful"
        );

        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let path = self.key_to_path(key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(key.to_string()));
        }

        let data = fs::read(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to read file {}: {}", path.display(), e))
        })?;

        Ok(Bytes::from(data))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        tracing::info!(key = %key, "Local blob store delete successful");

        Ok(())
    }

    async fn delete_batch(&self, keys: &[String]) -> StorageResult<BatchDeleteOutcome> {
        let mut deleted = 0usize;
        let mut failures = Vec::new();

        for key in keys {
            match self.delete(key).await {
                Ok(()) => deleted += 1,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Batch delete item failed");
                    failures.push((key.clone(), e.to_string()));
                }
            }
        }

        Ok(BatchDeleteOutcome {
            requested: keys.len(),
            deleted,
            failures,
        })
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn metadata(&self, key: &str) -> StorageResult<BlobMetadata> {
        let path = self.key_to_path(key)?;

        let meta = fs::metadata(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(key.to_string())
            } else {
                StorageError::BackendError(e.to_string())
            }
        })?;

        let last_modified = meta
            .modified()
            .ok()
            .map(|t| DateTime::<Utc>::from(t));

        Ok(BlobMetadata {
            key: key.to_string(),
            size_bytes: meta.len(),
            content_type: Self::content_type_from_key(key),
            last_modified,
            etag: None,
        })
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        // Prefix is validated like a key but may name a directory.
        let root = self.key_to_path(prefix)?;
        if !fs::try_exists(&root).await.unwrap_or(false) {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        let mut pending = vec![root];
        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir)
                .await
                .map_err(|e| StorageError::BackendError(e.to_string()))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StorageError::BackendError(e.to_string()))?
            {
                let path = entry.path();
                if path.is_dir() {
                    pending.push(path);
                } else if let Ok(rel) = path.strip_prefix(&self.base_path) {
                    keys.push(rel.to_string_lossy().replace('\\', "/"));
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn rename(&self, from_key: &str, to_key: &str) -> StorageResult<()> {
        let from_path = self.key_to_path(from_key)?;
        let to_path = self.key_to_path(to_key)?;

        if !fs::try_exists(&from_path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(from_key.to_string()));
        }

        self.ensure_parent_dir(&to_path).await?;

        // Copy then delete source, matching the move semantics of remote
        // object stores that have no native rename.
        fs::copy(&from_path, &to_path).await.map_err(|e| {
            StorageError::BackendError(format!(
                "Failed to copy {} to {}: {}",
                from_path.display(),
                to_path.display(),
                e
            ))
        })?;

        fs::remove_file(&from_path).await.map_err(|e| {
            StorageError::DeleteFailed(format!(
                "Failed to remove source {}: {}",
                from_path.display(),
                e
            ))
        })?;

        tracing::info!(from_key = %from_key, to_key = %to_key, "Local blob store rename successful");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let dir = tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path()).await.unwrap();

        let data = Bytes::from_static(b"test data");
        store
            .put("images/abc/original.jpg", data.clone(), "image/jpeg")
            .await
            .unwrap();

        let fetched = store.get("images/abc/original.jpg").await.unwrap();
        assert_eq!(data, fetched);
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path()).await.unwrap();

        let result = store.get("../../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = store.delete("/etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_ok() {
        let dir = tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path()).await.unwrap();

        assert!(store.delete("nonexistent/file.jpg").await.is_ok());
    }

    #[tokio::test]
    async fn test_metadata() {
        let dir = tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path()).await.unwrap();

        store
            .put("images/x/thumb.jpg", Bytes::from_static(b"12345"), "image/jpeg")
            .await
            .unwrap();

        let meta = store.metadata("images/x/thumb.jpg").await.unwrap();
        assert_eq!(meta.size_bytes, 5);
        assert_eq!(meta.content_type.as_deref(), Some("image/jpeg"));
        assert!(meta.last_modified.is_some());

        let missing = store.metadata("images/x/missing.jpg").await;
        assert!(matches!(missing, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_under_prefix() {
        let dir = tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path()).await.unwrap();

        for key in ["images/a/1.jpg", "images/a/2.jpg", "images/b/3.jpg"] {
            store
                .put(key, Bytes::from_static(b"x"), "image/jpeg")
                .await
                .unwrap();
        }

        let keys = store.list("images/a").await.unwrap();
        assert_eq!(keys, vec!["images/a/1.jpg", "images/a/2.jpg"]);

        let empty = store.list("images/none").await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_rename_moves_blob() {
        let dir = tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path()).await.unwrap();

        let data = Bytes::from_static(b"temp upload");
        store.put("tmp/upload.jpg", data.clone(), "image/jpeg").await.unwrap();

        store.rename("tmp/upload.jpg", "images/final.jpg").await.unwrap();

        assert!(!store.exists("tmp/upload.jpg").await.unwrap());
        assert_eq!(store.get("images/final.jpg").await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_delete_batch_counts() {
        let dir = tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path()).await.unwrap();

        store
            .put("images/a.jpg", Bytes::from_static(b"a"), "image/jpeg")
            .await
            .unwrap();

        let keys = vec!["images/a.jpg".to_string(), "images/gone.jpg".to_string()];
        let outcome = store.delete_batch(&keys).await.unwrap();

        // Missing keys are idempotent deletes, so both count as deleted.
        assert_eq!(outcome.requested, 2);
        assert_eq!(outcome.deleted, 2);
        assert!(outcome.all_succeeded());
    }
}
