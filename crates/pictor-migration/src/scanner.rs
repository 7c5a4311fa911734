//! Local image discovery.
//!
//! Read-only: classifies candidate files without touching session state,
//! so a scan may run at any time, including before any session exists.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs;

use pictor_core::{DomainResult, ProblematicImage, ScanResult};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Only consider files modified after this instant.
    pub modified_after: Option<DateTime<Utc>>,
    /// Read every candidate and verify it is non-empty; when a `.sha256`
    /// sidecar exists, verify the digest against it.
    pub validate_integrity: bool,
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

async fn collect_files(root: &Path) -> DomainResult<Vec<std::path::PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if is_image_file(&path) {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

async fn check_integrity(path: &Path) -> Result<(), String> {
    let data = match fs::read(path).await {
        Ok(data) => data,
        Err(e) => return Err(format!("unreadable: {}", e)),
    };
    if data.is_empty() {
        return Err("empty file".to_string());
    }

    // Optional sidecar digest, e.g. photo.jpg.sha256 holding the hex hash.
    let sidecar = path.with_extension(format!(
        "{}.sha256",
        path.extension().and_then(|e| e.to_str()).unwrap_or("")
    ));
    if let Ok(expected) = fs::read_to_string(&sidecar).await {
        let actual = format!("{:x}", Sha256::digest(&data));
        let expected = expected.split_whitespace().next().unwrap_or("");
        if !expected.eq_ignore_ascii_case(&actual) {
            return Err("checksum mismatch".to_string());
        }
    }
    Ok(())
}

/// Enumerate candidate local files under `root` and classify each as
/// ready-to-migrate or problematic. A missing root yields an empty result
/// rather than an error.
pub async fn scan_local_images(root: &Path, options: &ScanOptions) -> DomainResult<ScanResult> {
    let start = std::time::Instant::now();
    let scan_time = Utc::now();

    if !fs::try_exists(root).await.unwrap_or(false) {
        tracing::warn!(root = %root.display(), "Scan root does not exist");
        return Ok(ScanResult {
            total_images: 0,
            ready_to_migrate: Vec::new(),
            problematic_images: Vec::new(),
            scan_time,
            scan_duration_ms: start.elapsed().as_millis() as u64,
        });
    }

    let files = collect_files(root).await?;
    let mut ready = Vec::new();
    let mut problematic = Vec::new();

    for path in files {
        let display = path.display().to_string();

        let meta = match fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(e) => {
                problematic.push(ProblematicImage {
                    path: display,
                    reason: format!("metadata unavailable: {}", e),
                });
                continue;
            }
        };

        if let Some(cutoff) = options.modified_after {
            let modified = meta.modified().ok().map(DateTime::<Utc>::from);
            match modified {
                Some(m) if m > cutoff => {}
                _ => continue,
            }
        }

        if options.validate_integrity {
            if let Err(reason) = check_integrity(&path).await {
                problematic.push(ProblematicImage {
                    path: display,
                    reason,
                });
                continue;
            }
        } else if meta.len() == 0 {
            problematic.push(ProblematicImage {
                path: display,
                reason: "empty file".to_string(),
            });
            continue;
        }

        ready.push(display);
    }

    let result = ScanResult {
        total_images: ready.len() + problematic.len(),
        ready_to_migrate: ready,
        problematic_images: problematic,
        scan_time,
        scan_duration_ms: start.elapsed().as_millis() as u64,
    };

    tracing::info!(
        root = %root.display(),
        total = result.total_images,
        ready = result.ready_to_migrate.len(),
        problematic = result.problematic_images.len(),
        duration_ms = result.scan_duration_ms,
        "Local image scan complete"
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn write(dir: &Path, name: &str, data: &[u8]) {
        fs::write(dir.join(name), data).await.unwrap();
    }

    #[tokio::test]
    async fn test_scan_classifies_files() {
        let dir = tempdir().unwrap();
        write(dir.path(), "good.jpg", b"bytes").await;
        write(dir.path(), "empty.png", b"").await;
        write(dir.path(), "notes.txt", b"ignored").await;

        let result = scan_local_images(dir.path(), &ScanOptions::default())
            .await
            .unwrap();

        assert_eq!(result.total_images, 2);
        assert_eq!(result.ready_to_migrate.len(), 1);
        assert!(result.ready_to_migrate[0].ends_with("good.jpg"));
        assert_eq!(result.problematic_images.len(), 1);
        assert_eq!(result.problematic_images[0].reason, "empty file");
    }

    #[tokio::test]
    async fn test_scan_recurses_subdirectories() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).await.unwrap();
        write(&dir.path().join("nested"), "deep.webp", b"x").await;

        let result = scan_local_images(dir.path(), &ScanOptions::default())
            .await
            .unwrap();
        assert_eq!(result.ready_to_migrate.len(), 1);
    }

    #[tokio::test]
    async fn test_scan_missing_root_is_empty() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        let result = scan_local_images(&missing, &ScanOptions::default())
            .await
            .unwrap();
        assert_eq!(result.total_images, 0);
    }

    #[tokio::test]
    async fn test_checksum_sidecar_mismatch_is_problematic() {
        let dir = tempdir().unwrap();
        write(dir.path(), "photo.jpg", b"payload").await;
        write(dir.path(), "photo.jpg.sha256", b"deadbeef").await;

        let options = ScanOptions {
            validate_integrity: true,
            ..ScanOptions::default()
        };
        let result = scan_local_images(dir.path(), &options).await.unwrap();

        assert_eq!(result.ready_to_migrate.len(), 0);
        assert_eq!(result.problematic_images.len(), 1);
        assert_eq!(result.problematic_images[0].reason, "checksum mismatch");
    }

    #[tokio::test]
    async fn test_checksum_sidecar_match_is_ready() {
        let dir = tempdir().unwrap();
        write(dir.path(), "photo.jpg", b"payload").await;
        let digest = format!("{:x}", Sha256::digest(b"payload"));
        write(dir.path(), "photo.jpg.sha256", digest.as_bytes()).await;

        let options = ScanOptions {
            validate_integrity: true,
            ..ScanOptions::default()
        };
        let result = scan_local_images(dir.path(), &options).await.unwrap();
        assert_eq!(result.ready_to_migrate.len(), 1);
    }

    #[tokio::test]
    async fn test_modified_after_filters_old_files() {
        let dir = tempdir().unwrap();
        write(dir.path(), "old.jpg", b"x").await;

        let options = ScanOptions {
            modified_after: Some(Utc::now() + chrono::Duration::hours(1)),
            ..ScanOptions::default()
        };
        let result = scan_local_images(dir.path(), &options).await.unwrap();
        assert_eq!(result.total_images, 0);
    }
}
