//! Migration orchestration.
//!
//! Drives one-way transfer of local image files into the blob store.
//! Each migration runs as a background task owned by a session record;
//! callers steer it through pause/resume/cancel and poll progress. The
//! per-file transfer is atomic (all renditions or none), so a killed or
//! cancelled migration leaves no half-written logical image behind.

use bytes::Bytes;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use pictor_core::{
    CleanupResult, DomainError, DomainResult, MigratedFile, MigrationConfig, MigrationId,
    MigrationProgress, MigrationSession, MigrationStatus, PictorConfig, ScanResult,
    ValidationReport,
};
use pictor_processing::{ImageProcessor, RenditionSpec};
use pictor_storage::{AtomicMultiSizeUploader, BlobStore, NamedRendition, UploaderConfig};

use crate::scanner::{scan_local_images, ScanOptions};
use crate::session::SessionStore;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root directory holding the legacy local files.
    pub local_root: PathBuf,
    /// Key prefix for migrated blobs; each file lands under
    /// `{blob_base_path}/{guid}/`.
    pub blob_base_path: String,
    /// Rendition sizes to produce for every migrated file.
    pub rendition_specs: Vec<RenditionSpec>,
    pub uploader: UploaderConfig,
    /// Poll interval while a migration sits in `Paused`.
    pub pause_poll_interval: Duration,
}

impl EngineConfig {
    pub fn new(local_root: impl Into<PathBuf>, blob_base_path: impl Into<String>) -> Self {
        Self {
            local_root: local_root.into(),
            blob_base_path: blob_base_path.into(),
            rendition_specs: RenditionSpec::standard_set(),
            uploader: UploaderConfig::default(),
            pause_poll_interval: Duration::from_millis(100),
        }
    }
}

impl From<&PictorConfig> for EngineConfig {
    fn from(config: &PictorConfig) -> Self {
        Self {
            local_root: PathBuf::from(&config.local_image_root),
            blob_base_path: config.blob_base_path.clone(),
            rendition_specs: RenditionSpec::standard_set(),
            uploader: UploaderConfig::from(config),
            pause_poll_interval: Duration::from_millis(100),
        }
    }
}

enum ItemOutcome {
    Migrated(MigratedFile),
    Failed(String),
    /// Not attempted: the transfer was cancelled (or the session vanished)
    /// before this file's turn.
    Skipped,
}

pub struct MigrationEngine {
    store: Arc<dyn BlobStore>,
    sessions: Arc<dyn SessionStore>,
    processor: Arc<dyn ImageProcessor>,
    config: EngineConfig,
    cancel_tokens: Mutex<HashMap<MigrationId, CancellationToken>>,
}

impl MigrationEngine {
    pub fn new(
        store: Arc<dyn BlobStore>,
        sessions: Arc<dyn SessionStore>,
        processor: Arc<dyn ImageProcessor>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            sessions,
            processor,
            config,
            cancel_tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Read-only scan of the configured local root.
    pub async fn scan(&self, options: &ScanOptions) -> DomainResult<ScanResult> {
        scan_local_images(&self.config.local_root, options).await
    }

    /// Create a session and kick off the background transfer. The returned
    /// session is already stored, so progress is available from the first
    /// poll.
    pub async fn start_migration(
        self: &Arc<Self>,
        config: MigrationConfig,
    ) -> DomainResult<MigrationSession> {
        let session = MigrationSession::new(config);
        let id = session.id;
        self.sessions.put(session.clone()).await?;

        let token = CancellationToken::new();
        self.cancel_tokens.lock().await.insert(id, token.clone());

        tracing::info!(migration_id = %id, "Starting migration");
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.run_transfer(id, token).await;
        });

        Ok(session)
    }

    /// Pause a running migration. Returns false when the session is
    /// unknown or not currently running.
    pub async fn pause_migration(&self, id: MigrationId) -> DomainResult<bool> {
        let paused = self
            .sessions
            .update(
                id,
                Box::new(|s| {
                    if s.status == MigrationStatus::Running {
                        s.status = MigrationStatus::Paused;
                        s.paused_at = Some(Utc::now());
                        true
                    } else {
                        false
                    }
                }),
            )
            .await?;
        if paused {
            tracing::info!(migration_id = %id, "Migration paused");
        }
        Ok(paused)
    }

    /// Resume a paused migration. Returns false when the session is
    /// unknown or not paused.
    pub async fn resume_migration(&self, id: MigrationId) -> DomainResult<bool> {
        let resumed = self
            .sessions
            .update(
                id,
                Box::new(|s| {
                    if s.status == MigrationStatus::Paused {
                        s.status = MigrationStatus::Running;
                        s.paused_at = None;
                        true
                    } else {
                        false
                    }
                }),
            )
            .await?;
        if resumed {
            tracing::info!(migration_id = %id, "Migration resumed");
        }
        Ok(resumed)
    }

    /// Cancel a migration in any non-terminal state. Already-migrated
    /// files stay in the blob store; use [`rollback_migration`] to undo
    /// them. Returns false when the session is unknown or already done.
    ///
    /// [`rollback_migration`]: MigrationEngine::rollback_migration
    pub async fn cancel_migration(&self, id: MigrationId) -> DomainResult<bool> {
        let cancelled = self
            .sessions
            .update(
                id,
                Box::new(|s| {
                    if s.status.is_terminal() {
                        false
                    } else {
                        s.status = MigrationStatus::Cancelled;
                        s.cancelled_at = Some(Utc::now());
                        true
                    }
                }),
            )
            .await?;
        if cancelled {
            if let Some(token) = self.cancel_tokens.lock().await.get(&id) {
                token.cancel();
            }
            tracing::info!(migration_id = %id, "Migration cancelled");
        }
        Ok(cancelled)
    }

    pub async fn progress(&self, id: MigrationId) -> DomainResult<MigrationProgress> {
        let session = self
            .sessions
            .get(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("migration session {}", id)))?;

        let elapsed_seconds = session
            .started_at
            .map(|started| (Utc::now() - started).num_milliseconds() as f64 / 1000.0);

        Ok(MigrationProgress {
            migration_id: session.id,
            status: session.status,
            total_images: session.total_images,
            processed_images: session.processed_images,
            success_count: session.success_count,
            failure_count: session.failure_count,
            percent_complete: session.percent_complete(),
            elapsed_seconds,
        })
    }

    pub async fn list_sessions(&self) -> DomainResult<Vec<MigrationSession>> {
        self.sessions.list().await
    }

    /// Check that every blob key in the session manifest exists in the
    /// store. `validated_count` counts logical files whose keys are all
    /// present.
    pub async fn validate_migration(&self, id: MigrationId) -> DomainResult<ValidationReport> {
        let session = self
            .sessions
            .get(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("migration session {}", id)))?;

        let expected_count = session.migrated_files.len() as u64;
        let mut validated_count = 0u64;
        let mut missing_keys = Vec::new();

        for file in &session.migrated_files {
            let mut all_present = true;
            for key in &file.blob_keys {
                match self.store.exists(key).await {
                    Ok(true) => {}
                    _ => {
                        all_present = false;
                        missing_keys.push(key.clone());
                    }
                }
            }
            if all_present {
                validated_count += 1;
            }
        }

        Ok(ValidationReport {
            is_valid: missing_keys.is_empty(),
            expected_count,
            validated_count,
            missing_keys,
        })
    }

    /// Delete the local source files recorded in the session manifest.
    /// A file already gone counts as deleted.
    pub async fn cleanup_local_files(&self, id: MigrationId) -> DomainResult<CleanupResult> {
        let session = self
            .sessions
            .get(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("migration session {}", id)))?;

        let mut deleted = 0;
        let mut failed_paths = Vec::new();
        for file in &session.migrated_files {
            match tokio::fs::remove_file(&file.source_path).await {
                Ok(()) => deleted += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => deleted += 1,
                Err(e) => {
                    tracing::warn!(path = %file.source_path, error = %e, "Local cleanup failed");
                    failed_paths.push(file.source_path.clone());
                }
            }
        }

        Ok(CleanupResult {
            attempted: session.migrated_files.len(),
            deleted,
            failed_paths,
        })
    }

    /// Delete every blob the session wrote. Returns true only when all
    /// deletes succeeded; on partial failure the manifest is kept so a
    /// retry can converge. Unknown sessions return false.
    pub async fn rollback_migration(&self, id: MigrationId) -> DomainResult<bool> {
        let Some(session) = self.sessions.get(id).await? else {
            return Ok(false);
        };

        let keys: Vec<String> = session
            .migrated_files
            .iter()
            .flat_map(|f| f.blob_keys.iter().cloned())
            .collect();
        if keys.is_empty() {
            return Ok(true);
        }

        let outcome = match self.store.delete_batch(&keys).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(migration_id = %id, error = %e, "Rollback batch delete failed");
                return Ok(false);
            }
        };

        tracing::info!(
            migration_id = %id,
            requested = outcome.requested,
            deleted = outcome.deleted,
            failures = outcome.failures.len(),
            "Migration rollback"
        );

        if outcome.all_succeeded() {
            self.sessions
                .update(
                    id,
                    Box::new(|s| {
                        s.migrated_files.clear();
                        true
                    }),
                )
                .await?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn run_transfer(self: Arc<Self>, id: MigrationId, token: CancellationToken) {
        if let Err(e) = self.transfer_loop(id, &token).await {
            tracing::error!(migration_id = %id, error = %e, "Migration failed");
            let _ = self
                .sessions
                .update(
                    id,
                    Box::new(|s| {
                        if !s.status.is_terminal() {
                            s.status = MigrationStatus::Failed;
                            true
                        } else {
                            false
                        }
                    }),
                )
                .await;
        }
        self.cancel_tokens.lock().await.remove(&id);
    }

    async fn transfer_loop(&self, id: MigrationId, token: &CancellationToken) -> DomainResult<()> {
        let scan = self.scan(&ScanOptions::default()).await?;
        let ready = scan.ready_to_migrate;

        // Move Created → Running; declines when the session was cancelled
        // before this task got scheduled.
        let total = ready.len() as u64;
        let started = self
            .sessions
            .update(
                id,
                Box::new(move |s| {
                    if s.status == MigrationStatus::Created {
                        s.status = MigrationStatus::Running;
                        s.started_at = Some(Utc::now());
                        s.total_images = total;
                        true
                    } else {
                        false
                    }
                }),
            )
            .await?;
        if !started {
            return Ok(());
        }

        let Some(session) = self.sessions.get(id).await? else {
            return Ok(());
        };
        let batch_size = session.batch_size.max(1);
        let max_concurrency = session.max_concurrency.max(1);
        let delete_local = session.delete_local_files_after_migration;

        for chunk in ready.chunks(batch_size) {
            // Pause and cancel are honored per item: a worker about to pick
            // up a file blocks while the session is paused and skips the
            // file once the transfer should stop, so a mid-batch cancel
            // never schedules further uploads.
            let outcomes: Vec<(String, ItemOutcome)> = stream::iter(chunk.iter().cloned())
                .map(|path: String| async move {
                    if !matches!(self.wait_while_paused(id, token).await, Ok(true)) {
                        return (path, ItemOutcome::Skipped);
                    }
                    let outcome = match self.transfer_one(&path).await {
                        Ok(migrated) => ItemOutcome::Migrated(migrated),
                        Err(reason) => ItemOutcome::Failed(reason),
                    };
                    (path, outcome)
                })
                .buffer_unordered(max_concurrency)
                .collect()
                .await;

            for (path, outcome) in outcomes {
                match outcome {
                    ItemOutcome::Migrated(migrated) => {
                        self.sessions
                            .update(
                                id,
                                Box::new(move |s| {
                                    s.processed_images += 1;
                                    s.success_count += 1;
                                    s.migrated_files.push(migrated);
                                    true
                                }),
                            )
                            .await?;
                        if delete_local {
                            if let Err(e) = tokio::fs::remove_file(&path).await {
                                tracing::warn!(path = %path, error = %e, "Failed to delete migrated local file");
                            }
                        }
                    }
                    ItemOutcome::Failed(reason) => {
                        tracing::warn!(migration_id = %id, path = %path, reason = %reason, "File migration failed");
                        self.sessions
                            .update(
                                id,
                                Box::new(|s| {
                                    s.processed_images += 1;
                                    s.failure_count += 1;
                                    true
                                }),
                            )
                            .await?;
                    }
                    ItemOutcome::Skipped => {}
                }
            }

            if token.is_cancelled() {
                return Ok(());
            }
        }

        let completed = self
            .sessions
            .update(
                id,
                Box::new(|s| {
                    if s.status == MigrationStatus::Running {
                        s.status = MigrationStatus::Completed;
                        true
                    } else {
                        false
                    }
                }),
            )
            .await?;
        if completed {
            tracing::info!(migration_id = %id, "Migration completed");
        }
        Ok(())
    }

    /// Block while the session is paused. Returns false when the transfer
    /// should stop (cancelled, removed, or otherwise no longer running).
    async fn wait_while_paused(
        &self,
        id: MigrationId,
        token: &CancellationToken,
    ) -> DomainResult<bool> {
        loop {
            if token.is_cancelled() {
                return Ok(false);
            }
            match self.sessions.get(id).await? {
                Some(s) if s.status == MigrationStatus::Running => return Ok(true),
                Some(s) if s.status == MigrationStatus::Paused => {
                    tokio::time::sleep(self.config.pause_poll_interval).await;
                }
                _ => return Ok(false),
            }
        }
    }

    /// Transfer one local file: read, derive renditions, upload them
    /// atomically. Failure is reported as a reason string and never
    /// aborts the surrounding migration.
    async fn transfer_one(&self, path: &str) -> Result<MigratedFile, String> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| format!("read failed: {}", e))?;

        // Reuse the file stem as the blob guid when it already is one,
        // so re-running a migration targets the same keys.
        let guid = Path::new(path)
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);
        let base_path = format!(
            "{}/{}",
            self.config.blob_base_path.trim_end_matches('/'),
            guid
        );

        let processed = self
            .processor
            .renditions(Bytes::from(data), &self.config.rendition_specs)
            .await
            .map_err(|e| format!("processing failed: {}", e))?;
        let content_type = processed
            .first()
            .map(|r| r.content_type.clone())
            .ok_or_else(|| "no renditions produced".to_string())?;

        let renditions: Vec<NamedRendition> = processed
            .into_iter()
            .map(|r| NamedRendition::new(r.name, r.extension, r.data))
            .collect();

        let uploader =
            AtomicMultiSizeUploader::new(Arc::clone(&self.store), self.config.uploader.clone());
        let result = uploader
            .upload_multiple_sizes(renditions, &base_path, &content_type)
            .await;

        if result.is_success {
            Ok(MigratedFile {
                source_path: path.to_string(),
                blob_keys: result.uploaded_keys,
            })
        } else {
            Err(result
                .error
                .unwrap_or_else(|| "upload failed".to_string()))
        }
    }
}
