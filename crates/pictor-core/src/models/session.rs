use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::PictorConfig;

/// Opaque token identifying one migration job.
pub type MigrationId = Uuid;

/// Migration job lifecycle.
///
/// `Created → Running → {Paused ⇄ Running} → {Completed | Cancelled | Failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationStatus {
    Created,
    Running,
    Paused,
    Completed,
    Cancelled,
    Failed,
}

impl MigrationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MigrationStatus::Completed | MigrationStatus::Cancelled | MigrationStatus::Failed
        )
    }
}

/// Configuration supplied when starting a migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    pub name: String,
    pub batch_size: usize,
    pub max_concurrency: usize,
    pub delete_local_files_after_migration: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            name: "local-to-blob".to_string(),
            batch_size: 50,
            max_concurrency: 4,
            delete_local_files_after_migration: false,
        }
    }
}

impl From<&PictorConfig> for MigrationConfig {
    fn from(config: &PictorConfig) -> Self {
        Self {
            batch_size: config.migration_batch_size,
            max_concurrency: config.migration_max_concurrency,
            ..Self::default()
        }
    }
}

/// One successfully transferred file: the manifest entry that drives
/// rollback and local cleanup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigratedFile {
    /// Local source path the bytes came from.
    pub source_path: String,
    /// Every blob key written for this logical image (one per rendition).
    pub blob_keys: Vec<String>,
}

/// Mutable bookkeeping record of one migration job.
///
/// Held in a volatile session store; durability of already-migrated images
/// lives in the image catalog and the blob store, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationSession {
    pub id: MigrationId,
    pub status: MigrationStatus,
    pub name: String,
    pub batch_size: usize,
    pub max_concurrency: usize,
    pub delete_local_files_after_migration: bool,
    pub total_images: u64,
    pub processed_images: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub migrated_files: Vec<MigratedFile>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl MigrationSession {
    pub fn new(config: MigrationConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: MigrationStatus::Created,
            name: config.name,
            batch_size: config.batch_size,
            max_concurrency: config.max_concurrency,
            delete_local_files_after_migration: config.delete_local_files_after_migration,
            total_images: 0,
            processed_images: 0,
            success_count: 0,
            failure_count: 0,
            migrated_files: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            paused_at: None,
            cancelled_at: None,
        }
    }

    /// Progress percentage. Defined as 0.0 when no totals are known yet,
    /// never a division by zero.
    pub fn percent_complete(&self) -> f64 {
        if self.total_images == 0 {
            return 0.0;
        }
        self.processed_images as f64 / self.total_images as f64 * 100.0
    }
}

/// Point-in-time progress snapshot returned to pollers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationProgress {
    pub migration_id: MigrationId,
    pub status: MigrationStatus,
    pub total_images: u64,
    pub processed_images: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub percent_complete: f64,
    pub elapsed_seconds: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_complete_zero_total() {
        let session = MigrationSession::new(MigrationConfig::default());
        assert_eq!(session.percent_complete(), 0.0);
    }

    #[test]
    fn test_percent_complete_half() {
        let mut session = MigrationSession::new(MigrationConfig::default());
        session.total_images = 100;
        session.processed_images = 50;
        assert!((session.percent_complete() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_migration_config_from_app_config() {
        let app = PictorConfig {
            migration_batch_size: 10,
            migration_max_concurrency: 2,
            ..PictorConfig::default()
        };
        let config = MigrationConfig::from(&app);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.max_concurrency, 2);
        assert!(!config.delete_local_files_after_migration);
    }

    #[test]
    fn test_terminal_states() {
        assert!(MigrationStatus::Completed.is_terminal());
        assert!(MigrationStatus::Cancelled.is_terminal());
        assert!(MigrationStatus::Failed.is_terminal());
        assert!(!MigrationStatus::Created.is_terminal());
        assert!(!MigrationStatus::Running.is_terminal());
        assert!(!MigrationStatus::Paused.is_terminal());
    }
}
