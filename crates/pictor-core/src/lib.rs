//! Pictor Core Library
//!
//! Domain models, error taxonomy, configuration, and validation shared
//! across all Pictor components. This crate performs no I/O.

pub mod config;
pub mod error;
pub mod models;
pub mod validation;

// Re-export commonly used types
pub use config::PictorConfig;
pub use error::{DomainError, DomainResult, LogLevel};
pub use models::{
    AssignResult, AtomicUploadResult, BlobMetadata, CleanupResult, EntityType, Image,
    ImageCategory, ImageId, MigratedFile, MigrationConfig, MigrationId, MigrationProgress,
    MigrationSession, MigrationStatus, MoveResult, Partition, ProblematicImage, RemoveResult,
    ReorderResult, ScanResult, ValidationReport,
};
