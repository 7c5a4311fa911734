//! Domain models shared across Pictor components.

pub mod blob;
pub mod image;
pub mod results;
pub mod session;

pub use blob::BlobMetadata;
pub use image::{EntityType, Image, ImageCategory, ImageId, Partition};
pub use results::{
    AssignResult, AtomicUploadResult, CleanupResult, MoveResult, ProblematicImage, RemoveResult,
    ReorderResult, ScanResult, ValidationReport,
};
pub use session::{
    MigratedFile, MigrationConfig, MigrationId, MigrationProgress, MigrationSession,
    MigrationStatus,
};
