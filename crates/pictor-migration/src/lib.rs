//! Pictor Migration Library
//!
//! One-time bulk migration of legacy local image files into the blob
//! store: read-only scanning, a resumable/cancellable session state
//! machine with bounded-concurrency transfer, post-hoc validation, local
//! cleanup, and compensating rollback.

pub mod engine;
pub mod scanner;
pub mod session;

// Re-export commonly used types
pub use engine::{EngineConfig, MigrationEngine};
pub use scanner::{scan_local_images, ScanOptions};
pub use session::{InMemorySessionStore, SessionStore};
