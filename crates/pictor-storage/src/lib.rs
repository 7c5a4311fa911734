//! Pictor Storage Library
//!
//! Blob store abstraction and implementations, plus the atomic
//! multi-rendition uploader.
//!
//! # Blob key format
//!
//! Keys are path-shaped: `{base_path}/{guid}/{rendition}.{ext}` for
//! rendition sets, so every rendition of one logical image shares a
//! prefix. Keys must not contain `..` or a leading `/`.

pub mod local;
pub mod memory;
pub mod traits;
pub mod uploader;

// Re-export commonly used types
pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;
pub use traits::{BatchDeleteOutcome, BlobStore, StorageError, StorageResult};
pub use uploader::{AtomicMultiSizeUploader, NamedRendition, UploaderConfig};
