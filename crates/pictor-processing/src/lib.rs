//! Pictor Processing Library
//!
//! Image rendition production: decode an original, derive the configured
//! sizes, and re-encode. The upload and migration paths consume this
//! behind the [`ImageProcessor`] trait; pixel work runs on the blocking
//! pool.

pub mod renditions;

pub use renditions::{
    ImageProcessor, PassthroughProcessor, ProcessedRendition, RenditionSpec, ResizeProcessor,
};
