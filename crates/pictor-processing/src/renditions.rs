//! Rendition production.

use async_trait::async_trait;
use bytes::Bytes;
use image::{imageops::FilterType, ImageFormat};
use std::io::Cursor;

use pictor_core::{DomainError, DomainResult};

/// One target size of a logical image.
#[derive(Debug, Clone)]
pub struct RenditionSpec {
    /// Rendition name, e.g. "thumbnail", "medium", "original".
    pub name: String,
    /// Bounding box (width, height) to fit within, preserving aspect
    /// ratio. `None` keeps the original pixels.
    pub bounds: Option<(u32, u32)>,
}

impl RenditionSpec {
    pub fn original() -> Self {
        Self {
            name: "original".to_string(),
            bounds: None,
        }
    }

    pub fn sized(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            bounds: Some((width, height)),
        }
    }

    /// The conventional rendition set: thumbnail, medium, original.
    pub fn standard_set() -> Vec<Self> {
        vec![
            Self::sized("thumbnail", 200, 200),
            Self::sized("medium", 800, 800),
            Self::original(),
        ]
    }
}

/// One produced size of a logical image, ready for upload.
#[derive(Debug, Clone)]
pub struct ProcessedRendition {
    pub name: String,
    pub extension: String,
    pub content_type: String,
    pub width: u32,
    pub height: u32,
    pub data: Bytes,
}

/// Produces the derived sizes of an original image.
#[async_trait]
pub trait ImageProcessor: Send + Sync {
    async fn renditions(
        &self,
        original: Bytes,
        specs: &[RenditionSpec],
    ) -> DomainResult<Vec<ProcessedRendition>>;
}

fn format_parts(format: ImageFormat) -> (&'static str, &'static str) {
    match format {
        ImageFormat::Png => ("png", "image/png"),
        ImageFormat::WebP => ("webp", "image/webp"),
        _ => ("jpg", "image/jpeg"),
    }
}

/// Resize-and-encode processor built on the `image` crate.
#[derive(Default)]
pub struct ResizeProcessor;

impl ResizeProcessor {
    pub fn new() -> Self {
        Self
    }

    fn produce(data: &[u8], specs: &[RenditionSpec]) -> anyhow::Result<Vec<ProcessedRendition>> {
        let format = image::guess_format(data)?;
        // Re-encode everything as JPEG except lossless sources.
        let output_format = match format {
            ImageFormat::Png => ImageFormat::Png,
            ImageFormat::WebP => ImageFormat::WebP,
            _ => ImageFormat::Jpeg,
        };
        let (extension, content_type) = format_parts(output_format);

        let decoded = image::load_from_memory(data)?;

        let mut out = Vec::with_capacity(specs.len());
        for spec in specs {
            let resized = match spec.bounds {
                Some((w, h)) => decoded.resize(w, h, FilterType::Lanczos3),
                None => decoded.clone(),
            };

            let mut buffer = Cursor::new(Vec::new());
            resized.write_to(&mut buffer, output_format)?;

            out.push(ProcessedRendition {
                name: spec.name.clone(),
                extension: extension.to_string(),
                content_type: content_type.to_string(),
                width: resized.width(),
                height: resized.height(),
                data: Bytes::from(buffer.into_inner()),
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl ImageProcessor for ResizeProcessor {
    async fn renditions(
        &self,
        original: Bytes,
        specs: &[RenditionSpec],
    ) -> DomainResult<Vec<ProcessedRendition>> {
        if specs.is_empty() {
            return Err(DomainError::Validation(
                "Rendition spec list must not be empty".to_string(),
            ));
        }

        let specs = specs.to_vec();
        let produced = tokio::task::spawn_blocking(move || Self::produce(&original, &specs))
            .await
            .map_err(|e| DomainError::Internal(format!("Failed to process image: {}", e)))?
            .map_err(|e: anyhow::Error| {
                DomainError::Validation(format!("Invalid image file: {}", e))
            })?;

        tracing::debug!(count = produced.len(), "Renditions produced");
        Ok(produced)
    }
}

/// Processor that relabels the original bytes for every spec without
/// decoding. Used where bytes are migrated as-is and by tests that do not
/// care about pixels.
#[derive(Default)]
pub struct PassthroughProcessor {
    pub extension: String,
    pub content_type: String,
}

impl PassthroughProcessor {
    pub fn new(extension: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            content_type: content_type.into(),
        }
    }
}

#[async_trait]
impl ImageProcessor for PassthroughProcessor {
    async fn renditions(
        &self,
        original: Bytes,
        specs: &[RenditionSpec],
    ) -> DomainResult<Vec<ProcessedRendition>> {
        if specs.is_empty() {
            return Err(DomainError::Validation(
                "Rendition spec list must not be empty".to_string(),
            ));
        }
        Ok(specs
            .iter()
            .map(|spec| ProcessedRendition {
                name: spec.name.clone(),
                extension: if self.extension.is_empty() {
                    "jpg".to_string()
                } else {
                    self.extension.clone()
                },
                content_type: if self.content_type.is_empty() {
                    "image/jpeg".to_string()
                } else {
                    self.content_type.clone()
                },
                width: 0,
                height: 0,
                data: original.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_fixture(width: u32, height: u32) -> Bytes {
        let img = image::DynamicImage::new_rgb8(width, height);
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png).unwrap();
        Bytes::from(buffer.into_inner())
    }

    #[tokio::test]
    async fn test_resize_fits_bounds() {
        let processor = ResizeProcessor::new();
        let original = png_fixture(400, 200);

        let specs = vec![
            RenditionSpec::sized("thumbnail", 100, 100),
            RenditionSpec::original(),
        ];
        let renditions = processor.renditions(original, &specs).await.unwrap();

        assert_eq!(renditions.len(), 2);
        let thumb = &renditions[0];
        assert_eq!(thumb.name, "thumbnail");
        assert!(thumb.width <= 100 && thumb.height <= 100);
        // Aspect ratio preserved: 400x200 → 100x50.
        assert_eq!((thumb.width, thumb.height), (100, 50));

        let original = &renditions[1];
        assert_eq!((original.width, original.height), (400, 200));
        assert_eq!(original.content_type, "image/png");
    }

    #[tokio::test]
    async fn test_garbage_bytes_rejected() {
        let processor = ResizeProcessor::new();
        let result = processor
            .renditions(Bytes::from_static(b"not an image"), &[RenditionSpec::original()])
            .await;
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn test_empty_specs_rejected() {
        let processor = ResizeProcessor::new();
        let result = processor.renditions(png_fixture(10, 10), &[]).await;
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn test_passthrough_copies_bytes() {
        let processor = PassthroughProcessor::new("jpg", "image/jpeg");
        let data = Bytes::from_static(b"raw bytes");
        let renditions = processor
            .renditions(data.clone(), &RenditionSpec::standard_set())
            .await
            .unwrap();
        assert_eq!(renditions.len(), 3);
        assert!(renditions.iter().all(|r| r.data == data));
    }
}
