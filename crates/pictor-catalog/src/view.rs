//! Computed views over the catalog.
//!
//! The "main image" of a partition is derived, never stored: persisting it
//! as a flag would create a second source of truth every ordering
//! operation must keep in sync.

use pictor_core::{DomainResult, Image, Partition};

use crate::traits::ImageCatalog;

/// The partition's main image: the active image with the smallest display
/// order, unordered images last, ties broken by id.
pub async fn main_image(
    catalog: &dyn ImageCatalog,
    partition: &Partition,
) -> DomainResult<Option<Image>> {
    let images = catalog.list_partition(partition).await?;
    Ok(images.into_iter().min_by_key(Image::order_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryCatalog;
    use chrono::Utc;
    use pictor_core::{EntityType, ImageCategory};
    use uuid::Uuid;

    fn image(id: i64, order: Option<i32>) -> Image {
        Image {
            id,
            guid: Uuid::new_v4(),
            partition: Partition::new(EntityType::Hotel, 1, ImageCategory::Gallery),
            display_order: order,
            is_active: true,
            stored_file_name: format!("{}.jpg", id),
            mime_type: "image/jpeg".to_string(),
            file_size_bytes: 100,
            width: None,
            height: None,
            uploaded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_main_image_is_smallest_order() {
        let catalog = InMemoryCatalog::new();
        catalog.insert(image(1, Some(3))).await.unwrap();
        catalog.insert(image(2, Some(1))).await.unwrap();
        catalog.insert(image(3, None)).await.unwrap();

        let p = Partition::new(EntityType::Hotel, 1, ImageCategory::Gallery);
        let main = main_image(&catalog, &p).await.unwrap().unwrap();
        assert_eq!(main.id, 2);
    }

    #[tokio::test]
    async fn test_empty_partition_has_no_main_image() {
        let catalog = InMemoryCatalog::new();
        let p = Partition::new(EntityType::Hotel, 1, ImageCategory::Gallery);
        assert!(main_image(&catalog, &p).await.unwrap().is_none());
    }
}
