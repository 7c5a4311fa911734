use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque surrogate key for an image record. Immutable once assigned.
pub type ImageId = i64;

/// Owning entity kind for a polymorphic image attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Hotel,
    Room,
    Venue,
    Profile,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityType::Hotel => "hotel",
            EntityType::Room => "room",
            EntityType::Venue => "venue",
            EntityType::Profile => "profile",
        };
        f.write_str(s)
    }
}

/// Sub-partition of an entity's images (e.g. gallery vs avatar).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageCategory {
    Gallery,
    Avatar,
    Floorplan,
    Document,
}

impl fmt::Display for ImageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ImageCategory::Gallery => "gallery",
            ImageCategory::Avatar => "avatar",
            ImageCategory::Floorplan => "floorplan",
            ImageCategory::Document => "document",
        };
        f.write_str(s)
    }
}

/// The (entity type, entity id, category) tuple that scopes one
/// display-order sequence. All ordering operations are per partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Partition {
    pub entity_type: EntityType,
    pub entity_id: i64,
    pub category: ImageCategory,
}

impl Partition {
    pub fn new(entity_type: EntityType, entity_id: i64, category: ImageCategory) -> Self {
        Self {
            entity_type,
            entity_id,
            category,
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.entity_type, self.entity_id, self.category)
    }
}

/// A media record attached to a business entity.
///
/// Within one active partition, `display_order` values form a contiguous
/// 1..=N sequence with no duplicates once a reorder has completed.
/// `display_order = None` means unordered/pending; such images sort after
/// all ordered images, ties broken by id ascending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub id: ImageId,
    /// Globally unique identity; derives the stored filename and serves as
    /// the migration unit key.
    pub guid: Uuid,
    pub partition: Partition,
    pub display_order: Option<i32>,
    /// Soft-delete flag. Inactive images are invisible to ordering.
    pub is_active: bool,
    pub stored_file_name: String,
    pub mime_type: String,
    pub file_size_bytes: i64,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub uploaded_at: DateTime<Utc>,
}

impl Image {
    /// Sort key used everywhere a partition's relative order matters:
    /// ordered images first by order, unordered last, ties by id.
    pub fn order_key(&self) -> (i32, i64) {
        match self.display_order {
            Some(o) => (o, self.id),
            None => (i32::MAX, self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(id: ImageId, order: Option<i32>) -> Image {
        Image {
            id,
            guid: Uuid::new_v4(),
            partition: Partition::new(EntityType::Hotel, 1, ImageCategory::Gallery),
            display_order: order,
            is_active: true,
            stored_file_name: format!("{}.jpg", id),
            mime_type: "image/jpeg".to_string(),
            file_size_bytes: 1024,
            width: Some(800),
            height: Some(600),
            uploaded_at: Utc::now(),
        }
    }

    #[test]
    fn test_order_key_places_unordered_last() {
        let mut images = vec![image(3, None), image(1, Some(2)), image(2, Some(1))];
        images.sort_by_key(|i| i.order_key());
        let ids: Vec<_> = images.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn test_order_key_ties_broken_by_id() {
        let mut images = vec![image(9, None), image(4, None)];
        images.sort_by_key(|i| i.order_key());
        let ids: Vec<_> = images.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![4, 9]);
    }

    #[test]
    fn test_partition_display() {
        let p = Partition::new(EntityType::Room, 42, ImageCategory::Avatar);
        assert_eq!(p.to_string(), "room/42/avatar");
    }
}
