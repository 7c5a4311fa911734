//! In-memory catalog.
//!
//! Reference implementation of the versioned-write contract; also the
//! catalog used by tests. Every write to a partition bumps its version
//! stamp, and the order high-water mark guarantees reservation uniqueness.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::traits::{CasWrite, ImageCatalog, OrderReservation, OrderWrite};
use pictor_core::{DomainError, DomainResult, Image, ImageId, Partition};

#[derive(Default)]
struct PartitionState {
    version: u64,
    /// Highest order value reserved but not yet consumed by a write.
    /// Reservations advance it so concurrent callers never receive
    /// overlapping values; every applied write batch collapses it back to
    /// the partition's actual max active order.
    order_floor: i32,
}

#[derive(Default)]
struct CatalogInner {
    rows: HashMap<ImageId, Image>,
    partitions: HashMap<Partition, PartitionState>,
}

impl CatalogInner {
    fn max_active_order(&self, partition: &Partition) -> i32 {
        self.rows
            .values()
            .filter(|i| i.is_active && i.partition == *partition)
            .filter_map(|i| i.display_order)
            .max()
            .unwrap_or(0)
    }

    fn check_version(
        &self,
        partition: &Partition,
        expected_version: Option<u64>,
    ) -> bool {
        match expected_version {
            None => true,
            Some(v) => {
                let current = self
                    .partitions
                    .get(partition)
                    .map(|s| s.version)
                    .unwrap_or(0);
                current == v
            }
        }
    }
}

/// In-memory image catalog with per-partition version stamps.
#[derive(Default)]
pub struct InMemoryCatalog {
    inner: RwLock<CatalogInner>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ImageCatalog for InMemoryCatalog {
    async fn get(&self, id: ImageId) -> DomainResult<Option<Image>> {
        Ok(self.inner.read().await.rows.get(&id).cloned())
    }

    async fn get_by_guid(&self, guid: Uuid) -> DomainResult<Option<Image>> {
        Ok(self
            .inner
            .read()
            .await
            .rows
            .values()
            .find(|i| i.guid == guid)
            .cloned())
    }

    async fn list_partition(&self, partition: &Partition) -> DomainResult<Vec<Image>> {
        Ok(self
            .inner
            .read()
            .await
            .rows
            .values()
            .filter(|i| i.is_active && i.partition == *partition)
            .cloned()
            .collect())
    }

    async fn insert(&self, image: Image) -> DomainResult<()> {
        let mut inner = self.inner.write().await;
        if inner.rows.contains_key(&image.id) {
            return Err(DomainError::Validation(format!(
                "Image {} already exists",
                image.id
            )));
        }
        let partition = image.partition;
        let order = image.display_order.unwrap_or(0);
        inner.rows.insert(image.id, image);
        let state = inner.partitions.entry(partition).or_default();
        state.version += 1;
        state.order_floor = state.order_floor.max(order);
        Ok(())
    }

    async fn partition_version(&self, partition: &Partition) -> DomainResult<u64> {
        Ok(self
            .inner
            .read()
            .await
            .partitions
            .get(partition)
            .map(|s| s.version)
            .unwrap_or(0))
    }

    async fn reserve_next_orders(
        &self,
        partition: &Partition,
        count: usize,
        expected_version: Option<u64>,
    ) -> DomainResult<CasWrite<OrderReservation>> {
        if count == 0 {
            return Err(DomainError::Validation(
                "Reservation count must be at least 1".to_string(),
            ));
        }
        let mut inner = self.inner.write().await;
        if !inner.check_version(partition, expected_version) {
            return Ok(CasWrite::Conflict);
        }
        let first = inner
            .max_active_order(partition)
            .max(inner.partitions.get(partition).map(|s| s.order_floor).unwrap_or(0))
            + 1;
        let state = inner.partitions.entry(*partition).or_default();
        state.order_floor = first + count as i32 - 1;
        state.version += 1;
        Ok(CasWrite::Applied(OrderReservation {
            first_order: first,
            version: state.version,
        }))
    }

    async fn apply_order_writes(
        &self,
        partition: &Partition,
        writes: &[OrderWrite],
        expected_version: Option<u64>,
    ) -> DomainResult<CasWrite<()>> {
        let mut inner = self.inner.write().await;
        if !inner.check_version(partition, expected_version) {
            return Ok(CasWrite::Conflict);
        }

        // Validate the whole batch before mutating anything.
        for write in writes {
            match inner.rows.get(&write.id) {
                Some(image) if image.partition == *partition => {}
                Some(_) => {
                    return Err(DomainError::NotFound(format!(
                        "Image {} does not belong to partition {}",
                        write.id, partition
                    )))
                }
                None => {
                    return Err(DomainError::NotFound(format!("Image {} not found", write.id)))
                }
            }
        }

        for write in writes {
            if let Some(image) = inner.rows.get_mut(&write.id) {
                image.display_order = write.display_order;
                image.is_active = write.is_active;
            }
        }

        // An applied batch is the partition's new ground truth, so the
        // floor collapses to the actual max. It stays sticky only between
        // a reservation and the write that consumes it, which is the
        // window uniqueness needs; without the collapse, compaction and
        // removal would leave the next order permanently inflated.
        let new_floor = inner.max_active_order(partition);
        let state = inner.partitions.entry(*partition).or_default();
        state.version += 1;
        state.order_floor = new_floor;
        Ok(CasWrite::Applied(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pictor_core::{EntityType, ImageCategory};

    fn partition() -> Partition {
        Partition::new(EntityType::Hotel, 1, ImageCategory::Gallery)
    }

    fn image(id: ImageId, order: Option<i32>) -> Image {
        Image {
            id,
            guid: Uuid::new_v4(),
            partition: partition(),
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
    async fn test_version_bumps_on_write() {
        let catalog = InMemoryCatalog::new();
        let p = partition();
        assert_eq!(catalog.partition_version(&p).await.unwrap(), 0);

        catalog.insert(image(1, Some(1))).await.unwrap();
        assert_eq!(catalog.partition_version(&p).await.unwrap(), 1);

        let writes = [OrderWrite {
            id: 1,
            display_order: Some(2),
            is_active: true,
        }];
        match catalog.apply_order_writes(&p, &writes, None).await.unwrap() {
            CasWrite::Applied(()) => {}
            CasWrite::Conflict => panic!("unconditional write must not conflict"),
        }
        assert_eq!(catalog.partition_version(&p).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_stale_version_conflicts_without_writing() {
        let catalog = InMemoryCatalog::new();
        let p = partition();
        catalog.insert(image(1, Some(1))).await.unwrap();

        let writes = [OrderWrite {
            id: 1,
            display_order: Some(5),
            is_active: true,
        }];
        let result = catalog
            .apply_order_writes(&p, &writes, Some(0))
            .await
            .unwrap();
        assert!(matches!(result, CasWrite::Conflict));
        assert_eq!(
            catalog.get(1).await.unwrap().unwrap().display_order,
            Some(1)
        );
    }

    #[tokio::test]
    async fn test_reservations_never_repeat() {
        let catalog = InMemoryCatalog::new();
        let p = partition();
        catalog.insert(image(1, Some(3))).await.unwrap();

        let first = match catalog.reserve_next_orders(&p, 1, None).await.unwrap() {
            CasWrite::Applied(r) => r.first_order,
            CasWrite::Conflict => panic!(),
        };
        let span = match catalog.reserve_next_orders(&p, 3, None).await.unwrap() {
            CasWrite::Applied(r) => r.first_order,
            CasWrite::Conflict => panic!(),
        };
        let after = match catalog.reserve_next_orders(&p, 1, None).await.unwrap() {
            CasWrite::Applied(r) => r.first_order,
            CasWrite::Conflict => panic!(),
        };
        assert_eq!(first, 4);
        assert_eq!(span, 5);
        assert_eq!(after, 8);
    }

    #[tokio::test]
    async fn test_applied_writes_collapse_reservation_mark() {
        // A reservation inflates the next value, but once a write batch is
        // applied the next value must track the actual max again.
        let catalog = InMemoryCatalog::new();
        let p = partition();
        catalog.insert(image(1, Some(1))).await.unwrap();
        catalog.insert(image(2, Some(2))).await.unwrap();

        match catalog.reserve_next_orders(&p, 5, None).await.unwrap() {
            CasWrite::Applied(r) => assert_eq!(r.first_order, 3),
            CasWrite::Conflict => panic!(),
        }

        let writes = [OrderWrite {
            id: 2,
            display_order: Some(2),
            is_active: true,
        }];
        catalog.apply_order_writes(&p, &writes, None).await.unwrap();

        match catalog.reserve_next_orders(&p, 1, None).await.unwrap() {
            CasWrite::Applied(r) => assert_eq!(r.first_order, 3),
            CasWrite::Conflict => panic!(),
        }
    }

    #[tokio::test]
    async fn test_foreign_partition_write_is_not_found() {
        let catalog = InMemoryCatalog::new();
        catalog.insert(image(1, Some(1))).await.unwrap();

        let other = Partition::new(EntityType::Room, 9, ImageCategory::Gallery);
        let writes = [OrderWrite {
            id: 1,
            display_order: Some(1),
            is_active: true,
        }];
        let result = catalog.apply_order_writes(&other, &writes, None).await;
        assert!(matches!(result, Err(DomainError::NotFound(_))));
    }
}
