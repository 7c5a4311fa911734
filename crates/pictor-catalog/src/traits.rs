//! Catalog access contract.
//!
//! The relational mapping layer itself is out of scope; this trait is the
//! data-access contract the ordering and upload paths consume. Concurrency
//! control is expressed as a generic compare-and-swap on a per-partition
//! version stamp rather than any specific engine's row-version mechanism.

use async_trait::async_trait;
use std::collections::HashSet;
use uuid::Uuid;

use pictor_core::{DomainResult, EntityType, Image, ImageId, Partition};

/// Outcome of a versioned write attempt.
#[derive(Debug)]
pub enum CasWrite<T> {
    /// The expected version matched (or no version was required) and the
    /// write was applied.
    Applied(T),
    /// The partition's version stamp moved since it was read; nothing was
    /// written.
    Conflict,
}

/// Successful order reservation: the first reserved value plus the
/// partition version stamp the reservation itself produced, so the write
/// that consumes the span can detect any interleaved partition change.
#[derive(Debug, Clone, Copy)]
pub struct OrderReservation {
    pub first_order: i32,
    pub version: u64,
}

/// One row mutation inside a versioned write. Sets both the order and the
/// active flag, since the manager always knows the full target state of
/// every row it touches.
#[derive(Debug, Clone, Copy)]
pub struct OrderWrite {
    pub id: ImageId,
    pub display_order: Option<i32>,
    pub is_active: bool,
}

/// Image catalog access.
///
/// `expected_version = None` writes unconditionally (the pessimistic and
/// uncoordinated strategies); `Some(v)` applies only when the partition's
/// stamp still equals `v`.
#[async_trait]
pub trait ImageCatalog: Send + Sync {
    async fn get(&self, id: ImageId) -> DomainResult<Option<Image>>;

    async fn get_by_guid(&self, guid: Uuid) -> DomainResult<Option<Image>>;

    /// Active images of a partition, unsorted (callers sort by
    /// [`Image::order_key`]).
    async fn list_partition(&self, partition: &Partition) -> DomainResult<Vec<Image>>;

    async fn insert(&self, image: Image) -> DomainResult<()>;

    /// Current version stamp of a partition. A partition that has never
    /// been written has version 0.
    async fn partition_version(&self, partition: &Partition) -> DomainResult<u64>;

    /// Reserve the next `count` display-order values of a partition.
    ///
    /// The reservation persists (as a high-water mark) so no two
    /// concurrent reservations ever hand out overlapping values. An
    /// applied write batch collapses the mark back to the partition's
    /// actual max active order, so the next value tracks `max + 1` after
    /// compaction or removal; an in-flight reservation detects that
    /// collapse through the version carried in [`OrderReservation`].
    async fn reserve_next_orders(
        &self,
        partition: &Partition,
        count: usize,
        expected_version: Option<u64>,
    ) -> DomainResult<CasWrite<OrderReservation>>;

    /// Apply a batch of row mutations atomically under the version check.
    /// Every id must belong to the partition.
    async fn apply_order_writes(
        &self,
        partition: &Partition,
        writes: &[OrderWrite],
        expected_version: Option<u64>,
    ) -> DomainResult<CasWrite<()>>;
}

/// Validates that an image's owning entity still exists before orders are
/// assigned against it.
#[async_trait]
pub trait EntityExistenceChecker: Send + Sync {
    async fn entity_exists(&self, entity_type: EntityType, entity_id: i64) -> DomainResult<bool>;
}

/// Checker that accepts every entity. For paths where entity lifecycle is
/// enforced elsewhere.
pub struct AllowAllEntityChecker;

#[async_trait]
impl EntityExistenceChecker for AllowAllEntityChecker {
    async fn entity_exists(&self, _entity_type: EntityType, _entity_id: i64) -> DomainResult<bool> {
        Ok(true)
    }
}

/// Checker backed by a fixed set of known entities.
pub struct StaticEntityChecker {
    known: HashSet<(EntityType, i64)>,
}

impl StaticEntityChecker {
    pub fn new(known: impl IntoIterator<Item = (EntityType, i64)>) -> Self {
        Self {
            known: known.into_iter().collect(),
        }
    }
}

#[async_trait]
impl EntityExistenceChecker for StaticEntityChecker {
    async fn entity_exists(&self, entity_type: EntityType, entity_id: i64) -> DomainResult<bool> {
        Ok(self.known.contains(&(entity_type, entity_id)))
    }
}
