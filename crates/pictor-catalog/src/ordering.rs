//! Display-order manager.
//!
//! Maintains the 1-based, gapless ordering index of active images within a
//! partition. Every operation runs under one of three concurrency-control
//! strategies chosen per call: optimistic (versioned compare-and-swap with
//! bounded, jittered retry), pessimistic (exclusive per-partition lock held
//! across read and write), or none (single uncoordinated attempt for
//! low-contention single-writer paths).

use rand::Rng;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::traits::{CasWrite, EntityExistenceChecker, ImageCatalog, OrderWrite};
use pictor_core::validation::{validate_image_ids, validate_position};
use pictor_core::{
    AssignResult, DomainError, DomainResult, Image, ImageId, MoveResult, Partition, PictorConfig,
    RemoveResult, ReorderResult,
};

/// Concurrency-control strategy, selectable per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyStrategy {
    /// Versioned compare-and-swap with bounded retry on conflict.
    Optimistic,
    /// Exclusive per-partition lock across read and write.
    Pessimistic,
    /// No coordination; the caller accepts races.
    None,
}

#[derive(Debug, Clone)]
pub struct OrderingConfig {
    /// Retry cap for the optimistic strategy.
    pub max_retries: u32,
    /// Base backoff between optimistic retries; doubled per attempt with
    /// jitter.
    pub backoff_base: Duration,
}

impl Default for OrderingConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_millis(20),
        }
    }
}

impl From<&PictorConfig> for OrderingConfig {
    fn from(config: &PictorConfig) -> Self {
        Self {
            max_retries: config.order_max_retries,
            backoff_base: Duration::from_millis(config.order_backoff_base_ms),
        }
    }
}

enum Attempt<T> {
    Done(T),
    Conflict,
}

pub struct DisplayOrderManager {
    catalog: Arc<dyn ImageCatalog>,
    entities: Arc<dyn EntityExistenceChecker>,
    config: OrderingConfig,
    partition_locks: Mutex<HashMap<Partition, Arc<Mutex<()>>>>,
}

impl DisplayOrderManager {
    pub fn new(
        catalog: Arc<dyn ImageCatalog>,
        entities: Arc<dyn EntityExistenceChecker>,
        config: OrderingConfig,
    ) -> Self {
        Self {
            catalog,
            entities,
            config,
            partition_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn partition_lock(&self, partition: Partition) -> Arc<Mutex<()>> {
        let mut locks = self.partition_locks.lock().await;
        locks.entry(partition).or_default().clone()
    }

    /// Run one operation attempt under the chosen strategy, retrying
    /// optimistic conflicts up to the configured cap. Conflict exhaustion
    /// surfaces as `ConcurrencyConflict`, never a silent drop.
    async fn run<T, F, Fut>(
        &self,
        partition: Partition,
        strategy: ConcurrencyStrategy,
        f: F,
    ) -> DomainResult<T>
    where
        F: Fn(Option<u64>) -> Fut,
        Fut: Future<Output = DomainResult<Attempt<T>>>,
    {
        match strategy {
            ConcurrencyStrategy::None => match f(None).await? {
                Attempt::Done(value) => Ok(value),
                Attempt::Conflict => Err(DomainError::ConcurrencyConflict {
                    resource: partition.to_string(),
                    attempts: 1,
                }),
            },
            ConcurrencyStrategy::Pessimistic => {
                let lock = self.partition_lock(partition).await;
                let _guard = lock.lock().await;
                match f(None).await? {
                    Attempt::Done(value) => Ok(value),
                    Attempt::Conflict => Err(DomainError::ConcurrencyConflict {
                        resource: partition.to_string(),
                        attempts: 1,
                    }),
                }
            }
            ConcurrencyStrategy::Optimistic => {
                let mut attempts = 0u32;
                loop {
                    attempts += 1;
                    let version = self.catalog.partition_version(&partition).await?;
                    match f(Some(version)).await? {
                        Attempt::Done(value) => return Ok(value),
                        Attempt::Conflict if attempts <= self.config.max_retries => {
                            // Doubling is capped so late retries stay bounded.
                            let backoff = self.config.backoff_base * 2u32.pow((attempts - 1).min(5));
                            let jitter_ms: u64 = rand::rng()
                                .random_range(0..=self.config.backoff_base.as_millis() as u64);
                            tracing::debug!(
                                partition = %partition,
                                attempt = attempts,
                                "Optimistic write conflicted, retrying"
                            );
                            tokio::time::sleep(backoff + Duration::from_millis(jitter_ms)).await;
                        }
                        Attempt::Conflict => {
                            tracing::warn!(
                                partition = %partition,
                                attempts,
                                "Optimistic retries exhausted"
                            );
                            return Err(DomainError::ConcurrencyConflict {
                                resource: partition.to_string(),
                                attempts,
                            });
                        }
                    }
                }
            }
        }
    }

    /// Next free display order of a partition: `max + 1` over active
    /// images, `1` when the partition is empty. The value is reserved, so
    /// two concurrent calls under a coordinating strategy never return the
    /// same number.
    pub async fn next_display_order(
        &self,
        partition: Partition,
        strategy: ConcurrencyStrategy,
    ) -> DomainResult<i32> {
        self.run(partition, strategy, |expected| async move {
            match self
                .catalog
                .reserve_next_orders(&partition, 1, expected)
                .await?
            {
                CasWrite::Applied(reservation) => Ok(Attempt::Done(reservation.first_order)),
                CasWrite::Conflict => Ok(Attempt::Conflict),
            }
        })
        .await
    }

    /// Assign increasing display orders to `image_ids` in input order,
    /// starting at the partition's next free value.
    pub async fn assign_display_orders(
        &self,
        partition: Partition,
        image_ids: &[ImageId],
        strategy: ConcurrencyStrategy,
    ) -> AssignResult {
        if let Err(e) = validate_image_ids(image_ids) {
            return AssignResult::failure(e.to_string());
        }

        match self
            .entities
            .entity_exists(partition.entity_type, partition.entity_id)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                return AssignResult::failure(format!(
                    "Owning entity {}/{} not found",
                    partition.entity_type, partition.entity_id
                ))
            }
            Err(e) => return AssignResult::failure(e.to_string()),
        }

        let outcome = self
            .run(partition, strategy, |expected| {
                self.attempt_assign(partition, image_ids, expected)
            })
            .await;

        match outcome {
            Ok(assigned) => {
                tracing::info!(
                    partition = %partition,
                    count = assigned.len(),
                    "Display orders assigned"
                );
                AssignResult::success(assigned)
            }
            Err(e) => AssignResult::failure(e.to_string()),
        }
    }

    async fn attempt_assign(
        &self,
        partition: Partition,
        image_ids: &[ImageId],
        expected: Option<u64>,
    ) -> DomainResult<Attempt<HashMap<ImageId, i32>>> {
        // Validate membership before reserving anything.
        for id in image_ids {
            match self.catalog.get(*id).await? {
                Some(image) if image.partition == partition => {}
                Some(_) => {
                    return Err(DomainError::NotFound(format!(
                        "Image {} does not belong to partition {}",
                        id, partition
                    )))
                }
                None => return Err(DomainError::NotFound(format!("Image {} not found", id))),
            }
        }

        let reservation = match self
            .catalog
            .reserve_next_orders(&partition, image_ids.len(), expected)
            .await?
        {
            CasWrite::Applied(reservation) => reservation,
            CasWrite::Conflict => return Ok(Attempt::Conflict),
        };

        let mut assigned = HashMap::with_capacity(image_ids.len());
        let writes: Vec<OrderWrite> = image_ids
            .iter()
            .enumerate()
            .map(|(offset, id)| {
                let order = reservation.first_order + offset as i32;
                assigned.insert(*id, order);
                OrderWrite {
                    id: *id,
                    display_order: Some(order),
                    is_active: true,
                }
            })
            .collect();

        // Under the optimistic strategy, any partition change between the
        // reservation and this write (another reservation, a compaction)
        // invalidates the span, so the row writes are gated on the version
        // the reservation produced. Pessimistic and uncoordinated callers
        // pass no version; the lock (or the caller) owns exclusivity.
        let apply_expected = expected.map(|_| reservation.version);
        match self
            .catalog
            .apply_order_writes(&partition, &writes, apply_expected)
            .await?
        {
            CasWrite::Applied(()) => Ok(Attempt::Done(assigned)),
            CasWrite::Conflict => Ok(Attempt::Conflict),
        }
    }

    /// Re-number all active images of a partition into a contiguous 1..=N
    /// sequence by their current relative order, writing only rows whose
    /// number actually changes. This is the gap-compaction operation.
    pub async fn reorder_display_orders(
        &self,
        partition: Partition,
        strategy: ConcurrencyStrategy,
    ) -> ReorderResult {
        let outcome = self
            .run(partition, strategy, |expected| {
                self.attempt_reorder(partition, expected)
            })
            .await;

        match outcome {
            Ok((before, after, updated)) => {
                tracing::info!(
                    partition = %partition,
                    image_count = after,
                    updated = updated.len(),
                    "Display orders compacted"
                );
                ReorderResult::success(before, after, updated)
            }
            Err(e) => ReorderResult::failure(e.to_string()),
        }
    }

    async fn attempt_reorder(
        &self,
        partition: Partition,
        expected: Option<u64>,
    ) -> DomainResult<Attempt<(usize, usize, Vec<ImageId>)>> {
        let mut images = self.catalog.list_partition(&partition).await?;
        let before = images.len();
        images.sort_by_key(Image::order_key);

        let mut writes = Vec::new();
        let mut updated = Vec::new();
        for (index, image) in images.iter().enumerate() {
            let target = index as i32 + 1;
            if image.display_order != Some(target) {
                writes.push(OrderWrite {
                    id: image.id,
                    display_order: Some(target),
                    is_active: true,
                });
                updated.push(image.id);
            }
        }

        if writes.is_empty() {
            return Ok(Attempt::Done((before, before, updated)));
        }

        match self
            .catalog
            .apply_order_writes(&partition, &writes, expected)
            .await?
        {
            CasWrite::Applied(()) => Ok(Attempt::Done((before, before, updated))),
            CasWrite::Conflict => Ok(Attempt::Conflict),
        }
    }

    /// Relocate one image to a 1-based position within its own partition,
    /// shifting the images between the old and new position by one.
    /// Requesting the current position is a no-op for every other image.
    pub async fn move_image_to_position(
        &self,
        image_id: ImageId,
        new_position: i32,
        strategy: ConcurrencyStrategy,
    ) -> MoveResult {
        if let Err(e) = validate_position(new_position) {
            return MoveResult::failure(e.to_string());
        }

        // The partition is only known once the image is loaded.
        let partition = match self.catalog.get(image_id).await {
            Ok(Some(image)) => image.partition,
            Ok(None) => return MoveResult::failure(format!("Image {} not found", image_id)),
            Err(e) => return MoveResult::failure(e.to_string()),
        };

        let outcome = self
            .run(partition, strategy, |expected| {
                self.attempt_move(partition, image_id, new_position, expected)
            })
            .await;

        match outcome {
            Ok((old_position, target, affected)) => {
                tracing::info!(
                    partition = %partition,
                    image_id,
                    old_position,
                    new_position = target,
                    affected,
                    "Image moved"
                );
                MoveResult::success(old_position, target, affected)
            }
            Err(e) => MoveResult::failure(e.to_string()),
        }
    }

    async fn attempt_move(
        &self,
        partition: Partition,
        image_id: ImageId,
        new_position: i32,
        expected: Option<u64>,
    ) -> DomainResult<Attempt<(i32, i32, usize)>> {
        let mut images = self.catalog.list_partition(&partition).await?;
        images.sort_by_key(Image::order_key);

        let old_index = images
            .iter()
            .position(|i| i.id == image_id)
            .ok_or_else(|| DomainError::NotFound(format!("Image {} not found", image_id)))?;
        let old_position = old_index as i32 + 1;

        // Positions beyond the end mean "move to last".
        let target = new_position.min(images.len() as i32);
        let target_index = (target - 1) as usize;

        let moved = images.remove(old_index);
        images.insert(target_index, moved);

        let mut writes = Vec::new();
        let mut moved_changed = false;
        for (index, image) in images.iter().enumerate() {
            let order = index as i32 + 1;
            if image.display_order != Some(order) {
                writes.push(OrderWrite {
                    id: image.id,
                    display_order: Some(order),
                    is_active: true,
                });
                if image.id == image_id {
                    moved_changed = true;
                }
            }
        }

        // The moved image counts as affected even when its stored order is
        // already the requested one.
        let affected = writes.len() + usize::from(!moved_changed);

        if writes.is_empty() {
            return Ok(Attempt::Done((old_position, target, affected)));
        }

        match self
            .catalog
            .apply_order_writes(&partition, &writes, expected)
            .await?
        {
            CasWrite::Applied(()) => Ok(Attempt::Done((old_position, target, affected))),
            CasWrite::Conflict => Ok(Attempt::Conflict),
        }
    }

    /// Soft-delete an image and decrement the order of every subsequent
    /// active image in its partition, closing the gap.
    pub async fn remove_image_and_adjust_orders(
        &self,
        image_id: ImageId,
        strategy: ConcurrencyStrategy,
    ) -> RemoveResult {
        let partition = match self.catalog.get(image_id).await {
            Ok(Some(image)) if image.is_active => image.partition,
            Ok(_) => return RemoveResult::failure(format!("Image {} not found", image_id)),
            Err(e) => return RemoveResult::failure(e.to_string()),
        };

        let outcome = self
            .run(partition, strategy, |expected| {
                self.attempt_remove(partition, image_id, expected)
            })
            .await;

        match outcome {
            Ok((removed_position, adjusted)) => {
                tracing::info!(
                    partition = %partition,
                    image_id,
                    removed_position = ?removed_position,
                    adjusted,
                    "Image removed, orders compacted"
                );
                RemoveResult::success(removed_position, adjusted)
            }
            Err(e) => RemoveResult::failure(e.to_string()),
        }
    }

    async fn attempt_remove(
        &self,
        partition: Partition,
        image_id: ImageId,
        expected: Option<u64>,
    ) -> DomainResult<Attempt<(Option<i32>, usize)>> {
        let images = self.catalog.list_partition(&partition).await?;
        let removed = images
            .iter()
            .find(|i| i.id == image_id)
            .ok_or_else(|| DomainError::NotFound(format!("Image {} not found", image_id)))?;
        let removed_order = removed.display_order;

        let mut writes = vec![OrderWrite {
            id: image_id,
            display_order: None,
            is_active: false,
        }];

        let mut adjusted = 0usize;
        if let Some(gap) = removed_order {
            for image in &images {
                if image.id == image_id {
                    continue;
                }
                if let Some(order) = image.display_order {
                    if order > gap {
                        writes.push(OrderWrite {
                            id: image.id,
                            display_order: Some(order - 1),
                            is_active: true,
                        });
                        adjusted += 1;
                    }
                }
            }
        }

        match self
            .catalog
            .apply_order_writes(&partition, &writes, expected)
            .await?
        {
            CasWrite::Applied(()) => Ok(Attempt::Done((removed_order, adjusted))),
            CasWrite::Conflict => Ok(Attempt::Conflict),
        }
    }
}
