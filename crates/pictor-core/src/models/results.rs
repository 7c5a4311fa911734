//! Result value types.
//!
//! These are the sole channel by which expected failure crosses a component
//! boundary: callers check `is_success`/`error` instead of catching panics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::image::ImageId;

/// Outcome of assigning display orders to a batch of images.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignResult {
    pub is_success: bool,
    pub error: Option<String>,
    /// Image id → assigned order. Count equals input length on success.
    pub assigned_orders: HashMap<ImageId, i32>,
    pub affected_count: usize,
}

impl AssignResult {
    pub fn success(assigned_orders: HashMap<ImageId, i32>) -> Self {
        let affected_count = assigned_orders.len();
        Self {
            is_success: true,
            error: None,
            assigned_orders,
            affected_count,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            is_success: false,
            error: Some(error.into()),
            assigned_orders: HashMap::new(),
            affected_count: 0,
        }
    }
}

/// Outcome of compacting a partition's display orders to 1..=N.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderResult {
    pub is_success: bool,
    pub error: Option<String>,
    pub image_count_before: usize,
    pub image_count_after: usize,
    /// Only images whose number actually changed.
    pub updated_image_ids: Vec<ImageId>,
}

impl ReorderResult {
    pub fn success(before: usize, after: usize, updated: Vec<ImageId>) -> Self {
        Self {
            is_success: true,
            error: None,
            image_count_before: before,
            image_count_after: after,
            updated_image_ids: updated,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            is_success: false,
            error: Some(error.into()),
            image_count_before: 0,
            image_count_after: 0,
            updated_image_ids: Vec::new(),
        }
    }
}

/// Outcome of relocating one image within its partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveResult {
    pub is_success: bool,
    pub error: Option<String>,
    pub old_position: i32,
    pub new_position: i32,
    /// Count of images whose order changed; always includes the moved image.
    pub affected_count: usize,
}

impl MoveResult {
    pub fn success(old_position: i32, new_position: i32, affected_count: usize) -> Self {
        Self {
            is_success: true,
            error: None,
            old_position,
            new_position,
            affected_count,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            is_success: false,
            error: Some(error.into()),
            old_position: 0,
            new_position: 0,
            affected_count: 0,
        }
    }
}

/// Outcome of soft-deleting an image and closing its order gap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveResult {
    pub is_success: bool,
    pub error: Option<String>,
    pub removed_position: Option<i32>,
    pub adjusted_count: usize,
}

impl RemoveResult {
    pub fn success(removed_position: Option<i32>, adjusted_count: usize) -> Self {
        Self {
            is_success: true,
            error: None,
            removed_position,
            adjusted_count,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            is_success: false,
            error: Some(error.into()),
            removed_position: None,
            adjusted_count: 0,
        }
    }
}

/// Outcome of an all-or-nothing multi-rendition upload.
///
/// On failure, `rolled_back_keys` lists the partial writes that were
/// deleted; `cleanup_completed` is false when any rollback delete itself
/// failed, leaving orphaned blobs for out-of-band reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtomicUploadResult {
    pub is_success: bool,
    pub error: Option<String>,
    pub uploaded_keys: Vec<String>,
    pub rolled_back_keys: Vec<String>,
    pub cleanup_completed: bool,
}

impl AtomicUploadResult {
    pub fn success(uploaded_keys: Vec<String>) -> Self {
        Self {
            is_success: true,
            error: None,
            uploaded_keys,
            rolled_back_keys: Vec::new(),
            cleanup_completed: true,
        }
    }

    pub fn failure(
        error: impl Into<String>,
        rolled_back_keys: Vec<String>,
        cleanup_completed: bool,
    ) -> Self {
        Self {
            is_success: false,
            error: Some(error.into()),
            uploaded_keys: Vec::new(),
            rolled_back_keys,
            cleanup_completed,
        }
    }
}

/// One local file the scanner could not classify as ready.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblematicImage {
    pub path: String,
    pub reason: String,
}

/// Outcome of a read-only local-file scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub total_images: usize,
    pub ready_to_migrate: Vec<String>,
    pub problematic_images: Vec<ProblematicImage>,
    pub scan_time: DateTime<Utc>,
    pub scan_duration_ms: u64,
}

/// Outcome of a post-hoc migration validation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub expected_count: u64,
    pub validated_count: u64,
    pub missing_keys: Vec<String>,
}

/// Outcome of deleting local source files after migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupResult {
    pub attempted: usize,
    pub deleted: usize,
    pub failed_paths: Vec<String>,
}
