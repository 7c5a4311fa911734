use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Descriptive data about one stored blob. Derived from the store on
/// demand, never independently persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobMetadata {
    pub key: String,
    pub size_bytes: u64,
    pub content_type: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
}
