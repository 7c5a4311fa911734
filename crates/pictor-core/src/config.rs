//! Configuration module
//!
//! Env-driven configuration with defaults for every knob, so tests and
//! local runs work with an empty environment.

use std::env;

const DEFAULT_UPLOAD_MAX_RETRIES: u32 = 3;
const DEFAULT_UPLOAD_FANOUT: usize = 4;
const DEFAULT_ORDER_MAX_RETRIES: u32 = 3;
const DEFAULT_ORDER_BACKOFF_BASE_MS: u64 = 20;
const DEFAULT_MIGRATION_BATCH_SIZE: usize = 50;
const DEFAULT_MIGRATION_MAX_CONCURRENCY: usize = 4;

/// Application configuration shared by the upload, ordering, and
/// migration components.
#[derive(Clone, Debug)]
pub struct PictorConfig {
    /// Root directory holding legacy local image files.
    pub local_image_root: String,
    /// Prefix under which blobs are keyed in the store.
    pub blob_base_path: String,
    /// Bounded retry count for single-blob uploads.
    pub upload_max_retries: u32,
    /// Fan-out bound for multi-rendition uploads.
    pub upload_fanout: usize,
    /// Optimistic-strategy retry cap for ordering operations.
    pub order_max_retries: u32,
    /// Base backoff in milliseconds between optimistic retries.
    pub order_backoff_base_ms: u64,
    pub migration_batch_size: usize,
    pub migration_max_concurrency: usize,
}

impl Default for PictorConfig {
    fn default() -> Self {
        Self {
            local_image_root: "./data/images".to_string(),
            blob_base_path: "images".to_string(),
            upload_max_retries: DEFAULT_UPLOAD_MAX_RETRIES,
            upload_fanout: DEFAULT_UPLOAD_FANOUT,
            order_max_retries: DEFAULT_ORDER_MAX_RETRIES,
            order_backoff_base_ms: DEFAULT_ORDER_BACKOFF_BASE_MS,
            migration_batch_size: DEFAULT_MIGRATION_BATCH_SIZE,
            migration_max_concurrency: DEFAULT_MIGRATION_MAX_CONCURRENCY,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl PictorConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let defaults = Self::default();
        let config = Self {
            local_image_root: env::var("PICTOR_LOCAL_IMAGE_ROOT")
                .unwrap_or(defaults.local_image_root),
            blob_base_path: env::var("PICTOR_BLOB_BASE_PATH").unwrap_or(defaults.blob_base_path),
            upload_max_retries: env_parse("PICTOR_UPLOAD_MAX_RETRIES", defaults.upload_max_retries),
            upload_fanout: env_parse("PICTOR_UPLOAD_FANOUT", defaults.upload_fanout),
            order_max_retries: env_parse("PICTOR_ORDER_MAX_RETRIES", defaults.order_max_retries),
            order_backoff_base_ms: env_parse(
                "PICTOR_ORDER_BACKOFF_BASE_MS",
                defaults.order_backoff_base_ms,
            ),
            migration_batch_size: env_parse(
                "PICTOR_MIGRATION_BATCH_SIZE",
                defaults.migration_batch_size,
            ),
            migration_max_concurrency: env_parse(
                "PICTOR_MIGRATION_MAX_CONCURRENCY",
                defaults.migration_max_concurrency,
            ),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.upload_fanout == 0 {
            anyhow::bail!("PICTOR_UPLOAD_FANOUT must be at least 1");
        }
        if self.migration_batch_size == 0 {
            anyhow::bail!("PICTOR_MIGRATION_BATCH_SIZE must be at least 1");
        }
        if self.migration_max_concurrency == 0 {
            anyhow::bail!("PICTOR_MIGRATION_MAX_CONCURRENCY must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PictorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.upload_max_retries, 3);
        assert_eq!(config.migration_max_concurrency, 4);
    }

    #[test]
    fn test_zero_fanout_rejected() {
        let config = PictorConfig {
            upload_fanout: 0,
            ..PictorConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
