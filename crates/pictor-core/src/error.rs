//! Error types module
//!
//! Unified error taxonomy for the Pictor components. Expected business
//! failures (validation, not-found, concurrency conflicts) cross component
//! boundaries inside result value types; `DomainError` is the structured
//! shape those values carry and the error type of fallible internal calls.
//! Infrastructure failures are converted into `Storage`/`Internal` variants
//! at the component boundary and never propagate as raw panics.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like retry exhaustion
    Warn,
    /// Error level - for unexpected failures
    Error,
}

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Concurrency conflict on {resource} after {attempts} attempts")]
    ConcurrencyConflict { resource: String, attempts: u32 },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Partial upload failure: {written} of {expected} renditions written before abort")]
    PartialFailure { written: usize, expected: usize },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<io::Error> for DomainError {
    fn from(err: io::Error) -> Self {
        DomainError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Validation(format!("JSON parsing error: {}", err))
    }
}

impl From<uuid::Error> for DomainError {
    fn from(err: uuid::Error) -> Self {
        DomainError::Validation(format!("UUID parsing error: {}", err))
    }
}

impl From<anyhow::Error> for DomainError {
    fn from(err: anyhow::Error) -> Self {
        DomainError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl DomainError {
    /// Machine-readable code for structured result payloads.
    pub fn error_code(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "VALIDATION_ERROR",
            DomainError::NotFound(_) => "NOT_FOUND",
            DomainError::ConcurrencyConflict { .. } => "CONCURRENCY_CONFLICT",
            DomainError::Storage(_) => "STORAGE_ERROR",
            DomainError::PartialFailure { .. } => "PARTIAL_FAILURE",
            DomainError::Internal(_) => "INTERNAL_ERROR",
            DomainError::InternalWithSource { .. } => "INTERNAL_ERROR",
        }
    }

    /// Whether a retry of the same call can reasonably succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DomainError::ConcurrencyConflict { .. }
                | DomainError::Storage(_)
                | DomainError::PartialFailure { .. }
        )
    }

    pub fn log_level(&self) -> LogLevel {
        match self {
            DomainError::Validation(_) | DomainError::NotFound(_) => LogLevel::Debug,
            DomainError::ConcurrencyConflict { .. } | DomainError::PartialFailure { .. } => {
                LogLevel::Warn
            }
            DomainError::Storage(_)
            | DomainError::Internal(_)
            | DomainError::InternalWithSource { .. } => LogLevel::Error,
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}
