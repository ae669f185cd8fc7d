//! Semantic validation for configuration files.
//!
//! Serde checks shape and types; this checks values that parse fine but
//! cannot be used.

use thiserror::Error;

use super::{QuellConfig, CONFIG_SCHEMA_VERSION};

/// Shortest poll interval accepted.
pub const MIN_POLL_INTERVAL_MS: u64 = 100;

/// Longest poll interval accepted (one hour).
pub const MAX_POLL_INTERVAL_MS: u64 = 3_600_000;

/// Errors that can occur during semantic validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("poll_interval_ms must be in [{min}, {max}] (got {value})")]
    PollIntervalRange { value: u64, min: u64, max: u64 },

    #[error("Schema version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

pub fn validate_config(config: &QuellConfig) -> Result<(), ValidationError> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version.clone(),
        });
    }

    if !(MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&config.poll_interval_ms) {
        return Err(ValidationError::PollIntervalRange {
            value: config.poll_interval_ms,
            min: MIN_POLL_INTERVAL_MS,
            max: MAX_POLL_INTERVAL_MS,
        });
    }

    Ok(())
}
