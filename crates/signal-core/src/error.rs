//! Configuration error types

use thiserror::Error;

/// Errors raised while validating a configuration value
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// Minimum green exceeds the ceiling
    #[error("min green ({min}s) exceeds max green ({max}s)")]
    GreenBounds { min: u64, max: u64 },

    /// A duration that must be positive was zero
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    /// Signal sequence is not a permutation of the four lanes
    #[error("signal sequence must name each of the four lanes exactly once, got {0:?}")]
    InvalidSequence(Vec<String>),

    /// Confidence threshold outside [0, 1]
    #[error("detection confidence {0} outside [0, 1]")]
    Confidence(f32),

    /// Offline ceiling not above the staleness window
    #[error("offline ceiling ({offline_ms}ms) must exceed the staleness window ({stale_ms}ms)")]
    OfflineCeiling { offline_ms: u64, stale_ms: u64 },

    /// Value above the accepted upper bound
    #[error("{field} = {value} exceeds the maximum of {max}")]
    TooLarge {
        field: &'static str,
        value: u64,
        max: u64,
    },

    /// Unknown value in a configuration field
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}
