//! Error types for the songmap engine.

use crate::record::RecordId;
use thiserror::Error;

/// The main error type for songmap operations.
#[derive(Error, Debug)]
pub enum SongmapError {
    /// Attribute domain with `min > max`, non-finite bounds, or an unsupported kind.
    #[error("Invalid attribute domain: {0}")]
    InvalidDomain(String),

    /// Training was requested over an empty set of patterns.
    #[error("Empty training set")]
    EmptyTrainingSet,

    /// A codebook update produced a non-finite value.
    #[error("Non-finite codebook value at iteration {iteration} (unit {unit})")]
    NumericOverflow {
        /// Iteration (1-based) in which the update failed.
        iteration: usize,
        /// Index of the unit whose update failed.
        unit: usize,
    },

    /// No assigned unit holds a record with this id.
    #[error("Unknown record: {0}")]
    UnknownRecord(RecordId),

    /// Vector length does not match the grid's attribute count.
    #[error("Grid size mismatch: grid has {expected} attributes, input has {actual}")]
    GridSizeMismatch {
        /// Attribute count of the grid.
        expected: usize,
        /// Length of the offending vector.
        actual: usize,
    },

    /// Record with unusable feature values.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Snapshot file with a bad header or inconsistent contents.
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

/// Result type alias for songmap operations.
pub type Result<T> = std::result::Result<T, SongmapError>;

impl From<bincode::Error> for SongmapError {
    fn from(err: bincode::Error) -> Self {
        SongmapError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for SongmapError {
    fn from(err: serde_json::Error) -> Self {
        SongmapError::Serialization(err.to_string())
    }
}
