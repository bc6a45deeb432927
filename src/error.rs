// src/error.rs

//! Crate-wide error type and result alias.
//!
//! The taxonomy is deliberately small: expected-absence conditions (no prior
//! version, no associated inputs) are represented as empty results by the
//! callers, not as errors. Errors here mean a missing file/record, invalid
//! input, or an inconsistency discovered in durable state.

use thiserror::Error;

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// All errors produced by the engine
#[derive(Debug, Error)]
pub enum Error {
    /// A file or record that was asked for does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid caller input (non-serializable configuration, bad arguments)
    #[error("validation failed: {0}")]
    Validation(String),

    /// Durable state is internally inconsistent (e.g. duplicate version
    /// number within one lineage discovered on re-read)
    #[error("conflict: {0}")]
    Conflict(String),

    /// A persisted line or identifier could not be parsed
    #[error("parse error: {0}")]
    Parse(String),

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure outside the tolerant log-load path
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
