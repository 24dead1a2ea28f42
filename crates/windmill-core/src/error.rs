//! Core error types.

use thiserror::Error;

/// Errors produced by the storage and configuration layers.
///
/// Nothing on the fan-out path returns this type: broadcasting and channel
/// delivery are infallible by construction.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A reading failed validation.
    #[error("invalid reading: {0}")]
    InvalidReading(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
