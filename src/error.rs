//! Error types for the index core.

use std::io;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LoupeError>;

/// Errors produced while building or reading an index.
#[derive(Error, Debug)]
pub enum LoupeError {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON (de)serialization failure for configuration or sidecar files.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// On-disk data is structurally invalid: truncated, bad magic, bad checksum.
    #[error("Corrupt data: {0}")]
    Corruption(String),

    /// Index construction or lookup failure.
    #[error("Index error: {0}")]
    Index(String),

    /// Storage layer failure (mapping, file layout).
    #[error("Storage error: {0}")]
    Storage(String),

    /// A caller supplied an argument outside the accepted domain.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is not valid in the current state.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("{0}")]
    Other(String),
}

impl LoupeError {
    pub fn corruption<S: Into<String>>(msg: S) -> Self {
        LoupeError::Corruption(msg.into())
    }

    pub fn index<S: Into<String>>(msg: S) -> Self {
        LoupeError::Index(msg.into())
    }

    pub fn storage<S: Into<String>>(msg: S) -> Self {
        LoupeError::Storage(msg.into())
    }

    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        LoupeError::InvalidArgument(msg.into())
    }

    pub fn invalid_operation<S: Into<String>>(msg: S) -> Self {
        LoupeError::InvalidOperation(msg.into())
    }

    pub fn other<S: Into<String>>(msg: S) -> Self {
        LoupeError::Other(msg.into())
    }

    /// True when the error reports structurally invalid on-disk data.
    pub fn is_corruption(&self) -> bool {
        matches!(self, LoupeError::Corruption(_))
    }
}
