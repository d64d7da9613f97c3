//! Error types for storage operations.

use crate::multi::MultiError;
use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The path is already taken by something that is not a usable directory,
    /// or another store holds it.
    #[error("path conflict at {path}: {reason}")]
    PathConflict {
        /// The conflicting path.
        path: String,
        /// Why the path cannot be used.
        reason: String,
    },

    /// The requested partition does not exist.
    #[error("partition {seq} not found")]
    PartitionNotFound {
        /// Partition sequence number.
        seq: u32,
    },

    /// Stored data is corrupted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// The directory or factory is closed.
    #[error("storage is closed")]
    Closed,

    /// Several failures collected while releasing resources.
    #[error(transparent)]
    Multiple(#[from] MultiError),
}

impl StorageError {
    /// Creates a path conflict error.
    pub fn path_conflict(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PathConflict {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
