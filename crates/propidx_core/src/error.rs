//! Error types for propidx core.

use crate::store::StoreState;
use crate::transaction::Status;
use propidx_storage::{MultiError, StorageError};
use thiserror::Error;

/// Result type for core operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Errors that can occur while populating, refreshing or reading an index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The store or its partitions could not be created.
    ///
    /// The caller must not add to the index.
    #[error("failed to initialize storage for index '{index}'")]
    StorageInit {
        /// Name of the index.
        index: String,
        /// Underlying failure.
        #[source]
        source: Box<IndexError>,
    },

    /// A write during population failed.
    ///
    /// The populator is tainted; the only valid recovery is dropping it.
    #[error("failed to write to index '{index}'")]
    IndexWrite {
        /// Name of the index.
        index: String,
        /// Underlying failure.
        #[source]
        source: Box<IndexError>,
    },

    /// Releasing resources failed; every failure is kept.
    #[error("close failed: {0}")]
    Close(#[from] MultiError),

    /// A lifecycle method was called out of order.
    #[error("illegal state: {message}")]
    IllegalState {
        /// Description of the misuse.
        message: String,
    },

    /// The enclosing transaction was terminated, so the index was not committed.
    #[error("transaction terminated ({status}); index dropped instead of committed")]
    TransactionTerminated {
        /// Why the transaction was terminated.
        status: Status,
    },

    /// The store has been closed.
    #[error("index store is closed")]
    StoreClosed,

    /// No index exists at the store location.
    #[error("index '{index}' not found")]
    IndexNotFound {
        /// Name of the index.
        index: String,
    },

    /// An index exists at the store location but was never committed.
    ///
    /// Partially populated data is never served.
    #[error("index '{index}' is not online (recorded state: {state:?})")]
    IndexNotOnline {
        /// Name of the index.
        index: String,
        /// Recorded lifecycle state, if a status record exists.
        state: Option<StoreState>,
    },

    /// A partition or status record could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },
}

impl IndexError {
    /// Creates a storage initialization error.
    pub fn storage_init(index: impl Into<String>, source: impl Into<IndexError>) -> Self {
        Self::StorageInit {
            index: index.into(),
            source: Box::new(source.into()),
        }
    }

    /// Creates an index write error.
    pub fn index_write(index: impl Into<String>, source: impl Into<IndexError>) -> Self {
        Self::IndexWrite {
            index: index.into(),
            source: Box::new(source.into()),
        }
    }

    /// Creates an illegal state error.
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }

    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Returns true for programmer errors (out-of-order lifecycle calls).
    #[must_use]
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, Self::IllegalState { .. })
    }
}
