//! Directory capability traits.

use crate::error::StorageResult;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// The kind of backing a directory provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    /// Data lives in process memory and disappears with it.
    InMemory,
    /// Data lives in files under a directory tree.
    OnDisk,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InMemory => f.write_str("in-memory"),
            Self::OnDisk => f.write_str("on-disk"),
        }
    }
}

/// A named container of index partitions.
///
/// Directories are **opaque partition stores**. They keep the bytes written
/// for each partition sequence number plus one status record, and know nothing
/// about the encoding of either.
///
/// # Invariants
///
/// - `write_partition` replaces the partition atomically: a reader sees the old
///   bytes or the new bytes, never a mix
/// - `list_partitions` returns sequence numbers in ascending order
/// - After `close`, every operation fails with [`crate::StorageError::Closed`]
///
/// # Implementors
///
/// - [`crate::InMemoryDirectory`] - For testing and transient indexes
/// - [`crate::FsDirectory`] - For persistent indexes
pub trait Directory: Send + Sync + fmt::Debug {
    /// Returns the kind of backing this directory uses.
    fn kind(&self) -> StoreKind;

    /// Creates the directory if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::PathConflict`] if the location is taken by
    /// something that cannot hold partitions or is held by another store.
    fn create(&self) -> StorageResult<()>;

    /// Returns true if the directory has been created.
    ///
    /// # Errors
    ///
    /// Returns an error if the existence check fails.
    fn exists(&self) -> StorageResult<bool>;

    /// Lists the sequence numbers of stored partitions, ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    fn list_partitions(&self) -> StorageResult<Vec<u32>>;

    /// Writes (or replaces) the bytes of a partition.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn write_partition(&self, seq: u32, data: &[u8]) -> StorageResult<()>;

    /// Reads the bytes of a partition.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::PartitionNotFound`] if the partition was
    /// never written.
    fn read_partition(&self, seq: u32) -> StorageResult<Vec<u8>>;

    /// Removes a partition. Removing a missing partition is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal fails.
    fn remove_partition(&self, seq: u32) -> StorageResult<()>;

    /// Releases any handle held for a partition.
    ///
    /// # Errors
    ///
    /// Returns an error if the partition cannot be released.
    fn release_partition(&self, seq: u32) -> StorageResult<()>;

    /// Makes every completed write durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    fn sync(&self) -> StorageResult<()>;

    /// Writes the status record.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn write_status(&self, data: &[u8]) -> StorageResult<()>;

    /// Reads the status record, if one was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn read_status(&self) -> StorageResult<Option<Vec<u8>>>;

    /// Removes every partition, the status record and the directory itself.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal fails.
    fn destroy(&self) -> StorageResult<()>;

    /// Closes the directory. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if held resources cannot be released.
    fn close(&self) -> StorageResult<()>;
}

/// Hands out directories for paths.
///
/// A factory is a resource of its own: closing it invalidates the directories
/// it has not handed out yet, and for the in-memory variant drops all data.
pub trait DirectoryFactory: Send + Sync + fmt::Debug {
    /// Returns the kind of directories this factory produces.
    fn kind(&self) -> StoreKind;

    /// Opens the directory for `path`. The directory is not created until
    /// [`Directory::create`] is called.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::Closed`] if the factory is closed.
    fn open(&self, path: &Path) -> StorageResult<Arc<dyn Directory>>;

    /// Closes the factory.
    ///
    /// # Errors
    ///
    /// Returns an error if resources cannot be released.
    fn close(&self) -> StorageResult<()>;
}
