//! In-memory directory backend.

use crate::directory::{Directory, DirectoryFactory, StoreKind};
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct MemoryData {
    created: bool,
    partitions: BTreeMap<u32, Vec<u8>>,
    status: Option<Vec<u8>>,
}

/// An in-memory directory.
///
/// Suitable for:
/// - Unit and integration tests
/// - Transient indexes that are rebuilt on every start
///
/// Handles opened for the same path through one
/// [`InMemoryDirectoryFactory`] share their data, so an index can be
/// reopened after its handle was closed.
///
/// # Example
///
/// ```rust
/// use propidx_storage::{Directory, InMemoryDirectory};
///
/// let dir = InMemoryDirectory::new();
/// dir.create().unwrap();
/// dir.write_partition(3, b"abc").unwrap();
/// assert_eq!(dir.list_partitions().unwrap(), vec![3]);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    data: Arc<RwLock<MemoryData>>,
    closed: AtomicBool,
}

impl InMemoryDirectory {
    /// Creates a standalone directory not tied to any factory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn shared(data: Arc<RwLock<MemoryData>>) -> Self {
        Self {
            data,
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed);
        }
        Ok(())
    }

    /// Returns the total number of bytes held across partitions.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.data
            .read()
            .partitions
            .values()
            .map(|p| p.len() as u64)
            .sum()
    }
}

impl Directory for InMemoryDirectory {
    fn kind(&self) -> StoreKind {
        StoreKind::InMemory
    }

    fn create(&self) -> StorageResult<()> {
        self.ensure_open()?;
        self.data.write().created = true;
        Ok(())
    }

    fn exists(&self) -> StorageResult<bool> {
        self.ensure_open()?;
        Ok(self.data.read().created)
    }

    fn list_partitions(&self) -> StorageResult<Vec<u32>> {
        self.ensure_open()?;
        Ok(self.data.read().partitions.keys().copied().collect())
    }

    fn write_partition(&self, seq: u32, data: &[u8]) -> StorageResult<()> {
        self.ensure_open()?;
        let mut inner = self.data.write();
        inner.created = true;
        inner.partitions.insert(seq, data.to_vec());
        Ok(())
    }

    fn read_partition(&self, seq: u32) -> StorageResult<Vec<u8>> {
        self.ensure_open()?;
        self.data
            .read()
            .partitions
            .get(&seq)
            .cloned()
            .ok_or(StorageError::PartitionNotFound { seq })
    }

    fn remove_partition(&self, seq: u32) -> StorageResult<()> {
        self.ensure_open()?;
        self.data.write().partitions.remove(&seq);
        Ok(())
    }

    fn release_partition(&self, _seq: u32) -> StorageResult<()> {
        // Nothing is held per partition
        self.ensure_open()
    }

    fn sync(&self) -> StorageResult<()> {
        self.ensure_open()
    }

    fn write_status(&self, data: &[u8]) -> StorageResult<()> {
        self.ensure_open()?;
        let mut inner = self.data.write();
        inner.created = true;
        inner.status = Some(data.to_vec());
        Ok(())
    }

    fn read_status(&self) -> StorageResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        Ok(self.data.read().status.clone())
    }

    fn destroy(&self) -> StorageResult<()> {
        self.ensure_open()?;
        *self.data.write() = MemoryData::default();
        Ok(())
    }

    fn close(&self) -> StorageResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// Factory for [`InMemoryDirectory`] handles.
///
/// Keeps the data of every path it has opened until the factory is closed.
#[derive(Debug, Default)]
pub struct InMemoryDirectoryFactory {
    directories: RwLock<HashMap<PathBuf, Arc<RwLock<MemoryData>>>>,
    closed: AtomicBool,
}

impl InMemoryDirectoryFactory {
    /// Creates an empty factory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DirectoryFactory for InMemoryDirectoryFactory {
    fn kind(&self) -> StoreKind {
        StoreKind::InMemory
    }

    fn open(&self, path: &Path) -> StorageResult<Arc<dyn Directory>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed);
        }
        let data = self
            .directories
            .write()
            .entry(path.to_path_buf())
            .or_default()
            .clone();
        Ok(Arc::new(InMemoryDirectory::shared(data)))
    }

    fn close(&self) -> StorageResult<()> {
        self.closed.store(true, Ordering::Release);
        self.directories.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_new_is_not_created() {
        let dir = InMemoryDirectory::new();
        assert!(!dir.exists().unwrap());
        assert!(dir.list_partitions().unwrap().is_empty());
    }

    #[test]
    fn memory_write_and_read_partition() {
        let dir = InMemoryDirectory::new();
        dir.create().unwrap();
        dir.write_partition(0, b"hello").unwrap();
        dir.write_partition(0, b"world").unwrap();

        assert_eq!(dir.read_partition(0).unwrap(), b"world");
        assert_eq!(dir.size(), 5);
    }

    #[test]
    fn memory_read_missing_partition_fails() {
        let dir = InMemoryDirectory::new();
        let result = dir.read_partition(9);
        assert!(matches!(
            result,
            Err(StorageError::PartitionNotFound { seq: 9 })
        ));
    }

    #[test]
    fn memory_partitions_listed_ascending() {
        let dir = InMemoryDirectory::new();
        for seq in [4, 1, 2] {
            dir.write_partition(seq, b"x").unwrap();
        }
        assert_eq!(dir.list_partitions().unwrap(), vec![1, 2, 4]);

        dir.remove_partition(2).unwrap();
        dir.remove_partition(99).unwrap();
        assert_eq!(dir.list_partitions().unwrap(), vec![1, 4]);
    }

    #[test]
    fn memory_status_roundtrip() {
        let dir = InMemoryDirectory::new();
        assert!(dir.read_status().unwrap().is_none());
        dir.write_status(b"online").unwrap();
        assert_eq!(dir.read_status().unwrap().unwrap(), b"online");
    }

    #[test]
    fn memory_destroy_clears_everything() {
        let dir = InMemoryDirectory::new();
        dir.create().unwrap();
        dir.write_partition(0, b"x").unwrap();
        dir.write_status(b"s").unwrap();

        dir.destroy().unwrap();

        assert!(!dir.exists().unwrap());
        assert!(dir.list_partitions().unwrap().is_empty());
        assert!(dir.read_status().unwrap().is_none());
    }

    #[test]
    fn memory_closed_rejects_operations() {
        let dir = InMemoryDirectory::new();
        dir.close().unwrap();
        dir.close().unwrap();

        assert!(matches!(dir.create(), Err(StorageError::Closed)));
        assert!(matches!(dir.release_partition(0), Err(StorageError::Closed)));
    }

    #[test]
    fn factory_shares_data_per_path() {
        let factory = InMemoryDirectoryFactory::new();
        let first = factory.open(Path::new("a")).unwrap();
        first.write_partition(1, b"data").unwrap();
        first.close().unwrap();

        let second = factory.open(Path::new("a")).unwrap();
        assert_eq!(second.read_partition(1).unwrap(), b"data");

        let other = factory.open(Path::new("b")).unwrap();
        assert!(other.list_partitions().unwrap().is_empty());
    }

    #[test]
    fn factory_closed_rejects_open() {
        let factory = InMemoryDirectoryFactory::new();
        factory.close().unwrap();
        assert!(matches!(
            factory.open(Path::new("a")),
            Err(StorageError::Closed)
        ));
    }
}
