//! Partitioned physical index store.
//!
//! A [`PhysicalStore`] holds the postings of one index in numbered partitions
//! kept in a [`Directory`]. Writes land in a partition's pending buffer and
//! stay invisible until [`PhysicalStore::refresh`] publishes every partition's
//! pending writes as one new snapshot. Readers work on the snapshot that was
//! current when they were opened.
//!
//! # Concurrency
//!
//! - Writes to different partitions do not contend
//! - `refresh` is serialized by a store-level lock and may run during writes
//! - The published snapshot is swapped in one step, so readers never see a
//!   partially refreshed store

mod codec;
mod partition;

pub use codec::{StoreState, StoreStatus};
pub use partition::{PartitionSnapshot, StoreSnapshot};

use crate::config::StoreConfig;
use crate::error::{IndexError, IndexResult};
use crate::reader::{IndexReader, ReaderToken};
use crate::register::IndexSample;
use crate::types::EntityId;
use crate::value::PropertyValue;
use parking_lot::{Mutex, RwLock};
use partition::{Partition, PostingOp};
use propidx_storage::{close_all, Directory, DirectoryFactory, StorageResult, StoreKind};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// A named, partitioned index store.
#[derive(Debug)]
pub struct PhysicalStore {
    name: String,
    path: PathBuf,
    factory: Arc<dyn DirectoryFactory>,
    config: StoreConfig,
    directory: RwLock<Option<Arc<dyn Directory>>>,
    partitions: RwLock<Vec<Arc<Partition>>>,
    published: RwLock<Arc<StoreSnapshot>>,
    refresh_lock: Mutex<()>,
    open_readers: Arc<AtomicUsize>,
    closed: AtomicBool,
}

impl PhysicalStore {
    /// Creates a handle for the index `name` stored at `path`.
    ///
    /// Nothing is touched until [`PhysicalStore::prepare`] or
    /// [`PhysicalStore::open`] is called. The backing kind is the factory's.
    pub fn new(
        name: impl Into<String>,
        factory: Arc<dyn DirectoryFactory>,
        path: &Path,
        config: StoreConfig,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.to_path_buf(),
            factory,
            config,
            directory: RwLock::new(None),
            partitions: RwLock::new(Vec::new()),
            published: RwLock::new(Arc::new(StoreSnapshot::default())),
            refresh_lock: Mutex::new(()),
            open_readers: Arc::new(AtomicUsize::new(0)),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the index name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the store path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the backing kind.
    #[must_use]
    pub fn kind(&self) -> StoreKind {
        self.factory.kind()
    }

    /// Returns true once [`PhysicalStore::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> IndexResult<()> {
        if self.is_closed() {
            return Err(IndexError::StoreClosed);
        }
        Ok(())
    }

    fn directory(&self) -> IndexResult<Arc<dyn Directory>> {
        self.ensure_open()?;
        self.directory
            .read()
            .clone()
            .ok_or_else(|| IndexError::illegal_state(format!("store '{}' is not open", self.name)))
    }

    fn attach_directory(&self) -> IndexResult<Arc<dyn Directory>> {
        if let Some(dir) = self.directory.read().clone() {
            return Ok(dir);
        }
        let dir = self.factory.open(&self.path)?;
        *self.directory.write() = Some(dir.clone());
        Ok(dir)
    }

    /// Wipes previous partitions and sets up an empty store with partition 0.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::StorageInit`] if the directory cannot be created.
    pub fn prepare(&self) -> IndexResult<()> {
        self.ensure_open()?;
        let init = || -> IndexResult<()> {
            let dir = self.attach_directory()?;
            dir.create()?;
            for seq in dir.list_partitions()? {
                dir.remove_partition(seq)?;
            }
            dir.write_status(&codec::encode_status(&StoreStatus::populating())?)?;
            Ok(())
        };
        init().map_err(|e| IndexError::storage_init(&self.name, e))?;

        *self.partitions.write() = vec![Arc::new(Partition::new(0))];
        *self.published.write() = Arc::new(StoreSnapshot::default());
        info!(index = %self.name, kind = %self.kind(), "prepared index store");
        Ok(())
    }

    /// Opens an existing committed store and publishes its persisted partitions.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::IndexNotFound`] if nothing exists at the path,
    /// [`IndexError::IndexNotOnline`] if population never committed, or a
    /// codec error if a partition is corrupted.
    pub fn open(&self) -> IndexResult<()> {
        self.ensure_open()?;
        let dir = self.attach_directory()?;
        if !dir.exists()? {
            return Err(IndexError::IndexNotFound {
                index: self.name.clone(),
            });
        }
        let status = dir
            .read_status()?
            .map(|bytes| codec::decode_status(&bytes))
            .transpose()?;
        if !status.as_ref().is_some_and(StoreStatus::is_online) {
            return Err(IndexError::IndexNotOnline {
                index: self.name.clone(),
                state: status.map(|s| s.state),
            });
        }

        let mut partitions = Vec::new();
        for seq in dir.list_partitions()? {
            let bytes = dir.read_partition(seq)?;
            partitions.push(Arc::new(Partition::from_snapshot(
                codec::decode_partition(seq, &bytes)?,
            )));
        }
        if partitions.is_empty() {
            partitions.push(Arc::new(Partition::new(0)));
        }

        let snapshot = StoreSnapshot::new(partitions.iter().map(|p| p.published()).collect());
        debug!(
            index = %self.name,
            partitions = partitions.len(),
            entries = snapshot.entry_count(),
            "opened index store"
        );
        *self.partitions.write() = partitions;
        *self.published.write() = Arc::new(snapshot);
        Ok(())
    }

    /// Takes exclusive ownership of an existing store, whatever its state,
    /// so it can be dropped.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::IndexNotFound`] if nothing exists at the path,
    /// or a path conflict if another store is populating it.
    pub fn claim(&self) -> IndexResult<()> {
        self.ensure_open()?;
        let dir = self.attach_directory()?;
        if !dir.exists()? {
            return Err(IndexError::IndexNotFound {
                index: self.name.clone(),
            });
        }
        dir.create()?;
        debug!(index = %self.name, "claimed index store");
        Ok(())
    }

    /// Returns the number of partitions.
    #[must_use]
    pub fn partition_count(&self) -> usize {
        self.partitions.read().len()
    }

    fn current_partition(&self) -> IndexResult<Arc<Partition>> {
        self.directory()?;
        {
            let partitions = self.partitions.read();
            if let Some(last) = partitions.last() {
                if last.entries() < self.config.max_partition_entries {
                    return Ok(last.clone());
                }
            }
        }

        let mut partitions = self.partitions.write();
        // Another writer may have rolled over meanwhile
        if let Some(last) = partitions.last() {
            if last.entries() < self.config.max_partition_entries {
                return Ok(last.clone());
            }
        }
        Ok(Self::push_partition(&mut partitions))
    }

    fn push_partition(partitions: &mut Vec<Arc<Partition>>) -> Arc<Partition> {
        let seq = partitions.last().map_or(0, |p| p.seq() + 1);
        let partition = Arc::new(Partition::new(seq));
        partitions.push(partition.clone());
        debug!(seq, "allocated partition");
        partition
    }

    /// Buffers the posting `value -> entity` in the current partition.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::StoreClosed`] if the store is closed.
    pub fn insert(&self, value: PropertyValue, entity: EntityId) -> IndexResult<()> {
        self.current_partition()?
            .push(PostingOp::Insert(value, entity));
        Ok(())
    }

    /// Buffers removal of the posting `value -> entity` in every partition.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::StoreClosed`] if the store is closed.
    pub fn delete(&self, value: &PropertyValue, entity: EntityId) -> IndexResult<()> {
        self.directory()?;
        for partition in self.partitions.read().iter() {
            partition.push(PostingOp::Delete(value.clone(), entity));
        }
        Ok(())
    }

    /// Allocates a fresh partition owned by a single worker.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::StoreClosed`] if the store is closed.
    pub fn partition_writer(&self) -> IndexResult<PartitionWriter<'_>> {
        self.directory()?;
        let partition = Self::push_partition(&mut self.partitions.write());
        Ok(PartitionWriter {
            store: self,
            partition,
        })
    }

    /// Publishes every pending write as one new snapshot.
    ///
    /// Blocks until all changed partitions are persisted. On failure nothing
    /// is published and pending writes are kept for the next attempt.
    ///
    /// # Errors
    ///
    /// Returns an error if a partition cannot be encoded or written.
    pub fn refresh(&self) -> IndexResult<()> {
        let _guard = self.refresh_lock.lock();
        let dir = self.directory()?;
        let partitions = self.partitions.read().clone();

        let drained: Vec<Vec<PostingOp>> = partitions.iter().map(|p| p.take_pending()).collect();
        let result = Self::persist(
            dir.as_ref(),
            &partitions,
            &drained,
            self.config.sync_on_refresh,
        );
        let snapshots = match result {
            Ok(snapshots) => snapshots,
            Err(e) => {
                for (partition, ops) in partitions.iter().zip(drained) {
                    partition.restore_pending(ops);
                }
                return Err(e);
            }
        };

        let mut visible = Vec::with_capacity(partitions.len());
        for (partition, snapshot) in partitions.iter().zip(snapshots) {
            partition.publish(snapshot.clone(), partition.pending_inserts());
            visible.push(snapshot);
        }
        let snapshot = StoreSnapshot::new(visible);
        debug!(
            index = %self.name,
            partitions = partitions.len(),
            entries = snapshot.entry_count(),
            "refreshed index store"
        );
        *self.published.write() = Arc::new(snapshot);
        Ok(())
    }

    fn persist(
        dir: &dyn Directory,
        partitions: &[Arc<Partition>],
        drained: &[Vec<PostingOp>],
        sync: bool,
    ) -> IndexResult<Vec<Arc<PartitionSnapshot>>> {
        let mut snapshots = Vec::with_capacity(partitions.len());
        for (partition, ops) in partitions.iter().zip(drained) {
            let current = partition.published();
            if ops.is_empty() && !partition.needs_persist() {
                snapshots.push(current);
                continue;
            }
            let next = current.apply(ops);
            dir.write_partition(partition.seq(), &codec::encode_partition(&next)?)?;
            snapshots.push(Arc::new(next));
        }
        if sync {
            dir.sync()?;
        }
        Ok(snapshots)
    }

    /// Opens a reader over the currently published snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::StoreClosed`] if the store is closed.
    pub fn reader(&self) -> IndexResult<IndexReader> {
        self.ensure_open()?;
        let snapshot = self.published.read().clone();
        Ok(IndexReader::new(
            snapshot,
            ReaderToken::acquire(&self.open_readers),
        ))
    }

    /// Returns the number of readers not yet released.
    #[must_use]
    pub fn open_readers(&self) -> usize {
        self.open_readers.load(Ordering::Acquire)
    }

    /// Returns the currently published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<StoreSnapshot> {
        self.published.read().clone()
    }

    /// Records the store as committed together with its final sample.
    ///
    /// # Errors
    ///
    /// Returns an error if the status cannot be written.
    pub fn mark_online(&self, sample: IndexSample) -> IndexResult<()> {
        let dir = self.directory()?;
        dir.write_status(&codec::encode_status(&StoreStatus::online(sample))?)?;
        dir.sync()?;
        Ok(())
    }

    /// Reads the persisted status, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the status record cannot be read or decoded.
    pub fn status(&self) -> IndexResult<Option<StoreStatus>> {
        self.ensure_open()?;
        let dir = self.attach_directory()?;
        dir.read_status()?
            .map(|bytes| codec::decode_status(&bytes))
            .transpose()
    }

    /// Discards all data: partitions, pending writes and status.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be removed.
    pub fn drop_data(&self) -> IndexResult<()> {
        let _guard = self.refresh_lock.lock();
        let dir = self.directory()?;
        self.partitions.write().clear();
        *self.published.write() = Arc::new(StoreSnapshot::default());
        dir.destroy()?;
        info!(index = %self.name, "dropped index store");
        Ok(())
    }

    /// Releases every partition and the directory.
    ///
    /// Every release is attempted even after failures; all failures are
    /// reported together. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Close`] listing every failure.
    pub fn close(&self) -> IndexResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let _guard = self.refresh_lock.lock();
        let partitions = std::mem::take(&mut *self.partitions.write());
        let Some(dir) = self.directory.write().take() else {
            return Ok(());
        };

        let mut closers: Vec<Box<dyn FnOnce() -> StorageResult<()> + '_>> =
            Vec::with_capacity(partitions.len() + 1);
        for partition in &partitions {
            let dir = &dir;
            let seq = partition.seq();
            closers.push(Box::new(move || dir.release_partition(seq)));
        }
        closers.push(Box::new(|| dir.close()));

        close_all(closers)?;
        debug!(index = %self.name, "closed index store");
        Ok(())
    }
}

/// Writes into one partition allocated for a single worker.
#[derive(Debug)]
pub struct PartitionWriter<'a> {
    store: &'a PhysicalStore,
    partition: Arc<Partition>,
}

impl PartitionWriter<'_> {
    /// Returns the partition sequence number.
    #[must_use]
    pub fn seq(&self) -> u32 {
        self.partition.seq()
    }

    /// Buffers the posting `value -> entity` in this writer's partition.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::StoreClosed`] if the store is closed.
    pub fn insert(&self, value: PropertyValue, entity: EntityId) -> IndexResult<()> {
        self.store.ensure_open()?;
        self.partition.push(PostingOp::Insert(value, entity));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use propidx_storage::{FsDirectoryFactory, InMemoryDirectoryFactory, StorageError};

    fn memory_store(config: StoreConfig) -> PhysicalStore {
        PhysicalStore::new(
            "test_index",
            Arc::new(InMemoryDirectoryFactory::new()),
            Path::new("indexes/test_index"),
            config,
        )
    }

    fn scan(store: &PhysicalStore) -> Vec<u64> {
        store
            .reader()
            .unwrap()
            .scan()
            .map(EntityId::as_u64)
            .collect()
    }

    #[test]
    fn writes_invisible_until_refresh() {
        let store = memory_store(StoreConfig::default());
        store.prepare().unwrap();
        store.insert("foo".into(), EntityId::new(1)).unwrap();

        assert!(scan(&store).is_empty());
        store.refresh().unwrap();
        assert_eq!(scan(&store), vec![1]);
    }

    #[test]
    fn reader_keeps_its_snapshot() {
        let store = memory_store(StoreConfig::default());
        store.prepare().unwrap();
        store.insert("foo".into(), EntityId::new(1)).unwrap();
        store.refresh().unwrap();

        let reader = store.reader().unwrap();
        store.insert("bar".into(), EntityId::new(2)).unwrap();
        store.refresh().unwrap();

        assert_eq!(reader.scan().map(EntityId::as_u64).collect::<Vec<_>>(), vec![1]);
        assert_eq!(scan(&store), vec![1, 2]);
    }

    #[test]
    fn rolls_over_to_new_partitions() {
        let store = memory_store(StoreConfig::new().max_partition_entries(2));
        store.prepare().unwrap();
        for id in [5, 3, 9, 1, 7] {
            store.insert(PropertyValue::Int(id as i64), EntityId::new(id)).unwrap();
        }
        assert_eq!(store.partition_count(), 3);

        store.refresh().unwrap();
        assert_eq!(scan(&store), vec![1, 3, 5, 7, 9]);
        assert_eq!(store.snapshot().partitions().len(), 3);
    }

    #[test]
    fn delete_reaches_every_partition() {
        let store = memory_store(StoreConfig::new().max_partition_entries(1));
        store.prepare().unwrap();
        store.insert("a".into(), EntityId::new(1)).unwrap();
        store.insert("a".into(), EntityId::new(2)).unwrap();
        store.refresh().unwrap();

        store.delete(&"a".into(), EntityId::new(1)).unwrap();
        store.refresh().unwrap();
        assert_eq!(scan(&store), vec![2]);
    }

    #[test]
    fn partition_writers_are_independent() {
        let store = memory_store(StoreConfig::default());
        store.prepare().unwrap();

        std::thread::scope(|scope| {
            for worker in 0..4_u64 {
                let writer = store.partition_writer().unwrap();
                scope.spawn(move || {
                    for i in 0..25 {
                        let id = worker * 100 + i;
                        writer.insert(PropertyValue::Int(i as i64), EntityId::new(id)).unwrap();
                    }
                });
            }
        });

        store.refresh().unwrap();
        assert_eq!(store.partition_count(), 5);
        assert_eq!(store.snapshot().entry_count(), 100);
    }

    #[test]
    fn prepare_wipes_previous_contents() {
        let store = memory_store(StoreConfig::default());
        store.prepare().unwrap();
        store.insert("foo".into(), EntityId::new(1)).unwrap();
        store.refresh().unwrap();

        store.prepare().unwrap();
        assert!(scan(&store).is_empty());
        assert_eq!(store.status().unwrap(), Some(StoreStatus::populating()));
    }

    #[test]
    fn drop_data_removes_everything() {
        let store = memory_store(StoreConfig::default());
        store.prepare().unwrap();
        store.insert("foo".into(), EntityId::new(1)).unwrap();
        store.refresh().unwrap();

        store.drop_data().unwrap();
        assert!(scan(&store).is_empty());
        assert_eq!(store.status().unwrap(), None);
        assert!(matches!(store.open(), Err(IndexError::IndexNotFound { .. })));
    }

    #[test]
    fn open_missing_store() {
        let store = memory_store(StoreConfig::default());
        assert!(matches!(store.open(), Err(IndexError::IndexNotFound { .. })));
    }

    #[test]
    fn closed_store_rejects_everything() {
        let store = memory_store(StoreConfig::default());
        store.prepare().unwrap();
        store.close().unwrap();
        store.close().unwrap();

        assert!(matches!(
            store.insert("foo".into(), EntityId::new(1)),
            Err(IndexError::StoreClosed)
        ));
        assert!(matches!(store.refresh(), Err(IndexError::StoreClosed)));
        assert!(matches!(store.reader(), Err(IndexError::StoreClosed)));
    }

    #[test]
    fn insert_before_prepare_is_illegal() {
        let store = memory_store(StoreConfig::default());
        let err = store.insert("foo".into(), EntityId::new(1)).unwrap_err();
        assert!(err.is_illegal_state());
    }

    #[test]
    fn on_disk_store_reopens() {
        let temp = tempfile::tempdir().unwrap();
        let factory: Arc<dyn DirectoryFactory> = Arc::new(FsDirectoryFactory::new());
        let path = temp.path().join("person_name");

        let store = PhysicalStore::new("person_name", factory.clone(), &path, StoreConfig::default());
        store.prepare().unwrap();
        store.insert("foo".into(), EntityId::new(42)).unwrap();
        store.insert("bar".into(), EntityId::new(2)).unwrap();
        store.refresh().unwrap();
        store.mark_online(IndexSample::new(2, 2, 2)).unwrap();
        store.close().unwrap();

        let reopened = PhysicalStore::new("person_name", factory, &path, StoreConfig::default());
        reopened.open().unwrap();
        assert_eq!(scan(&reopened), vec![2, 42]);
        let status = reopened.status().unwrap().unwrap();
        assert!(status.is_online());
        assert_eq!(status.sample, Some(IndexSample::new(2, 2, 2)));
        assert_eq!(reopened.kind(), StoreKind::OnDisk);
    }

    #[test]
    fn second_populating_store_on_same_path_conflicts() {
        let temp = tempfile::tempdir().unwrap();
        let factory: Arc<dyn DirectoryFactory> = Arc::new(FsDirectoryFactory::new());
        let path = temp.path().join("idx");

        let first = PhysicalStore::new("idx", factory.clone(), &path, StoreConfig::default());
        first.prepare().unwrap();

        let second = PhysicalStore::new("idx", factory, &path, StoreConfig::default());
        assert!(matches!(
            second.prepare(),
            Err(IndexError::StorageInit { .. })
        ));
    }

    #[test]
    fn uncommitted_store_does_not_open() {
        let factory: Arc<dyn DirectoryFactory> = Arc::new(InMemoryDirectoryFactory::new());
        let path = Path::new("indexes/partial");

        let store = PhysicalStore::new("partial", factory.clone(), path, StoreConfig::default());
        store.prepare().unwrap();
        store.insert("foo".into(), EntityId::new(1)).unwrap();
        store.refresh().unwrap();
        store.close().unwrap();

        let reopened = PhysicalStore::new("partial", factory, path, StoreConfig::default());
        match reopened.open() {
            Err(IndexError::IndexNotOnline { index, state }) => {
                assert_eq!(index, "partial");
                assert_eq!(state, Some(StoreState::Populating));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(scan(&reopened).is_empty());
    }

    #[test]
    fn claim_conflicts_with_populating_store() {
        let temp = tempfile::tempdir().unwrap();
        let factory: Arc<dyn DirectoryFactory> = Arc::new(FsDirectoryFactory::new());
        let path = temp.path().join("idx");

        let populating = PhysicalStore::new("idx", factory.clone(), &path, StoreConfig::default());
        populating.prepare().unwrap();

        let dropper = PhysicalStore::new("idx", factory.clone(), &path, StoreConfig::default());
        assert!(matches!(
            dropper.claim(),
            Err(IndexError::Storage(StorageError::PathConflict { .. }))
        ));
        assert!(path.exists());

        populating.close().unwrap();
        let dropper = PhysicalStore::new("idx", factory.clone(), &path, StoreConfig::default());
        dropper.claim().unwrap();
        dropper.drop_data().unwrap();
        assert!(!path.exists());

        let missing = PhysicalStore::new("idx", factory, &path, StoreConfig::default());
        assert!(matches!(missing.claim(), Err(IndexError::IndexNotFound { .. })));
    }
}
