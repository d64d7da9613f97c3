//! Test fixtures and index helpers.
//!
//! Provides stores backed by either directory kind and a directory wrapper
//! that injects release failures.

use parking_lot::Mutex;
use propidx_core::{
    EntityId, IndexPopulator, NonUniquePopulator, PhysicalStore, SampleRegister, SamplingConfig,
    StoreConfig,
};
use propidx_storage::{
    Directory, DirectoryFactory, FsDirectoryFactory, InMemoryDirectoryFactory, StorageError,
    StorageResult, StoreKind,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Name of every fixture index.
pub const TEST_INDEX: &str = "person_name";

/// A store with automatic cleanup of its on-disk files.
pub struct TestIndex {
    /// The store under test.
    pub store: Arc<PhysicalStore>,
    /// The factory the store's directory came from.
    pub factory: Arc<dyn DirectoryFactory>,
    path: PathBuf,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestIndex {
    /// Creates an in-memory index.
    pub fn memory() -> Self {
        Self::memory_with(StoreConfig::default())
    }

    /// Creates an in-memory index with `config`.
    pub fn memory_with(config: StoreConfig) -> Self {
        Self::with_factory(
            Arc::new(InMemoryDirectoryFactory::new()),
            PathBuf::from("indexes").join(TEST_INDEX),
            config,
            None,
        )
    }

    /// Creates an on-disk index in a fresh temporary directory.
    pub fn file() -> Self {
        Self::file_with(StoreConfig::default())
    }

    /// Creates an on-disk index with `config`.
    pub fn file_with(config: StoreConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join(TEST_INDEX);
        Self::with_factory(
            Arc::new(FsDirectoryFactory::new()),
            path,
            config,
            Some(temp_dir),
        )
    }

    /// Creates an index of `kind`.
    pub fn of_kind(kind: StoreKind, config: StoreConfig) -> Self {
        match kind {
            StoreKind::InMemory => Self::memory_with(config),
            StoreKind::OnDisk => Self::file_with(config),
        }
    }

    /// Creates an index over any factory.
    pub fn with_factory(
        factory: Arc<dyn DirectoryFactory>,
        path: PathBuf,
        config: StoreConfig,
        temp_dir: Option<TempDir>,
    ) -> Self {
        let store = Arc::new(PhysicalStore::new(
            TEST_INDEX,
            factory.clone(),
            &path,
            config,
        ));
        Self {
            store,
            factory,
            path,
            _temp_dir: temp_dir,
        }
    }

    /// Returns the store path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns a populator over the store with default sampling.
    pub fn populator(&self) -> NonUniquePopulator {
        self.populator_with(SamplingConfig::default())
    }

    /// Returns a populator over the store with `sampling`.
    pub fn populator_with(&self, sampling: SamplingConfig) -> NonUniquePopulator {
        NonUniquePopulator::new(self.store.clone(), sampling)
    }

    /// Returns a created populator ready for `add()`.
    pub fn created_populator(&self) -> NonUniquePopulator {
        let mut populator = self.populator();
        populator.create().expect("Failed to create populator");
        populator
    }

    /// Scans the store's published snapshot.
    pub fn scan(&self) -> Vec<u64> {
        scan_store(&self.store)
    }

    /// Opens a second store over the same location and loads it.
    pub fn reopen(&self) -> PhysicalStore {
        let store = PhysicalStore::new(
            TEST_INDEX,
            self.factory.clone(),
            &self.path,
            StoreConfig::default(),
        );
        store.open().expect("Failed to reopen index");
        store
    }
}

impl std::ops::Deref for TestIndex {
    type Target = PhysicalStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test once per directory kind.
pub fn with_each_kind<F>(mut f: F)
where
    F: FnMut(TestIndex),
{
    for kind in [StoreKind::InMemory, StoreKind::OnDisk] {
        f(TestIndex::of_kind(kind, StoreConfig::default()));
    }
}

/// Scans the published snapshot of `store`.
pub fn scan_store(store: &PhysicalStore) -> Vec<u64> {
    store
        .reader()
        .expect("Failed to open reader")
        .scan()
        .map(EntityId::as_u64)
        .collect()
}

/// Returns `(index size, unique values, sample size)` of `populator`.
pub fn sample_of<P: IndexPopulator>(populator: &P) -> (u64, u64, u64) {
    let mut register = SampleRegister::new();
    let size = populator
        .sample_result(&mut register)
        .expect("Failed to sample");
    (size, register.read_first(), register.read_second())
}

/// A directory whose partition releases fail for chosen sequence numbers.
///
/// Every other call is passed to the wrapped directory. Release attempts are
/// recorded whether they fail or not.
#[derive(Debug)]
pub struct FailingDirectory {
    inner: Arc<dyn Directory>,
    fail_release: HashSet<u32>,
    released: Mutex<Vec<u32>>,
    fail_close: bool,
}

impl FailingDirectory {
    /// Wraps `inner`, failing releases of the partitions in `fail_release`.
    pub fn new(inner: Arc<dyn Directory>, fail_release: impl IntoIterator<Item = u32>) -> Self {
        Self {
            inner,
            fail_release: fail_release.into_iter().collect(),
            released: Mutex::new(Vec::new()),
            fail_close: false,
        }
    }

    /// Makes `close()` fail as well.
    #[must_use]
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Returns every partition a release was attempted for, in order.
    pub fn released(&self) -> Vec<u32> {
        self.released.lock().clone()
    }
}

impl Directory for FailingDirectory {
    fn kind(&self) -> StoreKind {
        self.inner.kind()
    }

    fn create(&self) -> StorageResult<()> {
        self.inner.create()
    }

    fn exists(&self) -> StorageResult<bool> {
        self.inner.exists()
    }

    fn list_partitions(&self) -> StorageResult<Vec<u32>> {
        self.inner.list_partitions()
    }

    fn write_partition(&self, seq: u32, data: &[u8]) -> StorageResult<()> {
        self.inner.write_partition(seq, data)
    }

    fn read_partition(&self, seq: u32) -> StorageResult<Vec<u8>> {
        self.inner.read_partition(seq)
    }

    fn remove_partition(&self, seq: u32) -> StorageResult<()> {
        self.inner.remove_partition(seq)
    }

    fn release_partition(&self, seq: u32) -> StorageResult<()> {
        self.released.lock().push(seq);
        if self.fail_release.contains(&seq) {
            return Err(StorageError::Corrupted(format!(
                "injected release failure for partition {seq}"
            )));
        }
        self.inner.release_partition(seq)
    }

    fn sync(&self) -> StorageResult<()> {
        self.inner.sync()
    }

    fn write_status(&self, data: &[u8]) -> StorageResult<()> {
        self.inner.write_status(data)
    }

    fn read_status(&self) -> StorageResult<Option<Vec<u8>>> {
        self.inner.read_status()
    }

    fn destroy(&self) -> StorageResult<()> {
        self.inner.destroy()
    }

    fn close(&self) -> StorageResult<()> {
        let result = self.inner.close();
        if self.fail_close {
            return Err(StorageError::Corrupted(
                "injected directory close failure".to_string(),
            ));
        }
        result
    }
}

/// A factory handing out [`FailingDirectory`] wrappers of another factory's
/// directories.
#[derive(Debug)]
pub struct FailingDirectoryFactory {
    inner: Arc<dyn DirectoryFactory>,
    fail_release: Vec<u32>,
    fail_close: bool,
    opened: Mutex<Vec<Arc<FailingDirectory>>>,
}

impl FailingDirectoryFactory {
    /// Wraps `inner`, failing releases of the partitions in `fail_release`.
    pub fn new(inner: Arc<dyn DirectoryFactory>, fail_release: impl IntoIterator<Item = u32>) -> Self {
        Self {
            inner,
            fail_release: fail_release.into_iter().collect(),
            fail_close: false,
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Makes directory `close()` fail as well.
    #[must_use]
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Returns the directories handed out so far.
    pub fn opened(&self) -> Vec<Arc<FailingDirectory>> {
        self.opened.lock().clone()
    }
}

impl DirectoryFactory for FailingDirectoryFactory {
    fn kind(&self) -> StoreKind {
        self.inner.kind()
    }

    fn open(&self, path: &Path) -> StorageResult<Arc<dyn Directory>> {
        let mut dir = FailingDirectory::new(self.inner.open(path)?, self.fail_release.clone());
        if self.fail_close {
            dir = dir.failing_close();
        }
        let dir = Arc::new(dir);
        self.opened.lock().push(dir.clone());
        Ok(dir)
    }

    fn close(&self) -> StorageResult<()> {
        self.inner.close()
    }
}
