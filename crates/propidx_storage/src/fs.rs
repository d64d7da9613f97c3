//! File-system directory backend for persistent indexes.
//!
//! Layout of one index directory:
//!
//! ```text
//! <path>/
//! ├─ LOCK                   # Advisory lock held by the populating store
//! ├─ STATUS                 # Status record
//! ├─ partition-000000.idx   # Partition 0
//! └─ partition-000001.idx   # Partition 1
//! ```
//!
//! Partition and status files are replaced through a temporary file and a
//! rename, so a crash leaves either the previous or the new contents.

use crate::directory::{Directory, DirectoryFactory, StoreKind};
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

const LOCK_FILE: &str = "LOCK";
const STATUS_FILE: &str = "STATUS";
const PARTITION_PREFIX: &str = "partition-";
const PARTITION_SUFFIX: &str = ".idx";
const TEMP_SUFFIX: &str = ".tmp";

fn partition_file_name(seq: u32) -> String {
    format!("{PARTITION_PREFIX}{seq:06}{PARTITION_SUFFIX}")
}

fn parse_partition_file_name(name: &str) -> Option<u32> {
    name.strip_prefix(PARTITION_PREFIX)?
        .strip_suffix(PARTITION_SUFFIX)?
        .parse()
        .ok()
}

/// A directory of partition files.
///
/// # Durability
///
/// - Every file replacement is written to a temporary file, synced, then renamed
/// - `sync()` syncs the directory entry itself on Unix platforms
///
/// # Locking
///
/// `create()` takes an exclusive advisory lock on the `LOCK` file. A second
/// store creating the same path fails with a path conflict until the first
/// one closes or destroys the directory.
#[derive(Debug)]
pub struct FsDirectory {
    root: PathBuf,
    lock: Mutex<Option<File>>,
    closed: AtomicBool,
}

impl FsDirectory {
    /// Opens the directory at `root` without touching the file system.
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            lock: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the root path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed);
        }
        Ok(())
    }

    fn partition_path(&self, seq: u32) -> PathBuf {
        self.root.join(partition_file_name(seq))
    }

    fn replace_file(&self, name: &str, data: &[u8]) -> StorageResult<()> {
        fs::create_dir_all(&self.root)?;
        let target = self.root.join(name);
        let temp = self.root.join(format!("{name}{TEMP_SUFFIX}"));

        {
            let mut file = File::create(&temp)?;
            file.write_all(data)?;
            file.sync_all()?;
        }
        fs::rename(&temp, &target)?;
        Ok(())
    }

    fn acquire_lock(&self) -> StorageResult<()> {
        let mut held = self.lock.lock();
        if held.is_some() {
            return Ok(());
        }

        let lock_path = self.root.join(LOCK_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        if file.try_lock_exclusive().is_err() {
            return Err(StorageError::path_conflict(
                self.root.display().to_string(),
                "index directory is locked by another store",
            ));
        }
        *held = Some(file);
        Ok(())
    }

    fn release_lock(&self) -> StorageResult<()> {
        if let Some(file) = self.lock.lock().take() {
            file.unlock()?;
        }
        Ok(())
    }
}

impl Directory for FsDirectory {
    fn kind(&self) -> StoreKind {
        StoreKind::OnDisk
    }

    fn create(&self) -> StorageResult<()> {
        self.ensure_open()?;
        if self.root.exists() && !self.root.is_dir() {
            return Err(StorageError::path_conflict(
                self.root.display().to_string(),
                "path exists and is not a directory",
            ));
        }
        fs::create_dir_all(&self.root)?;
        self.acquire_lock()?;
        debug!(path = %self.root.display(), "created index directory");
        Ok(())
    }

    fn exists(&self) -> StorageResult<bool> {
        self.ensure_open()?;
        Ok(self.root.is_dir())
    }

    fn list_partitions(&self) -> StorageResult<Vec<u32>> {
        self.ensure_open()?;
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut seqs = Vec::new();
        for entry in entries {
            let entry = entry?;
            if let Some(seq) = entry.file_name().to_str().and_then(parse_partition_file_name) {
                seqs.push(seq);
            }
        }
        seqs.sort_unstable();
        Ok(seqs)
    }

    fn write_partition(&self, seq: u32, data: &[u8]) -> StorageResult<()> {
        self.ensure_open()?;
        self.replace_file(&partition_file_name(seq), data)
    }

    fn read_partition(&self, seq: u32) -> StorageResult<Vec<u8>> {
        self.ensure_open()?;
        match fs::read(self.partition_path(seq)) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::PartitionNotFound { seq })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn remove_partition(&self, seq: u32) -> StorageResult<()> {
        self.ensure_open()?;
        match fs::remove_file(self.partition_path(seq)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn release_partition(&self, seq: u32) -> StorageResult<()> {
        self.ensure_open()?;
        // A partition left behind by an interrupted replace is dropped here.
        let temp = self
            .root
            .join(format!("{}{TEMP_SUFFIX}", partition_file_name(seq)));
        match fs::remove_file(temp) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn sync(&self) -> StorageResult<()> {
        self.ensure_open()?;
        #[cfg(unix)]
        {
            if self.root.is_dir() {
                File::open(&self.root)?.sync_all()?;
            }
        }
        Ok(())
    }

    fn write_status(&self, data: &[u8]) -> StorageResult<()> {
        self.ensure_open()?;
        self.replace_file(STATUS_FILE, data)
    }

    fn read_status(&self) -> StorageResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        match fs::read(self.root.join(STATUS_FILE)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn destroy(&self) -> StorageResult<()> {
        self.ensure_open()?;
        self.release_lock()?;
        match fs::remove_dir_all(&self.root) {
            Ok(()) => {
                debug!(path = %self.root.display(), "removed index directory");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn close(&self) -> StorageResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.release_lock()
    }
}

/// Factory for [`FsDirectory`] handles.
#[derive(Debug, Default)]
pub struct FsDirectoryFactory {
    closed: AtomicBool,
}

impl FsDirectoryFactory {
    /// Creates a new factory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DirectoryFactory for FsDirectoryFactory {
    fn kind(&self) -> StoreKind {
        StoreKind::OnDisk
    }

    fn open(&self, path: &Path) -> StorageResult<Arc<dyn Directory>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed);
        }
        Ok(Arc::new(FsDirectory::new(path)))
    }

    fn close(&self) -> StorageResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
