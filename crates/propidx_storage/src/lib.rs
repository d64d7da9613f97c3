//! # propidx Storage
//!
//! Directory abstraction and backends for propidx index partitions.
//!
//! This crate is the lowest layer of propidx. A [`Directory`] is an
//! **opaque partition store**: it keeps the bytes of numbered partitions and
//! a small status record, and never interprets either.
//!
//! ## Design Principles
//!
//! - Directories store partition bytes (write, read, list, remove)
//! - No knowledge of posting formats or sampling
//! - Must be `Send + Sync` so partitions can be written from worker threads
//! - Closing aggregates every failure instead of stopping at the first
//!
//! ## Available Backends
//!
//! - [`InMemoryDirectory`] - For testing and transient indexes
//! - [`FsDirectory`] - For persistent indexes using OS file APIs
//!
//! Both are handed out by a [`DirectoryFactory`], which is itself a closable
//! resource.
//!
//! ## Example
//!
//! ```rust
//! use propidx_storage::{DirectoryFactory, InMemoryDirectoryFactory};
//! use std::path::Path;
//!
//! let factory = InMemoryDirectoryFactory::new();
//! let dir = factory.open(Path::new("indexes/person_name")).unwrap();
//! dir.create().unwrap();
//! dir.write_partition(0, b"postings").unwrap();
//! assert_eq!(dir.read_partition(0).unwrap(), b"postings");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod directory;
mod error;
mod fs;
mod memory;
mod multi;

pub use directory::{Directory, DirectoryFactory, StoreKind};
pub use error::{StorageError, StorageResult};
pub use fs::{FsDirectory, FsDirectoryFactory};
pub use memory::{InMemoryDirectory, InMemoryDirectoryFactory};
pub use multi::{close_all, MultiError};
