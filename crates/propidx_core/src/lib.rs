//! # propidx Core
//!
//! Population and online sampling of property-value secondary indexes.
//!
//! This crate provides:
//! - [`IndexPopulator`] and [`NonUniquePopulator`]: the bulk build lifecycle
//!   (create, add, sample, commit or drop)
//! - [`Sampler`]: distinct value estimation, exact for small indexes and
//!   sketch-based past [`SamplingConfig::exact_limit`]
//! - [`PhysicalStore`]: partitioned postings whose writes become visible on
//!   [`PhysicalStore::refresh`]
//! - [`IndexReader`]: sorted, deduplicated scans over a published snapshot
//! - [`TransactionContext`]: the transaction a population runs in
//!
//! ## Example
//!
//! ```rust
//! use propidx_core::{
//!     CloseMode, EntityId, IndexPopulator, NonUniquePopulator, PhysicalStore,
//!     PropertyUpdate, SampleRegister, SamplingConfig, StoreConfig,
//! };
//! use propidx_storage::InMemoryDirectoryFactory;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let store = Arc::new(PhysicalStore::new(
//!     "person_name",
//!     Arc::new(InMemoryDirectoryFactory::new()),
//!     Path::new("person_name"),
//!     StoreConfig::default(),
//! ));
//! let mut populator = NonUniquePopulator::new(store.clone(), SamplingConfig::default());
//! populator.create().unwrap();
//! populator
//!     .add(&[
//!         PropertyUpdate::add(42, 1, "foo", &[1]),
//!         PropertyUpdate::add(1, 1, "bar", &[1]),
//!         PropertyUpdate::add(2, 1, "baz", &[1]),
//!     ])
//!     .unwrap();
//!
//! // Nothing is visible before the store is refreshed
//! assert_eq!(store.reader().unwrap().scan().count(), 0);
//!
//! let mut register = SampleRegister::new();
//! assert_eq!(populator.sample_result(&mut register).unwrap(), 3);
//! populator.close(CloseMode::Commit).unwrap();
//!
//! let ids: Vec<u64> = store.reader().unwrap().scan().map(EntityId::as_u64).collect();
//! assert_eq!(ids, vec![1, 2, 42]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod populator;
mod reader;
mod register;
mod sampling;
mod store;
mod transaction;
mod types;
mod value;

pub use config::{EstimatorKind, SamplingConfig, StoreConfig};
pub use error::{IndexError, IndexResult};
pub use populator::{CloseMode, IndexPopulator, NonUniquePopulator, PopulatorState};
pub use reader::{EntityIdIter, IndexReader};
pub use register::{IndexSample, SampleRegister};
pub use sampling::{build_estimator, CardinalityEstimator, HyperLogLog, MinValues, Sampler};
pub use store::{
    PartitionSnapshot, PartitionWriter, PhysicalStore, StoreSnapshot, StoreState, StoreStatus,
};
pub use transaction::{
    AccessMode, ClientConnectionInfo, KernelTransaction, SecurityContext, SecurityOverride,
    SimpleTransaction, Status, TransactionContext, TransactionType,
};
pub use types::{EntityId, LabelId, PropertyKeyId, TransactionId};
pub use value::{PropertyUpdate, PropertyValue, UpdateMode};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
