//! Index population.
//!
//! A populator drives the bulk build of one index:
//!
//! ```text
//! Created --create()--> Populating --close(Commit)--> Committed
//!                           |   \
//!                           |    --close(Drop)----> Dropped
//!                      write error
//!                           v
//!                         Failed --close(Drop)----> Dropped
//! ```
//!
//! While populating, every added value is written to the store and fed to a
//! [`crate::Sampler`]. Writes stay invisible to readers until the store is
//! refreshed; committing refreshes the store and records the final sample.

mod non_unique;

pub use non_unique::NonUniquePopulator;

use crate::error::IndexResult;
use crate::register::SampleRegister;
use crate::value::PropertyUpdate;

/// How a population session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseMode {
    /// Publish the written data and mark the index online.
    Commit,
    /// Discard everything written.
    Drop,
}

/// Lifecycle state of a populator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopulatorState {
    /// Constructed; `create()` has not run.
    Created,
    /// Accepting updates.
    Populating,
    /// A write failed; only `close(CloseMode::Drop)` is accepted.
    Failed,
    /// Closed with [`CloseMode::Commit`].
    Committed,
    /// Closed with [`CloseMode::Drop`], or a commit was refused.
    Dropped,
}

impl PopulatorState {
    /// Returns true once the populator has been closed.
    #[must_use]
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Committed | Self::Dropped)
    }
}

/// The population session of one index.
///
/// Methods take `&mut self`: batches are issued by a single thread.
pub trait IndexPopulator {
    /// Prepares the backing store. Must run before anything else.
    ///
    /// # Errors
    ///
    /// Returns [`crate::IndexError::StorageInit`] if the store cannot be
    /// created, or [`crate::IndexError::IllegalState`] if called twice.
    fn create(&mut self) -> IndexResult<()>;

    /// Indexes a batch of added values.
    ///
    /// # Errors
    ///
    /// Returns [`crate::IndexError::IndexWrite`] if a write fails. The
    /// populator is then tainted and must be dropped.
    fn add(&mut self, batch: &[PropertyUpdate]) -> IndexResult<()>;

    /// Applies changes made to already scanned entities while population runs.
    ///
    /// # Errors
    ///
    /// Returns [`crate::IndexError::IndexWrite`] if a write fails.
    fn update(&mut self, batch: &[PropertyUpdate]) -> IndexResult<()>;

    /// Writes `(unique values, sample size)` into `register` and returns the
    /// number of entries added so far.
    ///
    /// # Errors
    ///
    /// Returns [`crate::IndexError::IllegalState`] unless populating.
    fn sample_result(&self, register: &mut SampleRegister) -> IndexResult<u64>;

    /// Ends the session. Any later call is an illegal state.
    ///
    /// # Errors
    ///
    /// Returns [`crate::IndexError::TransactionTerminated`] if the enclosing
    /// transaction was terminated before commit, or the storage failure that
    /// prevented the commit or drop.
    fn close(&mut self, mode: CloseMode) -> IndexResult<()>;
}
