//! Aggregation of failures from closing several resources.

use crate::error::{StorageError, StorageResult};
use std::error::Error;
use std::fmt;

/// A collection of failures gathered while releasing several resources.
///
/// Every failure is kept; none hides another. The first failure is exposed as
/// the error source.
#[derive(Debug, Default)]
pub struct MultiError {
    errors: Vec<StorageError>,
}

impl MultiError {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a failure.
    pub fn push(&mut self, error: StorageError) {
        self.errors.push(error);
    }

    /// Records the failure of `result`, if any.
    pub fn collect(&mut self, result: StorageResult<()>) {
        if let Err(error) = result {
            self.push(error);
        }
    }

    /// Returns the number of collected failures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns true if nothing failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the collected failures in the order they happened.
    #[must_use]
    pub fn errors(&self) -> &[StorageError] {
        &self.errors
    }

    /// Converts the collector into a result: `Ok` when nothing failed.
    pub fn into_result(self) -> Result<(), MultiError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failure(s) while closing", self.errors.len())?;
        for (i, error) in self.errors.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{error}")?;
        }
        Ok(())
    }
}

impl Error for MultiError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.errors.first().map(|e| e as &(dyn Error + 'static))
    }
}

impl IntoIterator for MultiError {
    type Item = StorageError;
    type IntoIter = std::vec::IntoIter<StorageError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

/// Runs every closer, even after failures, and reports all failures together.
///
/// # Example
///
/// ```rust
/// use propidx_storage::{close_all, StorageError};
///
/// let outcomes = vec![
///     Err(StorageError::Closed),
///     Ok(()),
///     Err(StorageError::PartitionNotFound { seq: 3 }),
/// ];
/// let err = close_all(outcomes.into_iter().map(|outcome| move || outcome)).unwrap_err();
/// assert_eq!(err.len(), 2);
/// ```
pub fn close_all<I, F>(closers: I) -> Result<(), MultiError>
where
    I: IntoIterator<Item = F>,
    F: FnOnce() -> StorageResult<()>,
{
    let mut failures = MultiError::new();
    for close in closers {
        failures.collect(close());
    }
    failures.into_result()
}
