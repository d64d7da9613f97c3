//! Pluggable distinct-count estimators.

use crate::config::EstimatorKind;
use crate::sampling::hll::HyperLogLog;
use crate::sampling::kmv::MinValues;
use std::fmt;

/// A bounded-memory estimator of the number of distinct hashes seen.
///
/// Inserting the same hash twice never changes the estimate.
pub trait CardinalityEstimator: Send + fmt::Debug {
    /// Folds a 64-bit value hash into the sketch.
    fn insert_hash(&mut self, hash: u64);

    /// Returns the current distinct-count estimate.
    fn estimate(&self) -> u64;
}

/// Builds the estimator configured by `kind`.
#[must_use]
pub fn build_estimator(kind: EstimatorKind) -> Box<dyn CardinalityEstimator> {
    match kind {
        EstimatorKind::HyperLogLog { precision } => Box::new(HyperLogLog::new(precision)),
        EstimatorKind::MinValues { k } => Box::new(MinValues::new(k)),
    }
}
