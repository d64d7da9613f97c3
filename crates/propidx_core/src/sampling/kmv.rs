//! K-minimum-values distinct-count sketch.

use crate::sampling::estimator::CardinalityEstimator;
use std::collections::BTreeSet;

const MIN_K: usize = 3;

/// Keeps the `k` smallest distinct hashes seen. With hashes uniform over
/// `[0, 2^64)`, the k-th smallest sits near `k * 2^64 / n`, which gives the
/// estimate `(k - 1) * 2^64 / h_k`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MinValues {
    k: usize,
    hashes: BTreeSet<u64>,
}

impl MinValues {
    /// Creates an empty sketch keeping `k` hashes (at least 3).
    #[must_use]
    pub fn new(k: usize) -> Self {
        Self {
            k: k.max(MIN_K),
            hashes: BTreeSet::new(),
        }
    }

    /// Returns the number of retained hashes.
    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }
}

impl CardinalityEstimator for MinValues {
    fn insert_hash(&mut self, hash: u64) {
        if self.hashes.len() < self.k {
            self.hashes.insert(hash);
            return;
        }
        let Some(&largest) = self.hashes.last() else {
            return;
        };
        if hash < largest && self.hashes.insert(hash) {
            self.hashes.pop_last();
        }
    }

    fn estimate(&self) -> u64 {
        if self.hashes.len() < self.k {
            // Fewer distinct hashes than k: the set is exact
            return self.hashes.len() as u64;
        }
        let Some(&kth) = self.hashes.last() else {
            return 0;
        };
        let fraction = (kth as f64 + 1.0) / 18_446_744_073_709_551_616.0;
        ((self.k - 1) as f64 / fraction).round() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PropertyValue;

    #[test]
    fn exact_below_k() {
        let mut sketch = MinValues::new(64);
        for i in 0..40_i64 {
            sketch.insert_hash(PropertyValue::Int(i).canonical_hash());
            sketch.insert_hash(PropertyValue::Int(i).canonical_hash());
        }
        assert_eq!(sketch.estimate(), 40);
    }

    #[test]
    fn k_is_raised_to_minimum() {
        assert_eq!(MinValues::new(0).k(), 3);
    }

    #[test]
    fn large_cardinality_within_error_bound() {
        let mut sketch = MinValues::new(1024);
        for i in 0..50_000_i64 {
            sketch.insert_hash(PropertyValue::Int(i).canonical_hash());
        }
        let estimate = sketch.estimate() as f64;
        let error = (estimate - 50_000.0).abs() / 50_000.0;
        assert!(error < 0.15, "estimate {estimate} error {error}");
    }
}
