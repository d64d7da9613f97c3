//! Carriers for sampling results.

use serde::{Deserialize, Serialize};

/// Two-slot register receiving the result of sampling.
///
/// - first: estimated number of unique values
/// - second: sample size (observations the estimate is based on)
///
/// Both slots start at zero and are only written by
/// [`crate::IndexPopulator::sample_result`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleRegister {
    first: u64,
    second: u64,
}

impl SampleRegister {
    /// Creates a register holding `(0, 0)`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the estimated number of unique values.
    #[must_use]
    pub fn read_first(&self) -> u64 {
        self.first
    }

    /// Returns the sample size.
    #[must_use]
    pub fn read_second(&self) -> u64 {
        self.second
    }

    pub(crate) fn write(&mut self, first: u64, second: u64) {
        self.first = first;
        self.second = second;
    }
}

/// A complete sample of an index, as persisted with a committed index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSample {
    /// Number of entries in the index.
    pub index_size: u64,
    /// Estimated number of unique values.
    pub unique_values: u64,
    /// Number of observations the estimate is based on.
    pub sample_size: u64,
}

impl IndexSample {
    /// Creates a sample.
    #[must_use]
    pub const fn new(index_size: u64, unique_values: u64, sample_size: u64) -> Self {
        Self {
            index_size,
            unique_values,
            sample_size,
        }
    }

    /// Ratio of unique values to sampled entries, in `(0, 1]`.
    ///
    /// An empty sample is treated as perfectly selective.
    #[must_use]
    pub fn selectivity(&self) -> f64 {
        if self.sample_size == 0 {
            1.0
        } else {
            self.unique_values as f64 / self.sample_size as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_starts_empty() {
        let register = SampleRegister::new();
        assert_eq!(register.read_first(), 0);
        assert_eq!(register.read_second(), 0);
    }

    #[test]
    fn register_write() {
        let mut register = SampleRegister::new();
        register.write(2, 3);
        assert_eq!(register.read_first(), 2);
        assert_eq!(register.read_second(), 3);
    }

    #[test]
    fn selectivity() {
        assert_eq!(IndexSample::default().selectivity(), 1.0);
        assert_eq!(IndexSample::new(4, 1, 4).selectivity(), 0.25);
    }
}
