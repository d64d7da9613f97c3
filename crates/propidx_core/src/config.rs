//! Sampling and store configuration.

/// Distinct-count estimator used once exact sampling is abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimatorKind {
    /// HyperLogLog with `2^precision` one-byte registers.
    ///
    /// Relative standard error is about `1.04 / sqrt(2^precision)`: 1.6% at
    /// precision 12. Precision is clamped to `4..=16`.
    HyperLogLog {
        /// Number of index bits.
        precision: u8,
    },
    /// K minimum values: keeps the `k` smallest hashes seen.
    ///
    /// Relative standard error is about `1 / sqrt(k - 2)`: 3.2% at k = 1024.
    /// Values of `k` below 3 are raised to 3.
    MinValues {
        /// Number of retained hashes.
        k: usize,
    },
}

impl Default for EstimatorKind {
    fn default() -> Self {
        Self::HyperLogLog { precision: 12 }
    }
}

/// Configuration of the population sampler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplingConfig {
    /// Maximum number of distinct values counted exactly. Past this limit the
    /// sampler switches to the estimator and stops retaining values.
    pub exact_limit: usize,

    /// Estimator used past `exact_limit`.
    pub estimator: EstimatorKind,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            exact_limit: 100_000,
            estimator: EstimatorKind::default(),
        }
    }
}

impl SamplingConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the exact counting limit.
    #[must_use]
    pub const fn exact_limit(mut self, limit: usize) -> Self {
        self.exact_limit = limit;
        self
    }

    /// Sets the estimator.
    #[must_use]
    pub const fn estimator(mut self, estimator: EstimatorKind) -> Self {
        self.estimator = estimator;
        self
    }
}

/// Configuration of a partitioned store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Entries a partition takes before writes roll over to a new one.
    pub max_partition_entries: usize,

    /// Whether to sync the directory after every refresh.
    pub sync_on_refresh: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_partition_entries: 1_000_000,
            sync_on_refresh: true,
        }
    }
}

impl StoreConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the partition roll-over size. Zero is treated as one.
    #[must_use]
    pub const fn max_partition_entries(mut self, entries: usize) -> Self {
        self.max_partition_entries = if entries == 0 { 1 } else { entries };
        self
    }

    /// Sets whether to sync after every refresh.
    #[must_use]
    pub const fn sync_on_refresh(mut self, value: bool) -> Self {
        self.sync_on_refresh = value;
        self
    }
}
