//! Online sampling of indexed values.
//!
//! The [`Sampler`] sees every value written during population and reports
//! (estimated unique values, sample size) at any time, without a second pass
//! over the data.
//!
//! # Modes
//!
//! - **Exact**: value counts are kept in a map. Unique values is the map size
//!   and sample size is the number of observations.
//! - **Approximate**: once more than [`SamplingConfig::exact_limit`] distinct
//!   values have been seen, every distinct value hash is folded into the
//!   configured [`CardinalityEstimator`] and the map is released. Memory stays
//!   fixed from then on, and the unique count becomes an estimate.
//!
//! In both modes `unique <= sample`. While exact mode lasts, sample size equals
//! the number of values included minus those excluded.

mod estimator;
mod hll;
mod kmv;

pub use estimator::{build_estimator, CardinalityEstimator};
pub use hll::HyperLogLog;
pub use kmv::MinValues;

use crate::config::SamplingConfig;
use crate::value::PropertyValue;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug)]
enum Mode {
    Exact {
        counts: HashMap<PropertyValue, u64>,
        observations: u64,
    },
    Approximate {
        estimator: Box<dyn CardinalityEstimator>,
        observations: u64,
    },
}

/// Memory-bounded distinct value sampler.
///
/// # Example
///
/// ```rust
/// use propidx_core::{PropertyValue, Sampler, SamplingConfig};
///
/// let mut sampler = Sampler::new(SamplingConfig::default());
/// sampler.include(&PropertyValue::from("foo"));
/// sampler.include(&PropertyValue::from("bar"));
/// sampler.include(&PropertyValue::from("foo"));
/// assert_eq!(sampler.result(), (2, 3));
/// ```
#[derive(Debug)]
pub struct Sampler {
    config: SamplingConfig,
    mode: Mode,
}

impl Sampler {
    /// Creates an empty sampler in exact mode.
    #[must_use]
    pub fn new(config: SamplingConfig) -> Self {
        Self {
            config,
            mode: Mode::Exact {
                counts: HashMap::new(),
                observations: 0,
            },
        }
    }

    /// Returns true while every value is counted exactly.
    #[must_use]
    pub fn is_exact(&self) -> bool {
        matches!(self.mode, Mode::Exact { .. })
    }

    /// Records one observation of `value`.
    pub fn include(&mut self, value: &PropertyValue) {
        match &mut self.mode {
            Mode::Exact {
                counts,
                observations,
            } => {
                *observations += 1;
                if let Some(count) = counts.get_mut(value) {
                    *count += 1;
                } else {
                    counts.insert(value.clone(), 1);
                }
            }
            Mode::Approximate {
                estimator,
                observations,
            } => {
                *observations += 1;
                estimator.insert_hash(value.canonical_hash());
            }
        }
        self.maybe_degrade();
    }

    /// Withdraws one observation of `value`.
    ///
    /// Returns true if an observation was withdrawn. In exact mode that
    /// requires `value` to have been included; in approximate mode only the
    /// sample size shrinks, since sketches cannot forget a value.
    pub fn exclude(&mut self, value: &PropertyValue) -> bool {
        match &mut self.mode {
            Mode::Exact {
                counts,
                observations,
            } => {
                let Some(count) = counts.get_mut(value) else {
                    return false;
                };
                *count -= 1;
                if *count == 0 {
                    counts.remove(value);
                }
                *observations -= 1;
                true
            }
            Mode::Approximate { observations, .. } => {
                if *observations == 0 {
                    return false;
                }
                *observations -= 1;
                true
            }
        }
    }

    /// Returns the number of observations the estimate is based on.
    #[must_use]
    pub fn sample_size(&self) -> u64 {
        match &self.mode {
            Mode::Exact { observations, .. } | Mode::Approximate { observations, .. } => {
                *observations
            }
        }
    }

    /// Returns the estimated number of unique values, never above the sample size.
    #[must_use]
    pub fn unique_values(&self) -> u64 {
        match &self.mode {
            Mode::Exact { counts, .. } => counts.len() as u64,
            Mode::Approximate {
                estimator,
                observations,
            } => estimator.estimate().min(*observations),
        }
    }

    /// Returns `(unique values, sample size)`.
    #[must_use]
    pub fn result(&self) -> (u64, u64) {
        (self.unique_values(), self.sample_size())
    }

    fn maybe_degrade(&mut self) {
        let Mode::Exact {
            counts,
            observations,
        } = &mut self.mode
        else {
            return;
        };
        if counts.len() <= self.config.exact_limit {
            return;
        }

        let mut estimator = build_estimator(self.config.estimator);
        for value in counts.keys() {
            estimator.insert_hash(value.canonical_hash());
        }
        let observations = *observations;
        debug!(
            distinct = counts.len(),
            observations,
            estimator = ?self.config.estimator,
            "sampler switched to approximate mode"
        );
        self.mode = Mode::Approximate {
            estimator,
            observations,
        };
    }
}
