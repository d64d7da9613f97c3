//! Property-based test generators using proptest.
//!
//! Strategies produce values and update batches shaped like real population
//! input: every batch carries distinct entity ids in random order.

use propidx_core::{PropertyUpdate, PropertyValue};
use proptest::prelude::*;

/// Property key used by generated updates.
pub const GENERATED_KEY: u32 = 1;

/// Label used by generated updates.
pub const GENERATED_LABEL: u32 = 1;

/// Strategy for values of every kind.
pub fn property_value_strategy() -> impl Strategy<Value = PropertyValue> + Clone {
    prop_oneof![
        any::<bool>().prop_map(PropertyValue::Bool),
        any::<i64>().prop_map(PropertyValue::Int),
        (-1.0e9..1.0e9_f64).prop_map(PropertyValue::Float),
        prop::string::string_regex("[a-z]{0,12}")
            .expect("Invalid regex")
            .prop_map(PropertyValue::Text),
        prop::collection::vec(any::<u8>(), 0..16).prop_map(PropertyValue::Bytes),
    ]
}

/// Strategy for values drawn from a small domain, so repeats are common.
pub fn repeating_value_strategy(distinct: i64) -> impl Strategy<Value = PropertyValue> + Clone {
    (0..distinct.max(1)).prop_map(PropertyValue::Int)
}

/// Strategy for a batch of added values with distinct entity ids.
pub fn added_batch_strategy<S>(
    values: S,
    max_len: usize,
) -> impl Strategy<Value = Vec<PropertyUpdate>>
where
    S: Strategy<Value = PropertyValue> + Clone,
{
    (0..=max_len)
        .prop_flat_map(move |len| {
            (
                prop::collection::btree_set(any::<u64>(), len),
                prop::collection::vec(values.clone(), len),
            )
        })
        .prop_map(|(ids, values)| {
            ids.into_iter()
                .zip(values)
                .map(|(id, value)| {
                    PropertyUpdate::add(id, GENERATED_KEY, value, &[GENERATED_LABEL])
                })
                .collect::<Vec<_>>()
        })
        .prop_shuffle()
}

/// Strategy for several batches whose entity ids are distinct across batches.
pub fn added_batches_strategy(
    max_batches: usize,
    max_len: usize,
) -> impl Strategy<Value = Vec<Vec<PropertyUpdate>>> {
    added_batch_strategy(repeating_value_strategy(32), max_batches * max_len).prop_flat_map(
        move |updates| {
            let len = updates.len();
            prop::collection::vec(0..=max_len.max(1), max_batches.max(1)).prop_map(
                move |sizes| split_batches(updates.clone(), &sizes, len),
            )
        },
    )
}

fn split_batches(
    updates: Vec<PropertyUpdate>,
    sizes: &[usize],
    len: usize,
) -> Vec<Vec<PropertyUpdate>> {
    let mut batches = Vec::new();
    let mut rest = updates.into_iter();
    let mut taken = 0;
    for size in sizes {
        let batch: Vec<_> = rest.by_ref().take(*size).collect();
        taken += batch.len();
        batches.push(batch);
    }
    if taken < len {
        batches.push(rest.collect());
    }
    batches
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
