//! Property values and the updates that carry them into an index.

use crate::types::{EntityId, LabelId, PropertyKeyId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use xxhash_rust::xxh64::Xxh64;

/// An indexable property value.
///
/// Values have a total order: first by kind (`Bool < Int < Float < Text <
/// Bytes`), then by content. Floats compare with [`f64::total_cmp`], so
/// `NaN` has a fixed place and `-0.0 < 0.0`. Equality and hashing agree with
/// that order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PropertyValue {
    /// Boolean value.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
}

impl PropertyValue {
    fn rank(&self) -> u8 {
        match self {
            Self::Bool(_) => 0,
            Self::Int(_) => 1,
            Self::Float(_) => 2,
            Self::Text(_) => 3,
            Self::Bytes(_) => 4,
        }
    }

    /// Stable 64-bit hash used by the cardinality estimators.
    ///
    /// The kind tag is hashed first, so `Text("1")` and `Int(1)` differ. The
    /// result does not depend on the process or platform.
    #[must_use]
    pub fn canonical_hash(&self) -> u64 {
        let mut hasher = Xxh64::new(0);
        hasher.update(&[self.rank()]);
        match self {
            Self::Bool(b) => hasher.update(&[u8::from(*b)]),
            Self::Int(i) => hasher.update(&i.to_le_bytes()),
            Self::Float(f) => hasher.update(&f.to_bits().to_le_bytes()),
            Self::Text(s) => hasher.update(s.as_bytes()),
            Self::Bytes(b) => hasher.update(b),
        }
        hasher.digest()
    }

    /// Returns the text content, if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl Ord for PropertyValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Bytes(a), Self::Bytes(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for PropertyValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PropertyValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PropertyValue {}

impl Hash for PropertyValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Self::Bool(b) => b.hash(state),
            Self::Int(i) => i.hash(state),
            Self::Float(f) => f.to_bits().hash(state),
            Self::Text(s) => s.hash(state),
            Self::Bytes(b) => b.hash(state),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for PropertyValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// What happened to a property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateMode {
    /// The property was set on an entity that did not have it.
    Added {
        /// The new value.
        after: PropertyValue,
    },
    /// The property value changed.
    Changed {
        /// The previous value.
        before: PropertyValue,
        /// The new value.
        after: PropertyValue,
    },
    /// The property was removed.
    Removed {
        /// The removed value.
        before: PropertyValue,
    },
}

/// One observed property fact to index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyUpdate {
    /// The entity owning the property.
    pub entity_id: EntityId,
    /// The property key.
    pub property_key: PropertyKeyId,
    /// The change.
    pub mode: UpdateMode,
    /// Labels (or relationship type) of the owning entity.
    pub labels: Vec<LabelId>,
}

impl PropertyUpdate {
    /// Creates an update adding `value` to the entity.
    pub fn add(
        entity_id: u64,
        property_key: u32,
        value: impl Into<PropertyValue>,
        labels: &[u32],
    ) -> Self {
        Self::new(
            entity_id,
            property_key,
            UpdateMode::Added {
                after: value.into(),
            },
            labels,
        )
    }

    /// Creates an update changing the entity's value from `before` to `after`.
    pub fn change(
        entity_id: u64,
        property_key: u32,
        before: impl Into<PropertyValue>,
        after: impl Into<PropertyValue>,
        labels: &[u32],
    ) -> Self {
        Self::new(
            entity_id,
            property_key,
            UpdateMode::Changed {
                before: before.into(),
                after: after.into(),
            },
            labels,
        )
    }

    /// Creates an update removing `value` from the entity.
    pub fn remove(
        entity_id: u64,
        property_key: u32,
        value: impl Into<PropertyValue>,
        labels: &[u32],
    ) -> Self {
        Self::new(
            entity_id,
            property_key,
            UpdateMode::Removed {
                before: value.into(),
            },
            labels,
        )
    }

    fn new(entity_id: u64, property_key: u32, mode: UpdateMode, labels: &[u32]) -> Self {
        Self {
            entity_id: EntityId::new(entity_id),
            property_key: PropertyKeyId::new(property_key),
            mode,
            labels: labels.iter().copied().map(LabelId::new).collect(),
        }
    }

    /// Returns the value before the update, if there was one.
    #[must_use]
    pub fn value_before(&self) -> Option<&PropertyValue> {
        match &self.mode {
            UpdateMode::Added { .. } => None,
            UpdateMode::Changed { before, .. } | UpdateMode::Removed { before } => Some(before),
        }
    }

    /// Returns the value after the update, if there is one.
    #[must_use]
    pub fn value_after(&self) -> Option<&PropertyValue> {
        match &self.mode {
            UpdateMode::Added { after } | UpdateMode::Changed { after, .. } => Some(after),
            UpdateMode::Removed { .. } => None,
        }
    }

    /// Returns true if the entity carries `label`.
    #[must_use]
    pub fn has_label(&self, label: u32) -> bool {
        self.labels.contains(&LabelId::new(label))
    }
}
