//! Partitions and their published snapshots.

use crate::types::EntityId;
use crate::value::PropertyValue;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// A buffered write to a partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PostingOp {
    /// Add the posting `value -> entity`.
    Insert(PropertyValue, EntityId),
    /// Remove the posting `value -> entity`, if present.
    Delete(PropertyValue, EntityId),
}

/// Immutable, published contents of one partition.
///
/// Postings map each value to the sorted, distinct entities holding it. A
/// repeated `(value, entity)` posting is stored once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionSnapshot {
    seq: u32,
    postings: BTreeMap<PropertyValue, Vec<EntityId>>,
    entities: Vec<EntityId>,
    entry_count: usize,
}

impl PartitionSnapshot {
    /// Creates an empty snapshot for partition `seq`.
    #[must_use]
    pub fn empty(seq: u32) -> Self {
        Self {
            seq,
            ..Self::default()
        }
    }

    /// Builds a snapshot from decoded postings.
    pub(crate) fn from_postings(
        seq: u32,
        postings: impl IntoIterator<Item = (PropertyValue, Vec<EntityId>)>,
    ) -> Self {
        let mut merged: BTreeMap<PropertyValue, BTreeSet<EntityId>> = BTreeMap::new();
        for (value, entities) in postings {
            merged.entry(value).or_default().extend(entities);
        }
        Self::build(seq, merged)
    }

    fn build(seq: u32, postings: BTreeMap<PropertyValue, BTreeSet<EntityId>>) -> Self {
        let mut all = BTreeSet::new();
        let mut entry_count = 0;
        let postings = postings
            .into_iter()
            .filter(|(_, entities)| !entities.is_empty())
            .map(|(value, entities)| {
                entry_count += entities.len();
                all.extend(entities.iter().copied());
                (value, entities.into_iter().collect::<Vec<_>>())
            })
            .collect();

        Self {
            seq,
            postings,
            entities: all.into_iter().collect(),
            entry_count,
        }
    }

    /// Returns a new snapshot with `ops` applied in order.
    pub(crate) fn apply(&self, ops: &[PostingOp]) -> Self {
        let mut postings: BTreeMap<PropertyValue, BTreeSet<EntityId>> = self
            .postings
            .iter()
            .map(|(value, entities)| (value.clone(), entities.iter().copied().collect()))
            .collect();

        for op in ops {
            match op {
                PostingOp::Insert(value, entity) => {
                    if let Some(entities) = postings.get_mut(value) {
                        entities.insert(*entity);
                    } else {
                        postings.insert(value.clone(), BTreeSet::from([*entity]));
                    }
                }
                PostingOp::Delete(value, entity) => {
                    if let Some(entities) = postings.get_mut(value) {
                        entities.remove(entity);
                    }
                }
            }
        }

        Self::build(self.seq, postings)
    }

    /// Returns the partition sequence number.
    #[must_use]
    pub fn seq(&self) -> u32 {
        self.seq
    }

    /// Returns the postings, ordered by value.
    #[must_use]
    pub fn postings(&self) -> &BTreeMap<PropertyValue, Vec<EntityId>> {
        &self.postings
    }

    /// Returns every entity with at least one posting, ascending.
    #[must_use]
    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    /// Returns the number of distinct postings.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entry_count
    }
}

/// The published state of a whole store: one snapshot per partition.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    partitions: Vec<Arc<PartitionSnapshot>>,
}

impl StoreSnapshot {
    pub(crate) fn new(partitions: Vec<Arc<PartitionSnapshot>>) -> Self {
        Self { partitions }
    }

    /// Returns the partition snapshots in sequence order.
    #[must_use]
    pub fn partitions(&self) -> &[Arc<PartitionSnapshot>] {
        &self.partitions
    }

    /// Returns the number of postings across partitions.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.partitions.iter().map(|p| p.entry_count()).sum()
    }
}

/// One writable partition: a pending buffer on top of the last published
/// snapshot.
#[derive(Debug)]
pub(crate) struct Partition {
    seq: u32,
    pending: Mutex<Vec<PostingOp>>,
    published: RwLock<Arc<PartitionSnapshot>>,
    /// Published entries plus pending inserts; drives partition roll-over.
    entries: AtomicUsize,
    persisted: AtomicBool,
}

impl Partition {
    pub(crate) fn new(seq: u32) -> Self {
        Self {
            seq,
            pending: Mutex::new(Vec::new()),
            published: RwLock::new(Arc::new(PartitionSnapshot::empty(seq))),
            entries: AtomicUsize::new(0),
            persisted: AtomicBool::new(false),
        }
    }

    pub(crate) fn from_snapshot(snapshot: PartitionSnapshot) -> Self {
        let entries = snapshot.entry_count();
        Self {
            seq: snapshot.seq(),
            pending: Mutex::new(Vec::new()),
            published: RwLock::new(Arc::new(snapshot)),
            entries: AtomicUsize::new(entries),
            persisted: AtomicBool::new(true),
        }
    }

    pub(crate) fn seq(&self) -> u32 {
        self.seq
    }

    pub(crate) fn entries(&self) -> usize {
        self.entries.load(Ordering::Acquire)
    }

    pub(crate) fn push(&self, op: PostingOp) {
        if matches!(op, PostingOp::Insert(..)) {
            self.entries.fetch_add(1, Ordering::AcqRel);
        }
        self.pending.lock().push(op);
    }

    pub(crate) fn published(&self) -> Arc<PartitionSnapshot> {
        self.published.read().clone()
    }

    /// Drains the pending buffer.
    pub(crate) fn take_pending(&self) -> Vec<PostingOp> {
        std::mem::take(&mut *self.pending.lock())
    }

    /// Puts drained operations back in front of anything written since.
    pub(crate) fn restore_pending(&self, mut ops: Vec<PostingOp>) {
        let mut pending = self.pending.lock();
        ops.append(&mut pending);
        *pending = ops;
    }

    pub(crate) fn needs_persist(&self) -> bool {
        !self.persisted.load(Ordering::Acquire)
    }

    /// Installs a newly persisted snapshot.
    pub(crate) fn publish(&self, snapshot: Arc<PartitionSnapshot>, pending_left: usize) {
        self.entries
            .store(snapshot.entry_count() + pending_left, Ordering::Release);
        *self.published.write() = snapshot;
        self.persisted.store(true, Ordering::Release);
    }

    pub(crate) fn pending_inserts(&self) -> usize {
        self.pending
            .lock()
            .iter()
            .filter(|op| matches!(op, PostingOp::Insert(..)))
            .count()
    }
}
