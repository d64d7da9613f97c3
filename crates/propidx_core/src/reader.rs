//! Readers over a published store snapshot.

use crate::store::{PartitionSnapshot, StoreSnapshot};
use crate::types::EntityId;
use crate::value::PropertyValue;
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};
use std::ops::{Bound, RangeBounds};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Registration of one live reader with its store.
#[derive(Debug)]
pub(crate) struct ReaderToken {
    counter: Arc<AtomicUsize>,
}

impl ReaderToken {
    pub(crate) fn acquire(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self {
            counter: Arc::clone(counter),
        }
    }
}

impl Drop for ReaderToken {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A read view of an index at the moment the reader was opened.
///
/// Writes refreshed after the reader was opened are not visible to it. The
/// reader is released when dropped, including during unwinding.
///
/// # Example
///
/// ```rust
/// use propidx_core::{EntityId, PhysicalStore, StoreConfig};
/// use propidx_storage::InMemoryDirectoryFactory;
/// use std::path::Path;
/// use std::sync::Arc;
///
/// let store = PhysicalStore::new(
///     "person_name",
///     Arc::new(InMemoryDirectoryFactory::new()),
///     Path::new("person_name"),
///     StoreConfig::default(),
/// );
/// store.prepare().unwrap();
/// store.insert("bar".into(), EntityId::new(42)).unwrap();
/// store.insert("foo".into(), EntityId::new(1)).unwrap();
/// store.refresh().unwrap();
///
/// let reader = store.reader().unwrap();
/// let ids: Vec<u64> = reader.scan().map(EntityId::as_u64).collect();
/// assert_eq!(ids, vec![1, 42]);
/// ```
#[derive(Debug)]
pub struct IndexReader {
    snapshot: Arc<StoreSnapshot>,
    _token: ReaderToken,
}

impl IndexReader {
    pub(crate) fn new(snapshot: Arc<StoreSnapshot>, token: ReaderToken) -> Self {
        Self {
            snapshot,
            _token: token,
        }
    }

    /// Returns every indexed entity in ascending order, each once.
    ///
    /// Entities are merged lazily across partitions. The scan takes over the
    /// reader, which is released when the iterator is dropped; scanning again
    /// needs a new reader.
    #[must_use]
    pub fn scan(self) -> EntityIdIter {
        let Self {
            snapshot,
            _token: token,
        } = self;
        EntityIdIter::new(snapshot.partitions().to_vec(), token)
    }

    /// Returns the entities holding exactly `value`, ascending.
    #[must_use]
    pub fn seek(&self, value: &PropertyValue) -> Vec<EntityId> {
        let mut matches = BTreeSet::new();
        for partition in self.snapshot.partitions() {
            if let Some(entities) = partition.postings().get(value) {
                matches.extend(entities.iter().copied());
            }
        }
        matches.into_iter().collect()
    }

    /// Returns the entities holding a value within `bounds`, ascending.
    pub fn range<R>(&self, bounds: R) -> Vec<EntityId>
    where
        R: RangeBounds<PropertyValue>,
    {
        let start = bounds.start_bound();
        let end = bounds.end_bound();
        if is_empty_range(start, end) {
            return Vec::new();
        }

        let mut matches = BTreeSet::new();
        for partition in self.snapshot.partitions() {
            for (_, entities) in partition.postings().range((start, end)) {
                matches.extend(entities.iter().copied());
            }
        }
        matches.into_iter().collect()
    }

    /// Returns the number of postings pairing `entity` with `value`.
    ///
    /// A pair is stored at most once per partition.
    #[must_use]
    pub fn count_entities(&self, entity: EntityId, value: &PropertyValue) -> usize {
        self.snapshot
            .partitions()
            .iter()
            .filter(|p| {
                p.postings()
                    .get(value)
                    .is_some_and(|entities| entities.binary_search(&entity).is_ok())
            })
            .count()
    }

    /// Returns the number of postings visible to this reader.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.snapshot.entry_count()
    }

    /// Releases the reader.
    pub fn close(self) {}
}

fn is_empty_range(start: Bound<&PropertyValue>, end: Bound<&PropertyValue>) -> bool {
    let (s, e) = match (start, end) {
        (Bound::Included(s) | Bound::Excluded(s), Bound::Included(e) | Bound::Excluded(e)) => {
            (s, e)
        }
        _ => return false,
    };
    s > e || (s == e && (matches!(start, Bound::Excluded(_)) || matches!(end, Bound::Excluded(_))))
}

/// Ascending, deduplicated iterator over entity ids of several partitions.
#[derive(Debug)]
pub struct EntityIdIter {
    partitions: Vec<Arc<PartitionSnapshot>>,
    cursors: Vec<usize>,
    heap: BinaryHeap<Reverse<(EntityId, usize)>>,
    last: Option<EntityId>,
    _token: ReaderToken,
}

impl EntityIdIter {
    fn new(partitions: Vec<Arc<PartitionSnapshot>>, token: ReaderToken) -> Self {
        let mut heap = BinaryHeap::with_capacity(partitions.len());
        for (idx, partition) in partitions.iter().enumerate() {
            if let Some(first) = partition.entities().first() {
                heap.push(Reverse((*first, idx)));
            }
        }
        Self {
            cursors: vec![0; partitions.len()],
            partitions,
            heap,
            last: None,
            _token: token,
        }
    }

    fn advance(&mut self, idx: usize) {
        let cursor = &mut self.cursors[idx];
        *cursor += 1;
        if let Some(next) = self.partitions[idx].entities().get(*cursor) {
            self.heap.push(Reverse((*next, idx)));
        }
    }
}

impl Iterator for EntityIdIter {
    type Item = EntityId;

    fn next(&mut self) -> Option<EntityId> {
        while let Some(Reverse((entity, idx))) = self.heap.pop() {
            self.advance(idx);
            if self.last == Some(entity) {
                continue;
            }
            self.last = Some(entity);
            return Some(entity);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partition(seq: u32, postings: &[(&str, &[u64])]) -> Arc<PartitionSnapshot> {
        Arc::new(PartitionSnapshot::from_postings(
            seq,
            postings.iter().map(|(value, ids)| {
                (
                    PropertyValue::from(*value),
                    ids.iter().copied().map(EntityId::new).collect(),
                )
            }),
        ))
    }

    fn reader(partitions: Vec<Arc<PartitionSnapshot>>, counter: &Arc<AtomicUsize>) -> IndexReader {
        IndexReader::new(
            Arc::new(StoreSnapshot::new(partitions)),
            ReaderToken::acquire(counter),
        )
    }

    fn ids(entities: impl IntoIterator<Item = EntityId>) -> Vec<u64> {
        entities.into_iter().map(EntityId::as_u64).collect()
    }

    #[test]
    fn scan_merges_and_deduplicates() {
        let counter = Arc::new(AtomicUsize::new(0));
        let reader = reader(
            vec![
                partition(0, &[("foo", &[1, 7]), ("bar", &[42])]),
                partition(1, &[("bar", &[7, 3])]),
                partition(2, &[]),
            ],
            &counter,
        );
        assert_eq!(counter.load(Ordering::Acquire), 1);
        assert_eq!(ids(reader.scan()), vec![1, 3, 7, 42]);
        assert_eq!(counter.load(Ordering::Acquire), 0);
    }

    #[test]
    fn abandoned_scan_releases_reader() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scan = reader(vec![partition(0, &[("a", &[1, 2, 3])])], &counter).scan();
        assert_eq!(scan.next(), Some(EntityId::new(1)));
        assert_eq!(counter.load(Ordering::Acquire), 1);

        drop(scan);
        assert_eq!(counter.load(Ordering::Acquire), 0);
    }

    #[test]
    fn seek_and_range() {
        let counter = Arc::new(AtomicUsize::new(0));
        let reader = reader(
            vec![
                partition(0, &[("a", &[5]), ("c", &[1])]),
                partition(1, &[("a", &[2]), ("b", &[9])]),
            ],
            &counter,
        );

        assert_eq!(ids(reader.seek(&"a".into())), vec![2, 5]);
        assert!(reader.seek(&"z".into()).is_empty());

        let a = PropertyValue::from("a");
        let b = PropertyValue::from("b");
        let c = PropertyValue::from("c");
        assert_eq!(ids(reader.range(a.clone()..c.clone())), vec![2, 5, 9]);
        assert_eq!(ids(reader.range(b.clone()..)), vec![1, 9]);
        assert_eq!(ids(reader.range(..)), vec![1, 2, 5, 9]);
        assert!(reader.range(c..a).is_empty());
        assert!(reader.range(b.clone()..b).is_empty());
    }

    #[test]
    fn count_entities_per_pair() {
        let counter = Arc::new(AtomicUsize::new(0));
        let reader = reader(
            vec![
                partition(0, &[("a", &[5])]),
                partition(1, &[("a", &[5, 6])]),
            ],
            &counter,
        );
        assert_eq!(reader.count_entities(EntityId::new(5), &"a".into()), 2);
        assert_eq!(reader.count_entities(EntityId::new(6), &"a".into()), 1);
        assert_eq!(reader.count_entities(EntityId::new(6), &"b".into()), 0);
        assert_eq!(reader.entry_count(), 3);
    }

    #[test]
    fn released_on_drop_and_close() {
        let counter = Arc::new(AtomicUsize::new(0));
        let first = reader(Vec::new(), &counter);
        let second = reader(Vec::new(), &counter);
        assert_eq!(counter.load(Ordering::Acquire), 2);

        drop(first);
        second.close();
        assert_eq!(counter.load(Ordering::Acquire), 0);
    }

    #[test]
    fn released_on_panic() {
        let counter = Arc::new(AtomicUsize::new(0));
        let result = std::panic::catch_unwind(|| {
            let reader = reader(vec![partition(0, &[("a", &[1, 2])])], &counter);
            for entity in reader.scan() {
                if entity.as_u64() == 2 {
                    panic!("scan aborted at {entity}");
                }
            }
        });
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::Acquire), 0);
    }
}
