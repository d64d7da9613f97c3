//! Population scenarios run against both directory kinds.

use propidx_core::{
    CloseMode, IndexError, IndexPopulator, PhysicalStore, PopulatorState, PropertyUpdate,
    SampleRegister, SecurityContext, SimpleTransaction, Status, StoreConfig, StoreState,
    TransactionId, TransactionType,
};
use propidx_storage::StoreKind;
use propidx_testkit::prelude::*;
use std::sync::Arc;

fn three_updates(values: [&str; 3]) -> Vec<PropertyUpdate> {
    vec![
        PropertyUpdate::add(1, 1, values[0], &[1]),
        PropertyUpdate::add(2, 1, values[1], &[1]),
        PropertyUpdate::add(42, 1, values[2], &[1]),
    ]
}

#[test]
fn sample_of_empty_index() {
    with_each_kind(|index| {
        let populator = index.created_populator();
        assert_eq!(sample_of(&populator), (0, 0, 0));
    });
}

#[test]
fn sample_of_distinct_values() {
    with_each_kind(|index| {
        let mut populator = index.created_populator();
        populator.add(&three_updates(["aaa", "bbb", "ccc"])).unwrap();
        assert_eq!(sample_of(&populator), (3, 3, 3));
    });
}

#[test]
fn sample_of_repeated_value() {
    with_each_kind(|index| {
        let mut populator = index.created_populator();
        populator.add(&three_updates(["foo", "bar", "foo"])).unwrap();
        assert_eq!(sample_of(&populator), (3, 2, 3));
    });
}

#[test]
fn scan_sees_writes_only_after_refresh() {
    with_each_kind(|index| {
        let mut populator = index.created_populator();
        populator.add(&three_updates(["foo", "bar", "foo"])).unwrap();
        assert!(index.scan().is_empty());

        index.refresh().unwrap();
        assert_eq!(index.scan(), vec![1, 2, 42]);
    });
}

#[test]
fn repeated_posting_collapses_in_scan() {
    with_each_kind(|index| {
        let mut populator = index.created_populator();
        populator
            .add(&[
                PropertyUpdate::add(5, 1, "foo", &[1]),
                PropertyUpdate::add(5, 1, "foo", &[1]),
                PropertyUpdate::add(3, 1, "foo", &[1]),
            ])
            .unwrap();
        populator.close(CloseMode::Commit).unwrap();
        assert_eq!(index.scan(), vec![3, 5]);
    });
}

#[test]
fn calls_after_drop_are_illegal() {
    with_each_kind(|index| {
        let mut populator = index.created_populator();
        populator.add(&three_updates(["a", "b", "c"])).unwrap();
        populator.close(CloseMode::Drop).unwrap();

        let err = populator
            .add(&three_updates(["a", "b", "c"]))
            .unwrap_err();
        assert!(err.is_illegal_state());
        let err = populator
            .sample_result(&mut SampleRegister::new())
            .unwrap_err();
        assert!(err.is_illegal_state());
    });
}

#[test]
fn commit_persists_sample_and_rolls_partitions() {
    for kind in [StoreKind::InMemory, StoreKind::OnDisk] {
        let index = TestIndex::of_kind(kind, StoreConfig::new().max_partition_entries(2));
        let mut populator = index.created_populator();
        populator.add(&three_updates(["x", "y", "x"])).unwrap();
        populator
            .add(&[PropertyUpdate::add(7, 1, "z", &[1])])
            .unwrap();
        assert_eq!(index.partition_count(), 2);

        populator.close(CloseMode::Commit).unwrap();
        assert_eq!(populator.state(), PopulatorState::Committed);
        assert_eq!(index.scan(), vec![1, 2, 7, 42]);

        let status = index.status().unwrap().unwrap();
        assert!(status.is_online());
        let sample = status.sample.unwrap();
        assert_eq!(
            (sample.index_size, sample.unique_values, sample.sample_size),
            (4, 3, 4)
        );
    }
}

#[test]
fn committed_index_survives_reopen() {
    let index = TestIndex::file();
    let mut populator = index.created_populator();
    populator.add(&three_updates(["foo", "bar", "baz"])).unwrap();
    populator.close(CloseMode::Commit).unwrap();
    index.close().unwrap();

    let reopened = index.reopen();
    assert_eq!(scan_store(&reopened), vec![1, 2, 42]);
    let reader = reopened.reader().unwrap();
    assert_eq!(reader.seek(&"bar".into()).len(), 1);
}

#[test]
fn dropped_index_leaves_no_partitions_on_disk() {
    let index = TestIndex::file();
    let mut populator = index.created_populator();
    populator.add(&three_updates(["foo", "bar", "baz"])).unwrap();
    index.refresh().unwrap();
    assert!(index.path().join("partition-000000.idx").exists());

    populator.close(CloseMode::Drop).unwrap();
    assert!(!index.path().exists());
    assert!(index.scan().is_empty());
}

#[test]
fn terminated_transaction_leaves_no_data() {
    with_each_kind(|index| {
        let txn = Arc::new(SimpleTransaction::new(
            TransactionId::new(1),
            TransactionType::Implicit,
            SecurityContext::auth_disabled(),
        ));
        let mut populator = index.populator().with_transaction(txn.clone());
        populator.create().unwrap();
        populator.add(&three_updates(["a", "b", "c"])).unwrap();

        txn.terminate(Status::timed_out());
        let err = populator.close(CloseMode::Commit).unwrap_err();
        assert!(matches!(err, IndexError::TransactionTerminated { .. }));
        assert!(index.scan().is_empty());
        assert_eq!(index.status().unwrap(), None);
    });
}

#[test]
fn second_populator_on_same_path_fails_to_create() {
    let first = TestIndex::file();
    let mut populator = first.created_populator();
    populator.add(&three_updates(["a", "b", "c"])).unwrap();

    let second = TestIndex::with_factory(
        first.factory.clone(),
        first.path().to_path_buf(),
        StoreConfig::default(),
        None,
    );
    let err = second.populator().create().unwrap_err();
    assert!(matches!(err, IndexError::StorageInit { .. }));

    populator.close(CloseMode::Commit).unwrap();
    assert_eq!(first.scan(), vec![1, 2, 42]);
}

#[test]
fn abandoned_population_is_not_served_after_reopen() {
    for kind in [StoreKind::InMemory, StoreKind::OnDisk] {
        let index = TestIndex::of_kind(kind, StoreConfig::default());
        let mut populator = index.created_populator();
        populator
            .add(&[
                PropertyUpdate::add(1, 1, "foo", &[1]),
                PropertyUpdate::add(2, 1, "bar", &[1]),
            ])
            .unwrap();
        index.refresh().unwrap();
        assert_eq!(index.scan(), vec![1, 2]);

        // The process dies before the populator is closed
        drop(populator);
        index.close().unwrap();

        let reopened = PhysicalStore::new(
            TEST_INDEX,
            index.factory.clone(),
            index.path(),
            StoreConfig::default(),
        );
        let err = reopened.open().unwrap_err();
        assert!(matches!(
            err,
            IndexError::IndexNotOnline {
                state: Some(StoreState::Populating),
                ..
            }
        ));
        assert!(scan_store(&reopened).is_empty());
    }
}
