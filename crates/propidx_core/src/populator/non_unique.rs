//! Populator for indexes that allow many entities per value.

use super::{CloseMode, IndexPopulator, PopulatorState};
use crate::config::SamplingConfig;
use crate::error::{IndexError, IndexResult};
use crate::register::{IndexSample, SampleRegister};
use crate::sampling::Sampler;
use crate::store::PhysicalStore;
use crate::transaction::{SecurityContext, TransactionContext};
use crate::value::{PropertyUpdate, UpdateMode};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Populates a non-unique property index.
///
/// Repeated values are expected; a value held by several entities yields one
/// posting per entity. When a transaction context is attached, commit is
/// refused once the transaction has been terminated.
///
/// # Example
///
/// ```rust
/// use propidx_core::{
///     CloseMode, IndexPopulator, NonUniquePopulator, PhysicalStore, PropertyUpdate,
///     SampleRegister, SamplingConfig, StoreConfig,
/// };
/// use propidx_storage::InMemoryDirectoryFactory;
/// use std::path::Path;
/// use std::sync::Arc;
///
/// let store = Arc::new(PhysicalStore::new(
///     "person_name",
///     Arc::new(InMemoryDirectoryFactory::new()),
///     Path::new("person_name"),
///     StoreConfig::default(),
/// ));
/// let mut populator = NonUniquePopulator::new(store, SamplingConfig::default());
/// populator.create().unwrap();
/// populator
///     .add(&[
///         PropertyUpdate::add(1, 1, "foo", &[1]),
///         PropertyUpdate::add(2, 1, "bar", &[1]),
///         PropertyUpdate::add(42, 1, "foo", &[1]),
///     ])
///     .unwrap();
///
/// let mut register = SampleRegister::new();
/// assert_eq!(populator.sample_result(&mut register).unwrap(), 3);
/// assert_eq!((register.read_first(), register.read_second()), (2, 3));
///
/// populator.close(CloseMode::Commit).unwrap();
/// ```
pub struct NonUniquePopulator {
    store: Arc<PhysicalStore>,
    sampler: Sampler,
    transaction: Option<Arc<dyn TransactionContext>>,
    state: PopulatorState,
    /// Entries added minus entries removed.
    total: u64,
}

impl NonUniquePopulator {
    /// Creates a populator writing into `store`.
    #[must_use]
    pub fn new(store: Arc<PhysicalStore>, sampling: SamplingConfig) -> Self {
        Self {
            store,
            sampler: Sampler::new(sampling),
            transaction: None,
            state: PopulatorState::Created,
            total: 0,
        }
    }

    /// Attaches the transaction the population runs in.
    #[must_use]
    pub fn with_transaction(mut self, transaction: Arc<dyn TransactionContext>) -> Self {
        self.transaction = Some(transaction);
        self
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> PopulatorState {
        self.state
    }

    /// Returns the store being populated.
    #[must_use]
    pub fn store(&self) -> &Arc<PhysicalStore> {
        &self.store
    }

    fn ensure_populating(&self, operation: &str) -> IndexResult<()> {
        match self.state {
            PopulatorState::Populating => Ok(()),
            PopulatorState::Created => Err(IndexError::illegal_state(format!(
                "{operation}() called before create()"
            ))),
            PopulatorState::Failed => Err(IndexError::illegal_state(format!(
                "{operation}() called after a failed write; the index must be dropped"
            ))),
            PopulatorState::Committed | PopulatorState::Dropped => Err(
                IndexError::illegal_state(format!("{operation}() called after close()")),
            ),
        }
    }

    /// Marks the populator tainted and wraps `error` as a write failure.
    fn fail(&mut self, error: IndexError) -> IndexError {
        self.state = PopulatorState::Failed;
        warn!(index = %self.store.name(), error = %error, "index write failed");
        IndexError::index_write(self.store.name(), error)
    }

    fn write_added(&mut self, batch: &[PropertyUpdate]) -> IndexResult<()> {
        for update in batch {
            if let UpdateMode::Added { after } = &update.mode {
                self.store.insert(after.clone(), update.entity_id)?;
                self.sampler.include(after);
                self.total += 1;
            }
        }
        Ok(())
    }

    fn apply_update(&mut self, update: &PropertyUpdate) -> IndexResult<()> {
        match &update.mode {
            UpdateMode::Added { after } => {
                self.store.insert(after.clone(), update.entity_id)?;
                self.sampler.include(after);
                self.total += 1;
            }
            UpdateMode::Changed { before, after } => {
                self.store.delete(before, update.entity_id)?;
                self.store.insert(after.clone(), update.entity_id)?;
                if !self.sampler.exclude(before) {
                    self.total += 1;
                }
                self.sampler.include(after);
            }
            UpdateMode::Removed { before } => {
                self.store.delete(before, update.entity_id)?;
                if self.sampler.exclude(before) {
                    self.total = self.total.saturating_sub(1);
                }
            }
        }
        Ok(())
    }

    fn current_sample(&self) -> IndexSample {
        let (unique, sample) = self.sampler.result();
        IndexSample::new(self.total, unique, sample)
    }

    fn commit(&self) -> IndexResult<IndexSample> {
        let _override = self
            .transaction
            .as_ref()
            .map(|txn| txn.override_with(SecurityContext::auth_disabled()));

        self.store.refresh()?;
        let sample = self.current_sample();
        self.store.mark_online(sample)?;
        Ok(sample)
    }

    fn drop_data(&mut self) -> IndexResult<()> {
        let previous = self.state;
        self.state = PopulatorState::Dropped;
        if previous == PopulatorState::Created {
            return Ok(());
        }
        self.store.drop_data()
    }
}

impl fmt::Debug for NonUniquePopulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NonUniquePopulator")
            .field("index", &self.store.name())
            .field("state", &self.state)
            .field("total", &self.total)
            .field("sampler", &self.sampler)
            .field("transactional", &self.transaction.is_some())
            .finish()
    }
}

impl IndexPopulator for NonUniquePopulator {
    fn create(&mut self) -> IndexResult<()> {
        if self.state != PopulatorState::Created {
            return Err(IndexError::illegal_state(format!(
                "create() called in state {:?}",
                self.state
            )));
        }

        self.store.prepare()?;
        if let Some(txn) = &self.transaction {
            let mut meta = HashMap::new();
            meta.insert(
                "index".to_string(),
                serde_json::Value::String(self.store.name().to_string()),
            );
            meta.insert(
                "operation".to_string(),
                serde_json::Value::String("populate".to_string()),
            );
            txn.set_meta_data(meta);
        }

        self.state = PopulatorState::Populating;
        info!(index = %self.store.name(), kind = %self.store.kind(), "index population started");
        Ok(())
    }

    fn add(&mut self, batch: &[PropertyUpdate]) -> IndexResult<()> {
        self.ensure_populating("add")?;
        if let Some(update) = batch
            .iter()
            .find(|u| !matches!(u.mode, UpdateMode::Added { .. }))
        {
            return Err(IndexError::illegal_state(format!(
                "add() accepts added values only; entity {} carries a change",
                update.entity_id
            )));
        }

        if let Err(e) = self.write_added(batch) {
            return Err(self.fail(e));
        }
        debug!(index = %self.store.name(), batch = batch.len(), total = self.total, "added batch");
        Ok(())
    }

    fn update(&mut self, batch: &[PropertyUpdate]) -> IndexResult<()> {
        self.ensure_populating("update")?;
        for update in batch {
            if let Err(e) = self.apply_update(update) {
                return Err(self.fail(e));
            }
        }
        debug!(index = %self.store.name(), batch = batch.len(), total = self.total, "applied updates");
        Ok(())
    }

    fn sample_result(&self, register: &mut SampleRegister) -> IndexResult<u64> {
        self.ensure_populating("sample_result")?;
        let (unique, sample) = self.sampler.result();
        register.write(unique, sample);
        Ok(self.total)
    }

    fn close(&mut self, mode: CloseMode) -> IndexResult<()> {
        if self.state.is_closed() {
            return Err(IndexError::illegal_state("close() called twice"));
        }

        match mode {
            CloseMode::Drop => {
                self.drop_data()?;
                info!(index = %self.store.name(), "index population dropped");
                Ok(())
            }
            CloseMode::Commit => {
                self.ensure_populating("close(Commit)")?;

                let terminated = self
                    .transaction
                    .as_ref()
                    .and_then(|txn| txn.termination_reason());
                if let Some(status) = terminated {
                    warn!(index = %self.store.name(), reason = %status, "transaction terminated, dropping index");
                    if let Err(e) = self.drop_data() {
                        warn!(index = %self.store.name(), error = %e, "failed to drop refused index");
                    }
                    return Err(IndexError::TransactionTerminated { status });
                }

                match self.commit() {
                    Ok(sample) => {
                        self.state = PopulatorState::Committed;
                        info!(
                            index = %self.store.name(),
                            entries = sample.index_size,
                            unique = sample.unique_values,
                            sample = sample.sample_size,
                            "index population committed"
                        );
                        Ok(())
                    }
                    Err(e) => {
                        warn!(index = %self.store.name(), error = %e, "commit failed, dropping index");
                        if let Err(drop_err) = self.drop_data() {
                            warn!(index = %self.store.name(), error = %drop_err, "failed to drop index");
                        }
                        Err(e)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::transaction::{AccessMode, SimpleTransaction, Status, TransactionType};
    use crate::types::{EntityId, TransactionId};
    use propidx_storage::InMemoryDirectoryFactory;
    use std::path::Path;

    fn store() -> Arc<PhysicalStore> {
        Arc::new(PhysicalStore::new(
            "person_name",
            Arc::new(InMemoryDirectoryFactory::new()),
            Path::new("person_name"),
            StoreConfig::default(),
        ))
    }

    fn populator() -> NonUniquePopulator {
        let mut populator = NonUniquePopulator::new(store(), SamplingConfig::default());
        populator.create().unwrap();
        populator
    }

    fn sample(populator: &NonUniquePopulator) -> (u64, u64, u64) {
        let mut register = SampleRegister::new();
        let size = populator.sample_result(&mut register).unwrap();
        (size, register.read_first(), register.read_second())
    }

    fn scan(populator: &NonUniquePopulator) -> Vec<u64> {
        populator
            .store()
            .reader()
            .unwrap()
            .scan()
            .map(EntityId::as_u64)
            .collect()
    }

    #[test]
    fn add_before_create_is_illegal() {
        let mut populator = NonUniquePopulator::new(store(), SamplingConfig::default());
        let err = populator
            .add(&[PropertyUpdate::add(1, 1, "foo", &[1])])
            .unwrap_err();
        assert!(err.is_illegal_state());
        assert!(populator
            .sample_result(&mut SampleRegister::new())
            .unwrap_err()
            .is_illegal_state());
    }

    #[test]
    fn create_twice_is_illegal() {
        let mut populator = populator();
        assert!(populator.create().unwrap_err().is_illegal_state());
    }

    #[test]
    fn add_rejects_changes_before_writing() {
        let mut populator = populator();
        let err = populator
            .add(&[
                PropertyUpdate::add(1, 1, "foo", &[1]),
                PropertyUpdate::change(2, 1, "a", "b", &[1]),
            ])
            .unwrap_err();
        assert!(err.is_illegal_state());
        assert_eq!(populator.state(), PopulatorState::Populating);
        assert_eq!(sample(&populator), (0, 0, 0));
    }

    #[test]
    fn updates_adjust_sample_and_postings() {
        let mut populator = populator();
        populator
            .add(&[
                PropertyUpdate::add(1, 1, "foo", &[1]),
                PropertyUpdate::add(2, 1, "bar", &[1]),
                PropertyUpdate::add(3, 1, "baz", &[1]),
            ])
            .unwrap();
        populator
            .update(&[
                PropertyUpdate::change(1, 1, "foo", "bar", &[1]),
                PropertyUpdate::remove(3, 1, "baz", &[1]),
                PropertyUpdate::add(4, 1, "qux", &[1]),
            ])
            .unwrap();

        assert_eq!(sample(&populator), (3, 2, 3));
        populator.store().refresh().unwrap();
        assert_eq!(scan(&populator), vec![1, 2, 4]);
        let reader = populator.store().reader().unwrap();
        assert!(reader.seek(&"foo".into()).is_empty());
        assert_eq!(reader.seek(&"bar".into()), vec![EntityId::new(1), EntityId::new(2)]);
    }

    #[test]
    fn removing_unknown_value_keeps_counts() {
        let mut populator = populator();
        populator
            .update(&[PropertyUpdate::remove(9, 1, "ghost", &[1])])
            .unwrap();
        assert_eq!(sample(&populator), (0, 0, 0));
    }

    #[test]
    fn commit_marks_store_online() {
        let mut populator = populator();
        populator
            .add(&[PropertyUpdate::add(1, 1, "foo", &[1])])
            .unwrap();
        populator.close(CloseMode::Commit).unwrap();

        assert_eq!(populator.state(), PopulatorState::Committed);
        let status = populator.store().status().unwrap().unwrap();
        assert!(status.is_online());
        assert_eq!(status.sample, Some(IndexSample::new(1, 1, 1)));
        assert_eq!(scan(&populator), vec![1]);
    }

    #[test]
    fn calls_after_drop_are_illegal() {
        let mut populator = populator();
        populator.close(CloseMode::Drop).unwrap();

        assert_eq!(populator.state(), PopulatorState::Dropped);
        assert!(populator
            .add(&[PropertyUpdate::add(1, 1, "foo", &[1])])
            .unwrap_err()
            .is_illegal_state());
        assert!(populator
            .sample_result(&mut SampleRegister::new())
            .unwrap_err()
            .is_illegal_state());
        assert!(populator
            .close(CloseMode::Drop)
            .unwrap_err()
            .is_illegal_state());
    }

    #[test]
    fn drop_without_create() {
        let mut populator = NonUniquePopulator::new(store(), SamplingConfig::default());
        populator.close(CloseMode::Drop).unwrap();
        assert_eq!(populator.state(), PopulatorState::Dropped);
    }

    #[test]
    fn failed_write_taints_populator() {
        let mut populator = populator();
        populator.store().close().unwrap();

        let err = populator
            .add(&[PropertyUpdate::add(1, 1, "foo", &[1])])
            .unwrap_err();
        assert!(matches!(err, IndexError::IndexWrite { .. }));
        assert_eq!(populator.state(), PopulatorState::Failed);

        assert!(populator
            .add(&[PropertyUpdate::add(2, 1, "bar", &[1])])
            .unwrap_err()
            .is_illegal_state());
        assert!(populator
            .close(CloseMode::Commit)
            .unwrap_err()
            .is_illegal_state());
    }

    #[test]
    fn transaction_metadata_and_override() {
        let txn = Arc::new(SimpleTransaction::new(
            TransactionId::new(7),
            TransactionType::Explicit,
            SecurityContext::new("alice", AccessMode::Write),
        ));
        let mut populator = NonUniquePopulator::new(store(), SamplingConfig::default())
            .with_transaction(txn.clone());
        populator.create().unwrap();
        assert_eq!(
            txn.meta_data().get("index"),
            Some(&serde_json::Value::String("person_name".to_string()))
        );

        populator.close(CloseMode::Commit).unwrap();
        assert_eq!(txn.security_context().subject(), "alice");
    }

    #[test]
    fn terminated_transaction_refuses_commit() {
        let txn = Arc::new(SimpleTransaction::new(
            TransactionId::new(8),
            TransactionType::Implicit,
            SecurityContext::auth_disabled(),
        ));
        let mut populator = NonUniquePopulator::new(store(), SamplingConfig::default())
            .with_transaction(txn.clone());
        populator.create().unwrap();
        populator
            .add(&[PropertyUpdate::add(1, 1, "foo", &[1])])
            .unwrap();

        txn.terminate(Status::terminated());
        let err = populator.close(CloseMode::Commit).unwrap_err();
        match err {
            IndexError::TransactionTerminated { status } => {
                assert_eq!(status, Status::terminated());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(populator.state(), PopulatorState::Dropped);
        assert_eq!(populator.store().status().unwrap(), None);
    }
}
