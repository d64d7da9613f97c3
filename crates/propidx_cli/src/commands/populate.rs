//! Populate command implementation.

use super::{value_from_json, CliError, IndexTarget};
use propidx_core::{
    CloseMode, IndexPopulator, NonUniquePopulator, PropertyUpdate, SampleRegister,
    SamplingConfig, SecurityContext, SimpleTransaction, StoreConfig, TransactionId,
    TransactionType,
};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// One input line.
#[derive(Debug, Deserialize)]
struct InputRecord {
    entity: u64,
    key: u32,
    value: serde_json::Value,
    #[serde(default)]
    labels: Vec<u32>,
}

/// Tuning for a populate run.
#[derive(Debug, Clone, Default)]
pub struct PopulateOptions {
    /// Number of updates per batch.
    pub batch_size: usize,
    /// Distinct values counted exactly before estimating.
    pub exact_limit: Option<usize>,
    /// Entries per partition.
    pub max_partition_entries: Option<usize>,
}

impl PopulateOptions {
    fn sampling(&self) -> SamplingConfig {
        let config = SamplingConfig::default();
        match self.exact_limit {
            Some(limit) => config.exact_limit(limit),
            None => config,
        }
    }

    fn store(&self) -> StoreConfig {
        let config = StoreConfig::default();
        match self.max_partition_entries {
            Some(entries) => config.max_partition_entries(entries),
            None => config,
        }
    }
}

fn parse_line(line_no: usize, line: &str) -> Result<PropertyUpdate, CliError> {
    let parse_error = |message: String| CliError::Parse {
        line: line_no,
        message,
    };
    let record: InputRecord =
        serde_json::from_str(line).map_err(|e| parse_error(e.to_string()))?;
    let value = value_from_json(record.value).map_err(parse_error)?;
    Ok(PropertyUpdate::add(
        record.entity,
        record.key,
        value,
        &record.labels,
    ))
}

/// Reads every update from a JSON lines file. Blank lines are skipped.
pub fn read_updates(input: &Path) -> Result<Vec<PropertyUpdate>, CliError> {
    let file = File::open(input).map_err(|source| CliError::Input {
        path: input.display().to_string(),
        source,
    })?;

    let mut updates = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| CliError::Input {
            path: input.display().to_string(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        updates.push(parse_line(idx + 1, &line)?);
    }
    Ok(updates)
}

/// Runs the populate command.
pub fn run(
    target: &IndexTarget,
    input: &Path,
    options: &PopulateOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let updates = read_updates(input)?;
    let store = Arc::new(target.store(options.store()));
    let transaction = Arc::new(SimpleTransaction::new(
        TransactionId::new(1),
        TransactionType::Implicit,
        SecurityContext::auth_disabled(),
    ));
    let mut populator =
        NonUniquePopulator::new(store.clone(), options.sampling()).with_transaction(transaction);

    populator.create()?;
    for batch in updates.chunks(options.batch_size.max(1)) {
        if let Err(e) = populator.add(batch) {
            warn!(index = %target.name, error = %e, "population failed");
            if let Err(drop_err) = populator.close(CloseMode::Drop) {
                warn!(index = %target.name, error = %drop_err, "failed to drop index");
            }
            return Err(e.into());
        }
    }

    let mut register = SampleRegister::new();
    let size = populator.sample_result(&mut register)?;
    populator.close(CloseMode::Commit)?;
    store.close()?;

    info!(index = %target.name, entries = size, "index built");
    println!(
        "Indexed {} entries ({} unique values in a sample of {})",
        size,
        register.read_first(),
        register.read_second()
    );
    Ok(())
}
