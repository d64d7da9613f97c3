//! Stats command implementation.

use super::IndexTarget;
use propidx_core::{IndexSample, StoreState};
use serde::Serialize;

/// Index statistics.
#[derive(Debug, Serialize)]
pub struct StatsResult {
    /// Index directory.
    pub path: String,
    /// Index name.
    pub name: String,
    /// Lifecycle state, if a status record exists.
    pub state: Option<String>,
    /// Number of partitions.
    pub partitions: usize,
    /// Number of postings.
    pub entries: usize,
    /// Number of distinct entities.
    pub entities: usize,
    /// Sample recorded at commit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample: Option<IndexSample>,
    /// Unique values per sampled entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selectivity: Option<f64>,
}

/// Collects statistics of the index at `target`.
pub fn collect(target: &IndexTarget) -> Result<StatsResult, Box<dyn std::error::Error>> {
    let store = target.open()?;
    let status = store.status()?;
    let snapshot = store.snapshot();
    let entities = store.reader()?.scan().count();

    let sample = status.as_ref().and_then(|s| s.sample);
    let result = StatsResult {
        path: target.path().display().to_string(),
        name: target.name.clone(),
        state: status.map(|s| match s.state {
            StoreState::Populating => "populating".to_string(),
            StoreState::Online => "online".to_string(),
        }),
        partitions: snapshot.partitions().len(),
        entries: snapshot.entry_count(),
        entities,
        sample,
        selectivity: sample.map(|s| s.selectivity()),
    };
    store.close()?;
    Ok(result)
}

/// Runs the stats command.
pub fn run(target: &IndexTarget, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = collect(target)?;
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => print_text_output(&result),
    }
    Ok(())
}

fn print_text_output(result: &StatsResult) {
    println!("propidx Index Statistics");
    println!("========================");
    println!();
    println!("Path:  {}", result.path);
    println!("Name:  {}", result.name);
    println!("State: {}", result.state.as_deref().unwrap_or("unknown"));
    println!();
    println!("Storage:");
    println!("  Partitions: {}", result.partitions);
    println!("  Entries:    {}", result.entries);
    println!("  Entities:   {}", result.entities);

    if let Some(sample) = &result.sample {
        println!();
        println!("Sample:");
        println!("  Index size:    {}", sample.index_size);
        println!("  Unique values: {}", sample.unique_values);
        println!("  Sample size:   {}", sample.sample_size);
        if let Some(selectivity) = result.selectivity {
            println!("  Selectivity:   {selectivity:.4}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use propidx_core::{CloseMode, IndexPopulator, NonUniquePopulator, PropertyUpdate, SamplingConfig, StoreConfig};
    use std::sync::Arc;

    #[test]
    fn stats_of_committed_index() {
        let temp = tempfile::tempdir().unwrap();
        let target = IndexTarget::new(temp.path().join("person_name"), None).unwrap();
        let store = Arc::new(target.store(StoreConfig::default()));
        let mut populator = NonUniquePopulator::new(store.clone(), SamplingConfig::default());
        populator.create().unwrap();
        populator
            .add(&[
                PropertyUpdate::add(1, 1, "foo", &[1]),
                PropertyUpdate::add(2, 1, "foo", &[1]),
            ])
            .unwrap();
        populator.close(CloseMode::Commit).unwrap();
        store.close().unwrap();

        let stats = collect(&target).unwrap();
        assert_eq!(stats.state.as_deref(), Some("online"));
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.entities, 2);
        assert_eq!(stats.sample, Some(IndexSample::new(2, 1, 2)));
        assert_eq!(stats.selectivity, Some(0.5));
    }

    #[test]
    fn stats_of_missing_index() {
        let temp = tempfile::tempdir().unwrap();
        let target = IndexTarget::new(temp.path().join("nothing"), None).unwrap();
        assert!(collect(&target).is_err());
    }
}
