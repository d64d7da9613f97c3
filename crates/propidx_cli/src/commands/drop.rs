//! Drop command implementation.

use super::IndexTarget;
use propidx_core::StoreConfig;
use tracing::info;

/// Runs the drop command.
///
/// The index is claimed first, so an index still being populated by another
/// store is left alone.
pub fn run(target: &IndexTarget) -> Result<(), Box<dyn std::error::Error>> {
    let store = target.store(StoreConfig::default());
    store.claim()?;
    store.drop_data()?;
    store.close()?;
    info!(index = %target.name, path = %target.path().display(), "index dropped");
    println!("Dropped index '{}'", target.name);
    Ok(())
}
