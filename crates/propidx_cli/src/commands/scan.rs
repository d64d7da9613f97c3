//! Scan command implementation.

use super::IndexTarget;

/// Runs the scan command.
pub fn run(target: &IndexTarget, limit: Option<usize>) -> Result<(), Box<dyn std::error::Error>> {
    let store = target.open()?;
    let ids = store.reader()?.scan().take(limit.unwrap_or(usize::MAX));
    for id in ids {
        println!("{id}");
    }
    store.close()?;
    Ok(())
}
