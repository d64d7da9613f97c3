//! Seek command implementation.

use super::{value_from_arg, IndexTarget};

/// Runs the seek command.
pub fn run(target: &IndexTarget, value: &str) -> Result<(), Box<dyn std::error::Error>> {
    let value = value_from_arg(value)?;
    let store = target.open()?;
    let reader = store.reader()?;
    let matches = reader.seek(&value);
    if matches.is_empty() {
        println!("No entities hold {value}");
    }
    for id in matches {
        println!("{id}");
    }
    reader.close();
    store.close()?;
    Ok(())
}
