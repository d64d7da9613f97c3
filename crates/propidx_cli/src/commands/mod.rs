//! CLI command implementations.

pub mod drop;
pub mod populate;
pub mod scan;
pub mod seek;
pub mod stats;

use propidx_core::{IndexError, PhysicalStore, PropertyValue, StoreConfig};
use propidx_storage::FsDirectoryFactory;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// The index could not be opened, populated or read.
    #[error(transparent)]
    Index(#[from] IndexError),

    /// An input file could not be read.
    #[error("cannot read {path}: {source}")]
    Input {
        /// Input path.
        path: String,
        /// Underlying failure.
        source: std::io::Error,
    },

    /// A line or value could not be parsed.
    #[error("line {line}: {message}")]
    Parse {
        /// One-based line number, 0 for command arguments.
        line: usize,
        /// Description of the failure.
        message: String,
    },

    /// No index name was given and none can be derived from the path.
    #[error("cannot derive an index name from {0}; pass --name")]
    MissingName(String),
}

/// The index a command works on.
#[derive(Debug, Clone)]
pub struct IndexTarget {
    /// Index directory.
    pub path: PathBuf,
    /// Index name.
    pub name: String,
}

impl IndexTarget {
    /// Creates a target, deriving the name from `path` when not given.
    pub fn new(path: PathBuf, name: Option<String>) -> Result<Self, CliError> {
        let name = match name {
            Some(name) => name,
            None => path
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string)
                .ok_or_else(|| CliError::MissingName(path.display().to_string()))?,
        };
        Ok(Self { path, name })
    }

    /// Returns a store handle for the target without touching the disk.
    pub fn store(&self, config: StoreConfig) -> PhysicalStore {
        PhysicalStore::new(
            self.name.clone(),
            Arc::new(FsDirectoryFactory::new()),
            &self.path,
            config,
        )
    }

    /// Opens the existing index at the target.
    pub fn open(&self) -> Result<PhysicalStore, CliError> {
        let store = self.store(StoreConfig::default());
        store.open()?;
        Ok(store)
    }

    /// Returns the index directory.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Converts a JSON value into an indexable value.
///
/// Arrays of bytes become byte values. Objects and null are rejected.
pub fn value_from_json(value: serde_json::Value) -> Result<PropertyValue, String> {
    match value {
        serde_json::Value::Bool(b) => Ok(PropertyValue::Bool(b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(PropertyValue::Int(i))
            } else if let Some(f) = n.as_f64() {
                Ok(PropertyValue::Float(f))
            } else {
                Err(format!("number {n} is out of range"))
            }
        }
        serde_json::Value::String(s) => Ok(PropertyValue::Text(s)),
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(|item| {
                item.as_u64()
                    .and_then(|b| u8::try_from(b).ok())
                    .ok_or_else(|| format!("byte array holds {item}"))
            })
            .collect::<Result<Vec<u8>, _>>()
            .map(PropertyValue::Bytes),
        serde_json::Value::Null => Err("null is not indexable".to_string()),
        serde_json::Value::Object(_) => Err("objects are not indexable".to_string()),
    }
}

/// Parses a value given on the command line.
pub fn value_from_arg(arg: &str) -> Result<PropertyValue, CliError> {
    let json = serde_json::from_str(arg)
        .unwrap_or_else(|_| serde_json::Value::String(arg.to_string()));
    value_from_json(json).map_err(|message| CliError::Parse { line: 0, message })
}
