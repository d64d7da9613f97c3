//! propidx CLI
//!
//! Command-line tools for on-disk property indexes.
//!
//! # Commands
//!
//! - `populate` - Build an index from JSON lines
//! - `scan` - List every indexed entity
//! - `seek` - List entities holding a value
//! - `stats` - Display status and sample of an index
//! - `drop` - Remove an index

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// propidx command-line index tools.
#[derive(Parser)]
#[command(name = "propidx")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the index directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Index name (defaults to the last path component)
    #[arg(global = true, short, long)]
    name: Option<String>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an index from a JSON lines file
    Populate {
        /// Input file with one update per line
        #[arg(short, long)]
        input: PathBuf,

        /// Number of updates per batch
        #[arg(short, long, default_value = "1000")]
        batch_size: usize,

        /// Distinct values counted exactly before estimating
        #[arg(long)]
        exact_limit: Option<usize>,

        /// Entries per partition
        #[arg(long)]
        max_partition_entries: Option<usize>,
    },

    /// List every indexed entity id in ascending order
    Scan {
        /// Maximum number of ids to print
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// List entity ids holding a value
    Seek {
        /// Value as JSON (`42`, `true`, `"text"`); bare words are text
        #[arg(long)]
        value: String,
    },

    /// Display status and sample of an index
    Stats {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Remove an index and all its partitions
    Drop,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Commands::Version = cli.command {
        println!("propidx CLI v{}", env!("CARGO_PKG_VERSION"));
        println!("propidx Core v{}", propidx_core::VERSION);
        return Ok(());
    }

    let path = cli.path.ok_or("Index path required")?;
    let target = commands::IndexTarget::new(path, cli.name)?;

    match cli.command {
        Commands::Populate {
            input,
            batch_size,
            exact_limit,
            max_partition_entries,
        } => {
            let options = commands::populate::PopulateOptions {
                batch_size,
                exact_limit,
                max_partition_entries,
            };
            commands::populate::run(&target, &input, &options)?;
        }
        Commands::Scan { limit } => commands::scan::run(&target, limit)?,
        Commands::Seek { value } => commands::seek::run(&target, &value)?,
        Commands::Stats { format } => commands::stats::run(&target, &format)?,
        Commands::Drop => commands::drop::run(&target)?,
        Commands::Version => {}
    }

    Ok(())
}
