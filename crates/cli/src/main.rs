//! # CLI - SSTable tool
//!
//! Creates, inspects, queries, verifies and merges table files. Commands that
//! take several files read them through one merger, so colliding keys are
//! combined with the configured merge mode.
//!
//! ## Commands
//!
//! ```text
//! create <out.sst>             Read "key<TAB>value" lines from stdin
//! info <file>...               Print trailer statistics
//! dump <file>                  Print every record
//! get <key> <file>...          Point lookup (prints value or "(nil)")
//! prefix <prefix> <file>...    Prefix scan
//! range <low> <high> <file>... Inclusive range scan
//! verify <file>...             Check every block checksum
//! merge <out.sst> <file>...    Merge files into a new table
//! ```
//!
//! ## Configuration
//!
//! All settings are controlled via environment variables:
//!
//! ```text
//! SSTABLE_COMPRESSION      none | snappy | zlib    (default: snappy)
//! SSTABLE_BLOCK_SIZE       block size in bytes      (default: 8192)
//! SSTABLE_RESTART_INTERVAL restart interval         (default: 16)
//! SSTABLE_MERGE            concat | first | max     (default: concat)
//! RUST_LOG                 log filter               (default: warn)
//! ```
//!
//! ## Example
//!
//! ```text
//! $ printf 'name\tAlice\ncity\tParis\n' | cli create people.sst
//! wrote 2 entries to people.sst
//! $ cli get name people.sst
//! Alice
//! $ cli prefix c people.sst
//! city	Paris
//! (1 entries)
//! ```
//!
//! Keys that start with `-` go after `--`: `cli get -- -k people.sst`.

mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use tracing_subscriber::EnvFilter;

use config::Config;

/// Create, inspect, query and merge sorted table files.
#[derive(Parser)]
#[command(name = "cli", version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read "key<TAB>value" lines from stdin into a new table.
    Create {
        /// Output file. Must not exist.
        out: String,
    },
    /// Print trailer statistics.
    Info {
        #[arg(required = true)]
        files: Vec<String>,
    },
    /// Print every record.
    Dump { file: String },
    /// Point lookup (prints the value or "(nil)").
    Get {
        key: String,
        #[arg(required = true)]
        files: Vec<String>,
    },
    /// Prefix scan.
    Prefix {
        prefix: String,
        #[arg(required = true)]
        files: Vec<String>,
    },
    /// Inclusive range scan.
    Range {
        low: String,
        high: String,
        #[arg(required = true)]
        files: Vec<String>,
    },
    /// Check every block checksum.
    Verify {
        #[arg(required = true)]
        files: Vec<String>,
    },
    /// Merge files into a new table.
    Merge {
        /// Output file. Must not exist.
        out: String,
        #[arg(required = true)]
        files: Vec<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let cfg = Config::from_env()?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match args.command {
        Command::Create { out: path } => {
            commands::create(&path, io::stdin().lock(), &cfg, &mut out)?
        }
        Command::Info { files } => commands::info(&files, &mut out)?,
        Command::Dump { file } => commands::dump(&file, &mut out)?,
        Command::Get { key, files } => commands::get(&key, &files, &cfg, &mut out)?,
        Command::Prefix { prefix, files } => commands::prefix(&prefix, &files, &cfg, &mut out)?,
        Command::Range { low, high, files } => {
            commands::range(&low, &high, &files, &cfg, &mut out)?
        }
        Command::Verify { files } => commands::verify(&files, &mut out)?,
        Command::Merge { out: path, files } => commands::merge(&path, &files, &cfg, &mut out)?,
    }
    out.flush()?;
    Ok(())
}
