//! Settings read from the environment.

use anyhow::{bail, Context, Result};
use sstable::{
    WriterOptions, DEFAULT_BLOCK_RESTART_INTERVAL, DEFAULT_BLOCK_SIZE, DEFAULT_COMPRESSION,
};
use std::fmt;

/// Reads a configuration value from the environment, falling back to `default`.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// How colliding keys are combined when several tables are read or merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Append values in the order the merge meets them.
    Concat,
    /// Keep whichever value the merge meets first.
    First,
    /// Keep the bytewise larger value.
    Max,
}

impl MergeMode {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "concat" => Ok(MergeMode::Concat),
            "first" => Ok(MergeMode::First),
            "max" => Ok(MergeMode::Max),
            other => bail!("unknown merge mode {:?} (expected concat, first or max)", other),
        }
    }

    /// The merge function implementing this mode.
    pub fn merge_fn(self) -> fn(&[u8], &[u8], &[u8]) -> Option<Vec<u8>> {
        match self {
            MergeMode::Concat => |_, a, b| Some([a, b].concat()),
            MergeMode::First => |_, a, _| Some(a.to_vec()),
            MergeMode::Max => |_, a, b| Some(a.max(b).to_vec()),
        }
    }
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MergeMode::Concat => "concat",
            MergeMode::First => "first",
            MergeMode::Max => "max",
        };
        f.write_str(name)
    }
}

/// Everything the commands need besides their arguments.
///
/// ```text
/// SSTABLE_COMPRESSION      none | snappy | zlib    (default: snappy)
/// SSTABLE_BLOCK_SIZE       block size in bytes      (default: 8192)
/// SSTABLE_RESTART_INTERVAL restart interval         (default: 16)
/// SSTABLE_MERGE            concat | first | max     (default: concat)
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub writer: WriterOptions,
    pub merge: MergeMode,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key, default| env_or(key, default))
    }

    /// Builds a config from any `(key, default) -> value` lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str, &str) -> String,
    {
        let compression = lookup("SSTABLE_COMPRESSION", DEFAULT_COMPRESSION.name());
        let block_size = lookup("SSTABLE_BLOCK_SIZE", &DEFAULT_BLOCK_SIZE.to_string());
        let restart_interval = lookup(
            "SSTABLE_RESTART_INTERVAL",
            &DEFAULT_BLOCK_RESTART_INTERVAL.to_string(),
        );
        let merge = lookup("SSTABLE_MERGE", "concat");

        let block_size: usize = block_size
            .trim()
            .parse()
            .with_context(|| format!("SSTABLE_BLOCK_SIZE={:?}", block_size))?;
        let restart_interval: usize = restart_interval
            .trim()
            .parse()
            .with_context(|| format!("SSTABLE_RESTART_INTERVAL={:?}", restart_interval))?;
        if restart_interval == 0 {
            bail!("SSTABLE_RESTART_INTERVAL must be at least 1");
        }

        let writer = WriterOptions::default()
            .compression_name(compression.trim())
            .context("SSTABLE_COMPRESSION")?
            .block_size(block_size)
            .block_restart_interval(restart_interval);

        Ok(Self {
            writer,
            merge: MergeMode::parse(merge.trim()).context("SSTABLE_MERGE")?,
        })
    }
}
