//! Writer and reader configuration.

use crate::compression::CompressionType;
use crate::error::Result;

/// Smallest accepted data block size. Smaller requests are raised to this.
pub const MIN_BLOCK_SIZE: usize = 1024;

pub const DEFAULT_BLOCK_SIZE: usize = 8192;

pub const DEFAULT_BLOCK_RESTART_INTERVAL: usize = 16;

pub const DEFAULT_COMPRESSION: CompressionType = CompressionType::Snappy;

/// Options for [`SSTableWriter`](crate::SSTableWriter).
///
/// ```rust
/// use sstable::{CompressionType, WriterOptions};
///
/// let opts = WriterOptions::default()
///     .compression(CompressionType::Zlib)
///     .block_size(64 * 1024);
/// assert_eq!(opts.get_block_size(), 64 * 1024);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterOptions {
    compression: CompressionType,
    block_size: usize,
    block_restart_interval: usize,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            compression: DEFAULT_COMPRESSION,
            block_size: DEFAULT_BLOCK_SIZE,
            block_restart_interval: DEFAULT_BLOCK_RESTART_INTERVAL,
        }
    }
}

impl WriterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    /// Sets compression from a raw trailer code, rejecting unknown codes
    /// with [`Error::Config`](crate::Error::Config).
    pub fn compression_code(self, code: u64) -> Result<Self> {
        Ok(self.compression(CompressionType::try_from(code)?))
    }

    /// Sets compression by name (`none`, `snappy`, `zlib`).
    pub fn compression_name(self, name: &str) -> Result<Self> {
        Ok(self.compression(name.parse()?))
    }

    /// Sets the target uncompressed data block size, clamped to at least
    /// [`MIN_BLOCK_SIZE`].
    #[must_use]
    pub fn block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(MIN_BLOCK_SIZE);
        self
    }

    /// Sets how many records share key prefixes between restart points.
    #[must_use]
    pub fn block_restart_interval(mut self, interval: usize) -> Self {
        self.block_restart_interval = interval;
        self
    }

    #[must_use]
    pub fn get_compression(&self) -> CompressionType {
        self.compression
    }

    #[must_use]
    pub fn get_block_size(&self) -> usize {
        self.block_size
    }

    #[must_use]
    pub fn get_block_restart_interval(&self) -> usize {
        self.block_restart_interval
    }
}

/// Options for [`SSTableReader`](crate::SSTableReader).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Check the CRC32C of every data block as it is loaded. The index
    /// block is always checked.
    pub verify_checksums: bool,
}

impl ReaderOptions {
    #[must_use]
    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }
}
