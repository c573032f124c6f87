//! Error type shared by the writer, reader and merger.

use std::io;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `add` was called with a key that is not strictly greater than the
    /// previous one. The writer is unchanged and remains usable.
    #[error("key {} is not greater than previous key {}", escape(.key), escape(.last))]
    OrderViolation { key: Vec<u8>, last: Vec<u8> },

    /// The input is not a table, or is a corrupted one.
    #[error("bad table format: {0}")]
    Format(String),

    /// A block's stored CRC32C does not match its contents.
    #[error("checksum mismatch in block at offset {offset}: stored {stored:#010x}, computed {computed:#010x}")]
    Checksum {
        offset: u64,
        stored: u32,
        computed: u32,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Rejected configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The merge function produced no value for colliding records.
    #[error("merge function failed for key {}", escape(.key))]
    MergeCallback { key: Vec<u8> },

    /// The writer hit an I/O error earlier and can no longer be used.
    #[error("writer is unusable after a previous I/O failure")]
    Poisoned,
}

impl Error {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Error::Format(msg.into())
    }
}

fn escape(bytes: &[u8]) -> String {
    bytes.escape_ascii().to_string()
}
