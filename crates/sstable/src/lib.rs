//! # SSTable - Sorted String Table
//!
//! Immutable, sorted key/value files plus a k-way merge engine over them.
//!
//! A table is written once, in strictly increasing key order, by
//! [`SSTableWriter`] and read back by [`SSTableReader`]. Tables, in-memory
//! [`memtable::Memtable`]s and [`Merger`]s all implement [`Source`], so any
//! of them can feed a merge, including another merge.
//!
//! ## File layout
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ DATA BLOCKS (sorted records, one compression unit each)        │
//! │                                                               │
//! │ length (u32) | crc32c (u32) | payload                          │
//! │                                                               │
//! │ payload := record* | restart (u32)* | num_restarts (u32)       │
//! │ record  := shared | non_shared | value_len (varints)           │
//! │            key[shared..] | value                              │
//! │                                                               │
//! │ ... repeated for each block ...                                │
//! ├───────────────────────────────────────────────────────────────┤
//! │ INDEX BLOCK (same block format, never compressed)              │
//! │                                                               │
//! │ separator key -> data block offset (varint)                    │
//! ├───────────────────────────────────────────────────────────────┤
//! │ TRAILER (always last 512 bytes)                                │
//! │                                                               │
//! │ nine u64 LE fields | zero padding | magic (u32 LE)             │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! All fixed-width integers are little-endian. The CRC32C of each block
//! covers its on-disk payload, i.e. after compression. See [`Trailer`] for
//! the trailer fields.
//!
//! ## Compression
//!
//! | Code | Type     | Codec             |
//! |------|----------|-------------------|
//! | 0    | `None`   | stored as is      |
//! | 1    | `Snappy` | raw Snappy        |
//! | 2    | `Zlib`   | zlib-wrapped DEFLATE |

mod block;
mod coding;
mod compression;
mod error;
mod format;
mod merge;
mod options;
mod reader;
mod source;
mod writer;

pub use compression::CompressionType;
pub use error::{Error, Result};
pub use format::{Trailer, TABLE_MAGIC, TRAILER_SIZE};
pub use merge::{MergeFn, MergeIter, Merger};
pub use options::{
    ReaderOptions, WriterOptions, DEFAULT_BLOCK_RESTART_INTERVAL, DEFAULT_BLOCK_SIZE,
    DEFAULT_COMPRESSION, MIN_BLOCK_SIZE,
};
pub use reader::{SSTableReader, TableIter};
pub use source::{AnySource, Iter, MemtableIter, Record, Source};
pub use writer::SSTableWriter;

#[cfg(test)]
mod tests;
