use byteorder::{ByteOrder, LittleEndian};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::block::{Block, BlockIter};
use crate::coding::get_varint;
use crate::compression::CompressionType;
use crate::error::{Error, Result};
use crate::format::{Trailer, TRAILER_SIZE};
use crate::options::ReaderOptions;
use crate::source::{Iter, Limit, Record, Source};

/// Reads a sealed table.
///
/// On [`open`](SSTableReader::open) the whole file is loaded into memory and
/// shared behind an `Arc`. The trailer is decoded and the index block is
/// checksummed and parsed up front; data blocks are decompressed on demand
/// by each iterator, so iterators are independent and `Send`.
///
/// Cloning a reader is cheap and shares the file image.
#[derive(Clone)]
pub struct SSTableReader {
    inner: Arc<TableInner>,
}

struct TableInner {
    /// Kept for diagnostics.
    path: Option<PathBuf>,
    data: Vec<u8>,
    trailer: Trailer,
    compression: CompressionType,
    index: Arc<Block>,
    options: ReaderOptions,
}

impl SSTableReader {
    /// Opens the table at `path`.
    ///
    /// # Errors
    ///
    /// - [`Error::Format`] if the file is shorter than a trailer, the magic
    ///   is wrong, the compression code is unknown, or the index block lies
    ///   outside the file.
    /// - [`Error::Checksum`] if the index block is corrupted.
    pub fn open<P: AsRef<Path>>(path: P, options: ReaderOptions) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        let reader = Self::build(data, Some(path.to_path_buf()), options)?;
        info!(
            path = %path.display(),
            entries = reader.trailer().count_entries,
            data_blocks = reader.trailer().count_data_blocks,
            "opened table"
        );
        Ok(reader)
    }

    /// Reads a table from an in-memory image.
    pub fn from_bytes(data: Vec<u8>, options: ReaderOptions) -> Result<Self> {
        Self::build(data, None, options)
    }

    fn build(data: Vec<u8>, path: Option<PathBuf>, options: ReaderOptions) -> Result<Self> {
        if data.len() < TRAILER_SIZE {
            return Err(Error::format(format!(
                "file of {} bytes is too small for a table trailer",
                data.len()
            )));
        }
        let trailer_start = data.len() - TRAILER_SIZE;
        let trailer = Trailer::decode(&data[trailer_start..])?;
        let compression = CompressionType::try_from(trailer.compression_algorithm).map_err(|_| {
            Error::format(format!(
                "unknown compression code {}",
                trailer.compression_algorithm
            ))
        })?;

        let index = load_block(
            &data,
            trailer.index_block_offset,
            trailer_start,
            CompressionType::None,
            true,
        )?;

        Ok(Self {
            inner: Arc::new(TableInner {
                path,
                data,
                trailer,
                compression,
                index: Arc::new(index),
                options,
            }),
        })
    }

    #[must_use]
    pub fn trailer(&self) -> &Trailer {
        &self.inner.trailer
    }

    #[must_use]
    pub fn compression(&self) -> CompressionType {
        self.inner.compression
    }

    /// Path the table was opened from, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    /// Number of records in the table.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.inner.trailer.count_entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Point lookup returning the value directly.
    pub fn get_value(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.get(key)? {
            Some(mut it) => it.next().transpose().map(|r| r.map(|(_, v)| v)),
            None => Ok(None),
        }
    }

    /// Decodes the index block: one `(separator key, block offset)` pair per
    /// data block.
    pub fn index_entries(&self) -> Result<Vec<(Vec<u8>, u64)>> {
        let mut it = self.inner.index.iter();
        let mut entries = Vec::new();
        while it.advance()? {
            entries.push((it.key().to_vec(), decode_offset(it.value())?));
        }
        Ok(entries)
    }

    /// Checks the checksum and encoding of every data block, and that the
    /// record count and key order match the trailer.
    pub fn verify(&self) -> Result<()> {
        let mut count = 0u64;
        let mut last: Option<Vec<u8>> = None;
        for (_, offset) in self.index_entries()? {
            let block = Arc::new(self.load_data_block(offset, true)?);
            let mut it = block.iter();
            while it.advance()? {
                if let Some(prev) = &last {
                    if it.key() <= prev.as_slice() {
                        return Err(Error::format(format!(
                            "keys out of order in block at offset {}",
                            offset
                        )));
                    }
                }
                last = Some(it.key().to_vec());
                count += 1;
            }
        }
        if count != self.inner.trailer.count_entries {
            return Err(Error::format(format!(
                "trailer claims {} entries, blocks hold {}",
                self.inner.trailer.count_entries, count
            )));
        }
        Ok(())
    }

    fn load_data_block(&self, offset: u64, verify: bool) -> Result<Block> {
        let inner = &self.inner;
        let end = usize::try_from(inner.trailer.index_block_offset)
            .map_err(|_| Error::format("index offset overflows usize"))?;
        load_block(&inner.data, offset, end, inner.compression, verify)
    }

    fn scan(&self, start: Option<&[u8]>, limit: Limit) -> Result<Option<Iter>> {
        Ok(TableIter::seek(self.clone(), start, limit)?.map(Iter::Table))
    }
}

impl fmt::Debug for SSTableReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SSTableReader")
            .field("path", &self.inner.path)
            .field("bytes", &self.inner.data.len())
            .field("trailer", &self.inner.trailer)
            .finish()
    }
}

impl Source for SSTableReader {
    fn iter(&self) -> Result<Option<Iter>> {
        self.scan(None, Limit::Unbounded)
    }

    fn get_prefix(&self, prefix: &[u8]) -> Result<Option<Iter>> {
        self.scan(Some(prefix), Limit::Prefix(prefix.to_vec()))
    }

    fn get_range(&self, low: &[u8], high: &[u8]) -> Result<Option<Iter>> {
        if low > high {
            return Ok(None);
        }
        self.scan(Some(low), Limit::Inclusive(high.to_vec()))
    }
}

/// Reads the block whose header starts at `offset`. The block must end at or
/// before `end`.
fn load_block(
    data: &[u8],
    offset: u64,
    end: usize,
    compression: CompressionType,
    verify: bool,
) -> Result<Block> {
    let out_of_bounds = || Error::format(format!("block at offset {} exceeds its section", offset));
    let start = usize::try_from(offset).map_err(|_| out_of_bounds())?;
    let payload_start = start.checked_add(8).filter(|&p| p <= end).ok_or_else(out_of_bounds)?;
    let len = LittleEndian::read_u32(&data[start..start + 4]) as usize;
    let stored = LittleEndian::read_u32(&data[start + 4..start + 8]);
    let payload_end = payload_start
        .checked_add(len)
        .filter(|&p| p <= end)
        .ok_or_else(out_of_bounds)?;
    let payload = &data[payload_start..payload_end];

    if verify {
        let computed = crc32c::crc32c(payload);
        if computed != stored {
            return Err(Error::Checksum {
                offset,
                stored,
                computed,
            });
        }
    }
    Block::new(compression.decompress(payload)?)
}

fn decode_offset(value: &[u8]) -> Result<u64> {
    match get_varint(value) {
        Some((offset, n)) if n == value.len() => Ok(offset),
        _ => Err(Error::format("malformed index block offset")),
    }
}

/// Ordered cursor over a range of a table.
///
/// Always holds the next record already decoded, so construction fails fast
/// when the range is empty and the first read error surfaces after the
/// records before it.
pub struct TableIter {
    table: SSTableReader,
    index: BlockIter,
    block: Option<BlockIter>,
    limit: Limit,
    next: Option<Record>,
    error: Option<Error>,
}

impl TableIter {
    /// Positions on the first record `>= start` (or the first record, if
    /// `start` is `None`). Returns `None` if no record is admitted by `limit`.
    fn seek(table: SSTableReader, start: Option<&[u8]>, limit: Limit) -> Result<Option<Self>> {
        let index = table.inner.index.iter();
        let mut it = Self {
            table,
            index,
            block: None,
            limit,
            next: None,
            error: None,
        };

        let first = match start {
            None => it.advance_raw()?,
            Some(target) => it.seek_raw(target)?,
        };
        match first {
            Some(rec) if it.limit.admits(&rec.0) => {
                it.next = Some(rec);
                Ok(Some(it))
            }
            _ => Ok(None),
        }
    }

    fn seek_raw(&mut self, target: &[u8]) -> Result<Option<Record>> {
        // Each index key is >= every key of its block, so the first index
        // key >= target names the only block that can start the range.
        if !self.index.seek(target)? {
            return Ok(None);
        }
        let mut block = self.open_current_block()?;
        let found = block.seek(target)?;
        self.block = Some(block);
        if found {
            Ok(self.block.as_ref().map(current_record))
        } else {
            // target sorts between the block's last key and its separator.
            self.advance_raw()
        }
    }

    /// Next record in table order, ignoring the limit.
    fn advance_raw(&mut self) -> Result<Option<Record>> {
        loop {
            if let Some(block) = self.block.as_mut() {
                if block.advance()? {
                    return Ok(Some(current_record(block)));
                }
                self.block = None;
            }
            if !self.index.advance()? {
                return Ok(None);
            }
            self.block = Some(self.open_current_block()?);
        }
    }

    fn open_current_block(&self) -> Result<BlockIter> {
        let offset = decode_offset(self.index.value())?;
        let verify = self.table.inner.options.verify_checksums;
        let block = self.table.load_data_block(offset, verify)?;
        Ok(Arc::new(block).iter())
    }
}

fn current_record(block: &BlockIter) -> Record {
    (block.key().to_vec(), block.value().to_vec())
}

impl Iterator for TableIter {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let Some(current) = self.next.take() else {
            return self.error.take().map(Err);
        };
        match self.advance_raw() {
            Ok(Some(rec)) if self.limit.admits(&rec.0) => self.next = Some(rec),
            Ok(_) => {}
            Err(e) => self.error = Some(e),
        }
        Some(Ok(current))
    }
}

impl fmt::Debug for TableIter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableIter")
            .field("table", &self.table.inner.path)
            .field("limit", &self.limit)
            .field("next", &self.next.as_ref().map(|(k, _)| k.escape_ascii().to_string()))
            .finish()
    }
}
