use byteorder::{LittleEndian, WriteBytesExt};
use memtable::Memtable;
use std::fs::{rename, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::block::BlockBuilder;
use crate::coding::{put_varint, shortest_separator, MAX_VARINT_LEN};
use crate::compression::CompressionType;
use crate::error::{Error, Result};
use crate::format::Trailer;
use crate::options::WriterOptions;

/// Worst-case block overhead of one record: three varint32 length fields.
const RECORD_OVERHEAD: usize = 3 * 5;

/// Size of the `[length][crc32c]` header in front of every block.
const BLOCK_HEADER_BYTES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Appending,
    /// Sealed by `finish` or `into_inner`; only `Drop` observes it.
    Closed,
    /// A write to the sink failed; the file is incomplete.
    Failed,
}

/// Builds a table by appending records in strictly increasing key order.
///
/// # File Layout
///
/// ```text
/// [data block]* [index block] [trailer (512 bytes)]
///
/// block := length (u32 LE) | crc32c (u32 LE) | payload
/// ```
///
/// Records are buffered into a data block until the block reaches the
/// configured size, then the block is compressed, checksummed and written.
/// After each data block an index record is added whose key separates that
/// block from the next one and whose value is the block's file offset
/// (varint).
///
/// [`finish`](SSTableWriter::finish) seals the table. Dropping a writer that
/// was not finished seals it as well, logging any error since `Drop` cannot
/// return one.
///
/// # Errors
///
/// - [`Error::OrderViolation`] if a key is not greater than the previous
///   one. Nothing is written and the writer stays usable.
/// - [`Error::Io`] on any write failure other than an interrupted call. The
///   writer is then poisoned and every later call returns
///   [`Error::Poisoned`]; the partial file should be discarded.
pub struct SSTableWriter<W: Write> {
    inner: Option<W>,
    state: State,
    options: WriterOptions,
    trailer: Trailer,
    data: BlockBuilder,
    index: BlockBuilder,
    /// Last key added, or the separator derived from it while an index entry
    /// is pending.
    last_key: Vec<u8>,
    /// Start offset of the most recently written block.
    last_offset: u64,
    /// Offset at which the next block will be written.
    pending_offset: u64,
    /// A data block was flushed and still needs its index record.
    pending_index_entry: bool,
}

impl SSTableWriter<File> {
    /// Creates a new table file at `path`. Fails if the file already exists.
    pub fn create<P: AsRef<Path>>(path: P, options: WriterOptions) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "creating table");
        Ok(Self::new(file, options))
    }

    /// Writes every entry of `mem` to a new table at `path`.
    ///
    /// Data goes to `path.sst.tmp` first, is fsynced, and is then atomically
    /// renamed into place, so a crash never leaves a half-written table under
    /// the final name.
    pub fn write_from_memtable(
        path: &Path,
        mem: &Memtable,
        options: WriterOptions,
    ) -> Result<Trailer> {
        Self::write_from_iterator(path, options, mem.iter())
    }

    /// Writes `(key, value)` pairs, which must be in strictly increasing key
    /// order, to a new table at `path`. Same crash-safety as
    /// [`write_from_memtable`](SSTableWriter::write_from_memtable).
    pub fn write_from_iterator<I, K, V>(
        path: &Path,
        options: WriterOptions,
        iter: I,
    ) -> Result<Trailer>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let tmp_path = path.with_extension("sst.tmp");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        let mut writer = Self::new(file, options);

        let written = iter
            .into_iter()
            .try_for_each(|(k, v)| writer.add(k.as_ref(), v.as_ref()))
            .and_then(|()| writer.into_inner());
        let (file, trailer) = match written {
            Ok(done) => done,
            Err(e) => {
                let _ = std::fs::remove_file(&tmp_path);
                return Err(e);
            }
        };
        file.sync_all()?;
        rename(&tmp_path, path)?;

        // The rename is only durable once the directory entry is synced.
        if let Some(parent) = path.parent() {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }
        Ok(trailer)
    }
}

impl<W: Write> SSTableWriter<W> {
    /// Wraps an arbitrary sink. The sink is written from offset 0; block
    /// offsets in the index assume nothing precedes the table.
    pub fn new(inner: W, options: WriterOptions) -> Self {
        let restart_interval = options.get_block_restart_interval();
        Self {
            inner: Some(inner),
            state: State::Appending,
            trailer: Trailer {
                data_block_size: options.get_block_size() as u64,
                compression_algorithm: options.get_compression().code(),
                ..Trailer::default()
            },
            options,
            data: BlockBuilder::new(restart_interval),
            index: BlockBuilder::new(restart_interval),
            last_key: Vec::with_capacity(256),
            last_offset: 0,
            pending_offset: 0,
            pending_index_entry: false,
        }
    }

    /// Appends one record. `key` must be greater than every key added so far.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.ensure_appending()?;
        if self.trailer.count_entries > 0 && key <= self.last_key.as_slice() {
            return Err(Error::OrderViolation {
                key: key.to_vec(),
                last: self.last_key.clone(),
            });
        }

        let estimate =
            self.data.current_size_estimate() + RECORD_OVERHEAD + key.len() + value.len();
        if estimate >= self.options.get_block_size() {
            self.flush()?;
        }

        if self.pending_index_entry {
            debug_assert!(self.data.is_empty());
            shortest_separator(&mut self.last_key, key);
            self.add_index_entry();
        }

        self.last_key.clear();
        self.last_key.extend_from_slice(key);

        self.trailer.count_entries += 1;
        self.trailer.bytes_keys += key.len() as u64;
        self.trailer.bytes_values += value.len() as u64;
        self.data.add(key, value);
        Ok(())
    }

    /// Appends every record produced by `iter`, stopping at the first error.
    pub fn add_all<I, K, V>(&mut self, iter: I) -> Result<()>
    where
        I: IntoIterator<Item = Result<(K, V)>>,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        for item in iter {
            let (k, v) = item?;
            self.add(k.as_ref(), v.as_ref())?;
        }
        Ok(())
    }

    /// Running statistics. Final once the table is finished.
    #[must_use]
    pub fn trailer(&self) -> &Trailer {
        &self.trailer
    }

    #[must_use]
    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    /// Seals the table and returns its trailer.
    pub fn finish(mut self) -> Result<Trailer> {
        self.finish_inner()
    }

    /// Seals the table and hands back the sink together with the trailer.
    pub fn into_inner(mut self) -> Result<(W, Trailer)> {
        let trailer = self.finish_inner()?;
        let inner = self.inner.take().ok_or(Error::Poisoned)?;
        Ok((inner, trailer))
    }

    fn ensure_appending(&self) -> Result<()> {
        if self.state == State::Failed {
            return Err(Error::Poisoned);
        }
        debug_assert_eq!(self.state, State::Appending);
        Ok(())
    }

    fn finish_inner(&mut self) -> Result<Trailer> {
        self.ensure_appending()?;
        self.flush()?;

        // The last block has no successor to build a separator against, so
        // its index key is the raw last key.
        if self.pending_index_entry {
            self.add_index_entry();
        }

        self.trailer.index_block_offset = self.pending_offset;
        let raw = self.index.finish();
        self.index.reset();
        self.trailer.bytes_index_block = self.write_block(raw, CompressionType::None)?;

        let encoded = self.trailer.encode();
        self.write_raw(&encoded)?;
        if let Some(w) = self.inner.as_mut() {
            if let Err(e) = w.flush() {
                self.state = State::Failed;
                return Err(e.into());
            }
        }
        self.state = State::Closed;

        info!(
            entries = self.trailer.count_entries,
            data_blocks = self.trailer.count_data_blocks,
            data_bytes = self.trailer.bytes_data_blocks,
            index_bytes = self.trailer.bytes_index_block,
            "finished writing table"
        );
        Ok(self.trailer)
    }

    fn flush(&mut self) -> Result<()> {
        if self.data.is_empty() {
            return Ok(());
        }
        debug_assert!(!self.pending_index_entry);
        let raw = self.data.finish();
        self.data.reset();
        let written = self.write_block(raw, self.options.get_compression())?;
        self.trailer.bytes_data_blocks += written;
        self.trailer.count_data_blocks += 1;
        self.pending_index_entry = true;
        debug!(
            offset = self.last_offset,
            bytes = written,
            block = self.trailer.count_data_blocks,
            "flushed data block"
        );
        Ok(())
    }

    fn add_index_entry(&mut self) {
        let mut enc = Vec::with_capacity(MAX_VARINT_LEN);
        put_varint(&mut enc, self.last_offset);
        self.index.add(&self.last_key, &enc);
        self.pending_index_entry = false;
    }

    /// Compresses, checksums and writes one block. Returns the bytes written,
    /// header included.
    fn write_block(&mut self, raw: Vec<u8>, compression: CompressionType) -> Result<u64> {
        let payload = match compression {
            CompressionType::None => raw,
            other => other.compress(&raw)?,
        };
        let len = u32::try_from(payload.len())
            .ok()
            .filter(|&len| len < u32::MAX)
            .ok_or_else(|| {
                Error::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("block of {} bytes exceeds the u32 length field", payload.len()),
                ))
            })?;
        let crc = crc32c::crc32c(&payload);

        let mut buf = Vec::with_capacity(BLOCK_HEADER_BYTES + payload.len());
        buf.write_u32::<LittleEndian>(len)?;
        buf.write_u32::<LittleEndian>(crc)?;
        buf.extend_from_slice(&payload);
        self.write_raw(&buf)?;

        let written = buf.len() as u64;
        self.last_offset = self.pending_offset;
        self.pending_offset += written;
        Ok(written)
    }

    fn write_raw(&mut self, buf: &[u8]) -> Result<()> {
        let Some(w) = self.inner.as_mut() else {
            return Err(Error::Poisoned);
        };
        if let Err(e) = write_fully(w, buf) {
            self.state = State::Failed;
            return Err(e.into());
        }
        Ok(())
    }
}

impl<W: Write> Drop for SSTableWriter<W> {
    fn drop(&mut self) {
        if self.state == State::Appending {
            if let Err(e) = self.finish_inner() {
                warn!(error = %e, "failed to finish table on drop");
            }
        }
    }
}

/// Writes all of `buf`, retrying interrupted calls. A zero-length write or
/// any other error is returned as is.
fn write_fully<W: Write>(w: &mut W, mut buf: &[u8]) -> io::Result<()> {
    while !buf.is_empty() {
        match w.write(buf) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "sink accepted no bytes",
                ))
            }
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
