//! Table trailer: the fixed-size footer at the end of every table file.
//!
//! ```text
//! offset  field
//!      0  index_block_offset    u64 LE
//!      8  data_block_size       u64 LE
//!     16  compression_algorithm u64 LE
//!     24  count_entries         u64 LE
//!     32  count_data_blocks     u64 LE
//!     40  bytes_data_blocks     u64 LE
//!     48  bytes_index_block     u64 LE
//!     56  bytes_keys            u64 LE
//!     64  bytes_values          u64 LE
//!     72  zero padding
//!    508  magic                 u32 LE
//! ```
//!
//! The reader checks the magic (last 4 bytes) before touching any other
//! field, so a foreign or truncated file is rejected without producing a
//! partially decoded trailer.

use byteorder::{ByteOrder, LittleEndian};
use std::io::{Read, Seek, SeekFrom};

use crate::error::{Error, Result};

/// Size of the encoded trailer in bytes.
pub const TRAILER_SIZE: usize = 512;

/// Magic number stored in the last four bytes of every table.
pub const TABLE_MAGIC: u32 = 0x7784_6676;

/// Number of `u64` fields before the padding.
const TRAILER_FIELDS: usize = 9;

/// Layout and statistics metadata for one table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Trailer {
    /// Byte offset of the index block.
    pub index_block_offset: u64,
    /// Target data block size the table was written with.
    pub data_block_size: u64,
    /// Compression code of the data blocks, see [`crate::CompressionType`].
    pub compression_algorithm: u64,
    pub count_entries: u64,
    pub count_data_blocks: u64,
    /// On-disk bytes of all data blocks, block headers included.
    pub bytes_data_blocks: u64,
    /// On-disk bytes of the index block, block header included.
    pub bytes_index_block: u64,
    /// Sum of the lengths of all keys added.
    pub bytes_keys: u64,
    /// Sum of the lengths of all values added.
    pub bytes_values: u64,
}

impl Trailer {
    /// Encodes the trailer into exactly [`TRAILER_SIZE`] bytes.
    #[must_use]
    pub fn encode(&self) -> [u8; TRAILER_SIZE] {
        let mut buf = [0u8; TRAILER_SIZE];
        let fields: [u64; TRAILER_FIELDS] = [
            self.index_block_offset,
            self.data_block_size,
            self.compression_algorithm,
            self.count_entries,
            self.count_data_blocks,
            self.bytes_data_blocks,
            self.bytes_index_block,
            self.bytes_keys,
            self.bytes_values,
        ];
        for (i, field) in fields.into_iter().enumerate() {
            LittleEndian::write_u64(&mut buf[i * 8..i * 8 + 8], field);
        }
        LittleEndian::write_u32(&mut buf[TRAILER_SIZE - 4..], TABLE_MAGIC);
        buf
    }

    /// Decodes a trailer, failing with [`Error::Format`] if `buf` has the
    /// wrong length or does not end with [`TABLE_MAGIC`].
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() != TRAILER_SIZE {
            return Err(Error::format(format!(
                "trailer must be {} bytes, got {}",
                TRAILER_SIZE,
                buf.len()
            )));
        }
        let magic = LittleEndian::read_u32(&buf[TRAILER_SIZE - 4..]);
        if magic != TABLE_MAGIC {
            return Err(Error::format(format!("unknown table magic: {:#010x}", magic)));
        }

        let field = |i: usize| LittleEndian::read_u64(&buf[i * 8..i * 8 + 8]);
        Ok(Self {
            index_block_offset: field(0),
            data_block_size: field(1),
            compression_algorithm: field(2),
            count_entries: field(3),
            count_data_blocks: field(4),
            bytes_data_blocks: field(5),
            bytes_index_block: field(6),
            bytes_keys: field(7),
            bytes_values: field(8),
        })
    }

    /// Reads and decodes the trailer from the last [`TRAILER_SIZE`] bytes of
    /// `r`. The cursor is left at the end of the input.
    pub fn read_from<R: Read + Seek>(r: &mut R) -> Result<Self> {
        let filesize = r.seek(SeekFrom::End(0))?;
        if filesize < TRAILER_SIZE as u64 {
            return Err(Error::format("file too small for table trailer"));
        }
        r.seek(SeekFrom::End(-(TRAILER_SIZE as i64)))?;
        let mut buf = [0u8; TRAILER_SIZE];
        r.read_exact(&mut buf)?;
        Self::decode(&buf)
    }
}
