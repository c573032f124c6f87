//! Block encoding with restart-point prefix compression.
//!
//! ```text
//! entry    := shared (varint) | non_shared (varint) | value_len (varint)
//!             key[shared..] | value
//! block    := entry* | restart (u32 LE)* | num_restarts (u32 LE)
//! ```
//!
//! Each entry stores only the suffix of its key that differs from the
//! previous key. Every `restart_interval` entries the full key is stored
//! (`shared == 0`) and the entry's offset is recorded as a restart point, so
//! a reader can binary search the restart points and scan forward from there.

use byteorder::{ByteOrder, LittleEndian};
use std::ops::Range;
use std::sync::Arc;

use crate::coding::{get_varint, put_varint, shared_prefix_len};
use crate::error::{Error, Result};

/// Accumulates sorted records into one block payload.
#[derive(Debug)]
pub struct BlockBuilder {
    buffer: Vec<u8>,
    restarts: Vec<u32>,
    restart_interval: usize,
    /// Entries emitted since the last restart point.
    counter: usize,
    last_key: Vec<u8>,
}

impl BlockBuilder {
    pub fn new(restart_interval: usize) -> Self {
        Self {
            buffer: Vec::new(),
            restarts: vec![0],
            restart_interval,
            counter: 0,
            last_key: Vec::new(),
        }
    }

    /// Appends a record. Keys must arrive in strictly increasing order.
    pub fn add(&mut self, key: &[u8], value: &[u8]) {
        debug_assert!(self.is_empty() || key > self.last_key.as_slice());

        let shared = if self.counter < self.restart_interval {
            shared_prefix_len(&self.last_key, key)
        } else {
            self.restarts.push(self.buffer.len() as u32);
            self.counter = 0;
            0
        };
        let non_shared = key.len() - shared;

        put_varint(&mut self.buffer, shared as u64);
        put_varint(&mut self.buffer, non_shared as u64);
        put_varint(&mut self.buffer, value.len() as u64);
        self.buffer.extend_from_slice(&key[shared..]);
        self.buffer.extend_from_slice(value);

        self.last_key.truncate(shared);
        self.last_key.extend_from_slice(&key[shared..]);
        self.counter += 1;
    }

    /// Size of the payload [`finish`](BlockBuilder::finish) would return now.
    #[must_use]
    pub fn current_size_estimate(&self) -> usize {
        self.buffer.len() + self.restarts.len() * 4 + 4
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Appends the restart array and hands out the finished payload.
    /// Call [`reset`](BlockBuilder::reset) before adding more records.
    pub fn finish(&mut self) -> Vec<u8> {
        let mut out = std::mem::take(&mut self.buffer);
        out.reserve(self.restarts.len() * 4 + 4);
        for &r in &self.restarts {
            out.extend_from_slice(&r.to_le_bytes());
        }
        out.extend_from_slice(&(self.restarts.len() as u32).to_le_bytes());
        out
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.restarts.clear();
        self.restarts.push(0);
        self.counter = 0;
        self.last_key.clear();
    }
}

/// A decoded (decompressed) block payload.
#[derive(Debug)]
pub struct Block {
    data: Vec<u8>,
    /// Start of the restart array; entries occupy `data[..restarts_offset]`.
    restarts_offset: usize,
    num_restarts: usize,
}

impl Block {
    pub fn new(data: Vec<u8>) -> Result<Self> {
        if data.len() < 4 {
            return Err(Error::format("block too short"));
        }
        let num_restarts = LittleEndian::read_u32(&data[data.len() - 4..]) as usize;
        let max_restarts = (data.len() - 4) / 4;
        if num_restarts == 0 || num_restarts > max_restarts {
            return Err(Error::format(format!(
                "block claims {} restart points",
                num_restarts
            )));
        }
        let restarts_offset = data.len() - 4 - num_restarts * 4;
        Ok(Self {
            data,
            restarts_offset,
            num_restarts,
        })
    }

    /// Returns an iterator positioned before the first entry.
    pub fn iter(self: &Arc<Self>) -> BlockIter {
        BlockIter {
            block: Arc::clone(self),
            next_offset: 0,
            key: Vec::new(),
            value: 0..0,
        }
    }

    fn restart_point(&self, i: usize) -> usize {
        let at = self.restarts_offset + i * 4;
        LittleEndian::read_u32(&self.data[at..at + 4]) as usize
    }

    /// Decodes the entry header at `offset`.
    ///
    /// Returns `(shared, non_shared, value_len, header_len)`.
    fn entry_header(&self, offset: usize) -> Result<(usize, usize, usize, usize)> {
        let limit = self.restarts_offset;
        let corrupt = || Error::format(format!("malformed block entry at offset {}", offset));
        let mut p = offset;
        let mut next = || -> Result<usize> {
            let (v, n) = get_varint(&self.data[p..limit]).ok_or_else(corrupt)?;
            p += n;
            usize::try_from(v).map_err(|_| corrupt())
        };
        let shared = next()?;
        let non_shared = next()?;
        let value_len = next()?;
        let header_len = p - offset;
        let end = offset
            .checked_add(header_len)
            .and_then(|x| x.checked_add(non_shared))
            .and_then(|x| x.checked_add(value_len));
        match end {
            Some(end) if end <= limit => Ok((shared, non_shared, value_len, header_len)),
            _ => Err(corrupt()),
        }
    }

    /// Full key of the entry at restart point `i`.
    fn restart_key(&self, i: usize) -> Result<&[u8]> {
        let offset = self.restart_point(i);
        if offset >= self.restarts_offset {
            return Err(Error::format("restart point past end of entries"));
        }
        let (shared, non_shared, _, header_len) = self.entry_header(offset)?;
        if shared != 0 {
            return Err(Error::format("restart entry shares a key prefix"));
        }
        let start = offset + header_len;
        Ok(&self.data[start..start + non_shared])
    }
}

/// Cursor over the entries of a [`Block`]. Owns a handle to the block, so it
/// can outlive the reader that produced it.
#[derive(Debug)]
pub struct BlockIter {
    block: Arc<Block>,
    /// Offset of the next entry to decode.
    next_offset: usize,
    key: Vec<u8>,
    value: Range<usize>,
}

impl BlockIter {
    /// Decodes the next entry. Returns `false` once the block is exhausted.
    pub fn advance(&mut self) -> Result<bool> {
        let block = &self.block;
        if self.next_offset >= block.restarts_offset {
            return Ok(false);
        }
        let offset = self.next_offset;
        let (shared, non_shared, value_len, header_len) = block.entry_header(offset)?;
        if shared > self.key.len() {
            return Err(Error::format(format!(
                "entry at offset {} shares {} bytes of a {}-byte key",
                offset,
                shared,
                self.key.len()
            )));
        }
        let key_start = offset + header_len;
        let value_start = key_start + non_shared;
        self.key.truncate(shared);
        self.key
            .extend_from_slice(&block.data[key_start..value_start]);
        self.value = value_start..value_start + value_len;
        self.next_offset = self.value.end;
        Ok(true)
    }

    /// Positions on the first entry whose key is `>= target`.
    /// Returns `false` if every key in the block is smaller.
    pub fn seek(&mut self, target: &[u8]) -> Result<bool> {
        if self.block.restarts_offset == 0 {
            return Ok(false);
        }
        // Last restart point whose key is < target.
        let (mut left, mut right) = (0, self.block.num_restarts - 1);
        while left < right {
            let mid = (left + right + 1) / 2;
            if self.block.restart_key(mid)? < target {
                left = mid;
            } else {
                right = mid - 1;
            }
        }
        self.next_offset = self.block.restart_point(left);
        self.key.clear();
        while self.advance()? {
            if self.key.as_slice() >= target {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Key of the current entry.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Value of the current entry.
    #[must_use]
    pub fn value(&self) -> &[u8] {
        &self.block.data[self.value.clone()]
    }
}

impl Iterator for BlockIter {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(true) => Some(Ok((self.key.clone(), self.value().to_vec()))),
            Ok(false) => None,
            Err(e) => {
                // Stop after the first decode error.
                self.next_offset = self.block.restarts_offset;
                Some(Err(e))
            }
        }
    }
}
