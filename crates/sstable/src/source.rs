//! Uniform query interface over tables, memtables and mergers.
//!
//! Every source answers four queries. Each returns `Ok(None)` when there is
//! nothing to look at, or a fresh iterator yielding records in strictly
//! increasing key order. Ranges are inclusive at both ends.

use memtable::Memtable;
use std::ops::Bound;
use std::sync::Arc;

use crate::error::Result;
use crate::merge::{MergeIter, Merger};
use crate::reader::{SSTableReader, TableIter};

/// A key/value pair as yielded by every iterator in this crate.
pub type Record = (Vec<u8>, Vec<u8>);

pub trait Source {
    /// All records.
    fn iter(&self) -> Result<Option<Iter>>;

    /// Records whose key equals `key`.
    fn get(&self, key: &[u8]) -> Result<Option<Iter>> {
        self.get_range(key, key)
    }

    /// Records whose key starts with `prefix`.
    fn get_prefix(&self, prefix: &[u8]) -> Result<Option<Iter>>;

    /// Records with `low <= key <= high`.
    fn get_range(&self, low: &[u8], high: &[u8]) -> Result<Option<Iter>>;
}

/// Upper end of a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Limit {
    Unbounded,
    Inclusive(Vec<u8>),
    Prefix(Vec<u8>),
}

impl Limit {
    pub(crate) fn admits(&self, key: &[u8]) -> bool {
        match self {
            Limit::Unbounded => true,
            Limit::Inclusive(high) => key <= high.as_slice(),
            Limit::Prefix(prefix) => key.starts_with(prefix),
        }
    }
}

/// Iterator returned by every [`Source`] query.
#[derive(Debug)]
pub enum Iter {
    Table(TableIter),
    Memtable(MemtableIter),
    Merge(MergeIter),
}

impl Iterator for Iter {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Iter::Table(it) => it.next(),
            Iter::Memtable(it) => it.next(),
            Iter::Merge(it) => it.next(),
        }
    }
}

/// Any of the sources a [`Merger`] can combine.
#[derive(Debug, Clone)]
pub enum AnySource {
    Table(SSTableReader),
    Memtable(Arc<Memtable>),
    Merger(Arc<Merger>),
}

impl Source for AnySource {
    fn iter(&self) -> Result<Option<Iter>> {
        match self {
            AnySource::Table(t) => t.iter(),
            AnySource::Memtable(m) => m.iter(),
            AnySource::Merger(m) => m.iter(),
        }
    }

    fn get(&self, key: &[u8]) -> Result<Option<Iter>> {
        match self {
            AnySource::Table(t) => t.get(key),
            AnySource::Memtable(m) => m.get(key),
            AnySource::Merger(m) => m.get(key),
        }
    }

    fn get_prefix(&self, prefix: &[u8]) -> Result<Option<Iter>> {
        match self {
            AnySource::Table(t) => t.get_prefix(prefix),
            AnySource::Memtable(m) => m.get_prefix(prefix),
            AnySource::Merger(m) => m.get_prefix(prefix),
        }
    }

    fn get_range(&self, low: &[u8], high: &[u8]) -> Result<Option<Iter>> {
        match self {
            AnySource::Table(t) => t.get_range(low, high),
            AnySource::Memtable(m) => m.get_range(low, high),
            AnySource::Merger(m) => m.get_range(low, high),
        }
    }
}

impl From<SSTableReader> for AnySource {
    fn from(t: SSTableReader) -> Self {
        AnySource::Table(t)
    }
}

impl From<Arc<Memtable>> for AnySource {
    fn from(m: Arc<Memtable>) -> Self {
        AnySource::Memtable(m)
    }
}

impl From<Memtable> for AnySource {
    fn from(m: Memtable) -> Self {
        AnySource::Memtable(Arc::new(m))
    }
}

impl From<Arc<Merger>> for AnySource {
    fn from(m: Arc<Merger>) -> Self {
        AnySource::Merger(m)
    }
}

impl From<Merger> for AnySource {
    fn from(m: Merger) -> Self {
        AnySource::Merger(Arc::new(m))
    }
}

impl Source for Arc<Memtable> {
    fn iter(&self) -> Result<Option<Iter>> {
        Ok(
            MemtableIter::seek(Arc::clone(self), Bound::Unbounded, Limit::Unbounded)
                .map(Iter::Memtable),
        )
    }

    fn get_prefix(&self, prefix: &[u8]) -> Result<Option<Iter>> {
        Ok(MemtableIter::seek(
            Arc::clone(self),
            Bound::Included(prefix),
            Limit::Prefix(prefix.to_vec()),
        )
        .map(Iter::Memtable))
    }

    fn get_range(&self, low: &[u8], high: &[u8]) -> Result<Option<Iter>> {
        if low > high {
            return Ok(None);
        }
        Ok(MemtableIter::seek(
            Arc::clone(self),
            Bound::Included(low),
            Limit::Inclusive(high.to_vec()),
        )
        .map(Iter::Memtable))
    }
}

/// Cursor over a shared [`Memtable`].
///
/// Holds the next record already copied out, and re-seeks the map past it on
/// every step, so the cursor never borrows the memtable.
#[derive(Debug)]
pub struct MemtableIter {
    mem: Arc<Memtable>,
    next: Option<Record>,
    limit: Limit,
}

impl MemtableIter {
    /// Positions on the first record at or after `start`. Returns `None` if
    /// that record does not exist or is outside `limit`.
    fn seek(mem: Arc<Memtable>, start: Bound<&[u8]>, limit: Limit) -> Option<Self> {
        let first = Self::first_after(&mem, start, &limit)?;
        Some(Self {
            mem,
            next: Some(first),
            limit,
        })
    }

    fn first_after(mem: &Memtable, start: Bound<&[u8]>, limit: &Limit) -> Option<Record> {
        mem.range(start, Bound::Unbounded)
            .next()
            .filter(|(k, _)| limit.admits(k))
            .map(|(k, v)| (k.to_vec(), v.to_vec()))
    }
}

impl Iterator for MemtableIter {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        let after = Bound::Excluded(current.0.as_slice());
        self.next = Self::first_after(&self.mem, after, &self.limit);
        Some(Ok(current))
    }
}
