//! K-way merge over any number of [`Source`]s.
//!
//! Produces records in ascending key order. When the same key appears in
//! more than one source, the values are folded left to right with the
//! merger's merge function, so it should be associative. The order in which
//! colliding values are folded is unspecified.
//!
//! A [`Merger`] is itself a [`Source`], so merges nest: a merger can combine
//! tables, memtables and other mergers.

use heap::Heap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::source::{AnySource, Iter, Record, Source};

/// Combines two values stored under `key` into one. Returning `None` aborts
/// the merge with [`Error::MergeCallback`].
pub type MergeFn = Arc<dyn Fn(&[u8], &[u8], &[u8]) -> Option<Vec<u8>> + Send + Sync>;

/// A set of sources plus the function that resolves key collisions.
#[derive(Clone)]
pub struct Merger {
    sources: Vec<AnySource>,
    merge: MergeFn,
}

impl Merger {
    pub fn new<F>(merge: F) -> Self
    where
        F: Fn(&[u8], &[u8], &[u8]) -> Option<Vec<u8>> + Send + Sync + 'static,
    {
        Self {
            sources: Vec::new(),
            merge: Arc::new(merge),
        }
    }

    pub fn add_source(&mut self, source: impl Into<AnySource>) {
        self.sources.push(source.into());
    }

    #[must_use]
    pub fn sources(&self) -> &[AnySource] {
        &self.sources
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Runs `query` against every source and merges the results.
    fn query<F>(&self, query: F) -> Result<Option<Iter>>
    where
        F: Fn(&AnySource) -> Result<Option<Iter>>,
    {
        let mut iters = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            if let Some(it) = query(source)? {
                iters.push(it);
            }
        }
        if iters.is_empty() {
            return Ok(None);
        }
        debug!(
            sources = self.sources.len(),
            iterators = iters.len(),
            "seeding merge"
        );
        let it = MergeIter::new(iters, Arc::clone(&self.merge))?;
        Ok(Some(Iter::Merge(it)))
    }
}

impl Source for Merger {
    fn iter(&self) -> Result<Option<Iter>> {
        self.query(|s| s.iter())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Iter>> {
        self.query(|s| s.get(key))
    }

    fn get_prefix(&self, prefix: &[u8]) -> Result<Option<Iter>> {
        self.query(|s| s.get_prefix(prefix))
    }

    fn get_range(&self, low: &[u8], high: &[u8]) -> Result<Option<Iter>> {
        self.query(|s| s.get_range(low, high))
    }
}

impl fmt::Debug for Merger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Merger")
            .field("sources", &self.sources)
            .finish_non_exhaustive()
    }
}

/// One input of a merge: a sub-iterator and its current record.
///
/// Once the sub-iterator runs dry it is dropped and the entry becomes an
/// exhausted sentinel.
#[derive(Debug)]
struct Entry {
    it: Option<Iter>,
    key: Vec<u8>,
    value: Vec<u8>,
}

impl Entry {
    /// Wraps `it` and pulls its first record.
    fn new(it: Iter) -> Result<Self> {
        let mut entry = Entry {
            it: Some(it),
            key: Vec::new(),
            value: Vec::new(),
        };
        entry.advance()?;
        Ok(entry)
    }

    /// Replaces the current record with the next one from the sub-iterator.
    fn advance(&mut self) -> Result<()> {
        match self.it.as_mut().and_then(Iterator::next) {
            Some(Ok((key, value))) => {
                self.key = key;
                self.value = value;
                Ok(())
            }
            Some(Err(e)) => {
                self.it = None;
                Err(e)
            }
            None => {
                self.it = None;
                Ok(())
            }
        }
    }

    fn is_exhausted(&self) -> bool {
        self.it.is_none()
    }
}

/// Heap order: exhausted sentinels first, then live entries by key.
fn entry_precedes(a: &Entry, b: &Entry) -> bool {
    match (a.is_exhausted(), b.is_exhausted()) {
        (true, exhausted) => !exhausted,
        (false, true) => false,
        (false, false) => a.key < b.key,
    }
}

type EntryHeap = Heap<Entry, fn(&Entry, &Entry) -> bool>;

/// Iterator over a merge. Owns every sub-iterator through its heap.
///
/// After the first error the iterator is finished.
pub struct MergeIter {
    heap: EntryHeap,
    merge: MergeFn,
    finished: bool,
}

impl MergeIter {
    fn new(iters: Vec<Iter>, merge: MergeFn) -> Result<Self> {
        let less: fn(&Entry, &Entry) -> bool = entry_precedes;
        let mut heap: EntryHeap = Heap::with_capacity(iters.len(), less);
        for it in iters {
            heap.push(Entry::new(it)?);
        }
        Ok(Self {
            heap,
            merge,
            finished: false,
        })
    }

    fn pop_exhausted(&mut self) {
        while self.heap.peek().is_some_and(Entry::is_exhausted) {
            self.heap.pop();
        }
    }

    fn advance(&mut self) -> Result<Option<Record>> {
        self.pop_exhausted();
        let (key, mut value) = {
            let Some(mut top) = self.heap.peek_mut() else {
                return Ok(None);
            };
            let key = std::mem::take(&mut top.key);
            let value = std::mem::take(&mut top.value);
            top.advance()?;
            (key, value)
        };

        loop {
            self.pop_exhausted();
            let Some(mut top) = self.heap.peek_mut() else {
                break;
            };
            if top.key != key {
                break;
            }
            value = (self.merge)(&key, &value, &top.value)
                .ok_or_else(|| Error::MergeCallback { key: key.clone() })?;
            top.advance()?;
        }
        Ok(Some((key, value)))
    }
}

impl Iterator for MergeIter {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.advance() {
            Ok(Some(rec)) => Some(Ok(rec)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

impl fmt::Debug for MergeIter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergeIter")
            .field("inputs", &self.heap.len())
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
