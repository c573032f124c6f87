//! # Heap
//!
//! An array-backed binary min-heap ordered by an injected "precedes"
//! predicate.
//!
//! Unlike [`std::collections::BinaryHeap`], the order is any boolean
//! predicate rather than `Ord`, and the root can be replaced or updated in
//! place with a single sift.
//!
//! ## Example
//!
//! ```rust
//! use heap::Heap;
//!
//! let mut h = Heap::new(|a: &u32, b: &u32| a < b);
//! h.push(3);
//! h.push(1);
//! h.push(2);
//! assert_eq!(h.replace(5), Some(1));
//! assert_eq!(h.pop(), Some(2));
//! assert_eq!(h.pop(), Some(3));
//! assert_eq!(h.pop(), Some(5));
//! assert_eq!(h.pop(), None);
//! ```

use std::fmt;
use std::ops::{Deref, DerefMut};

/// A binary min-heap whose order is defined by `less(a, b)`, read as
/// "`a` precedes `b`".
///
/// Elements that neither precede each other are interchangeable: the heap
/// makes no promise about their relative order.
pub struct Heap<T, F>
where
    F: Fn(&T, &T) -> bool,
{
    items: Vec<T>,
    less: F,
}

impl<T: Ord> Heap<T, fn(&T, &T) -> bool> {
    /// Creates a heap that pops the smallest element first according to `Ord`.
    pub fn min() -> Self {
        Heap::new(<T as PartialOrd>::lt as fn(&T, &T) -> bool)
    }
}

impl<T, F> Heap<T, F>
where
    F: Fn(&T, &T) -> bool,
{
    /// Creates an empty heap ordered by `less`.
    pub fn new(less: F) -> Self {
        Self {
            items: Vec::new(),
            less,
        }
    }

    /// Creates an empty heap with room for `capacity` elements.
    pub fn with_capacity(capacity: usize, less: F) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            less,
        }
    }

    /// Inserts `item`, sifting it toward the root.
    pub fn push(&mut self, item: T) {
        self.items.push(item);
        let last = self.items.len() - 1;
        self.sift_up(last);
    }

    /// Removes and returns the minimum element.
    pub fn pop(&mut self) -> Option<T> {
        let last = self.items.pop()?;
        if self.items.is_empty() {
            return Some(last);
        }
        let root = std::mem::replace(&mut self.items[0], last);
        self.sift_down(0);
        Some(root)
    }

    /// Returns the minimum element without removing it.
    #[must_use]
    pub fn peek(&self) -> Option<&T> {
        self.items.first()
    }

    /// Returns a guard giving mutable access to the minimum element.
    ///
    /// When the guard is dropped the root is sifted toward the leaves, so the
    /// heap invariant holds again. This is [`replace`](Heap::replace) for a
    /// root that is updated in place instead of swapped out.
    pub fn peek_mut(&mut self) -> Option<PeekMut<'_, T, F>> {
        if self.items.is_empty() {
            None
        } else {
            Some(PeekMut { heap: self })
        }
    }

    /// Overwrites the root with `item` and returns the previous minimum.
    ///
    /// Equivalent to a pop followed by a push but done in a single sift.
    /// On an empty heap nothing is inserted and `None` is returned.
    pub fn replace(&mut self, item: T) -> Option<T> {
        if self.items.is_empty() {
            return None;
        }
        let root = std::mem::replace(&mut self.items[0], item);
        self.sift_down(0);
        Some(root)
    }

    /// Returns the element stored at array position `index`.
    ///
    /// Position 0 is the minimum; other positions follow heap layout, not
    /// sorted order.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Number of elements in the heap.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drains the heap in ascending order.
    pub fn into_sorted_vec(mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.items.len());
        while let Some(item) = self.pop() {
            out.push(item);
        }
        out
    }

    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if !(self.less)(&self.items[pos], &self.items[parent]) {
                break;
            }
            self.items.swap(pos, parent);
            pos = parent;
        }
    }

    fn sift_down(&mut self, mut pos: usize) {
        let len = self.items.len();
        loop {
            let left = 2 * pos + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let child = if right < len && (self.less)(&self.items[right], &self.items[left]) {
                right
            } else {
                left
            };
            if !(self.less)(&self.items[child], &self.items[pos]) {
                break;
            }
            self.items.swap(pos, child);
            pos = child;
        }
    }
}

impl<T: fmt::Debug, F> fmt::Debug for Heap<T, F>
where
    F: Fn(&T, &T) -> bool,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap").field("items", &self.items).finish()
    }
}

/// Mutable access to the root of a [`Heap`], returned by
/// [`Heap::peek_mut`]. Restores heap order on drop.
pub struct PeekMut<'a, T, F>
where
    F: Fn(&T, &T) -> bool,
{
    heap: &'a mut Heap<T, F>,
}

impl<T, F> Deref for PeekMut<'_, T, F>
where
    F: Fn(&T, &T) -> bool,
{
    type Target = T;

    fn deref(&self) -> &T {
        &self.heap.items[0]
    }
}

impl<T, F> DerefMut for PeekMut<'_, T, F>
where
    F: Fn(&T, &T) -> bool,
{
    fn deref_mut(&mut self) -> &mut T {
        &mut self.heap.items[0]
    }
}

impl<T, F> Drop for PeekMut<'_, T, F>
where
    F: Fn(&T, &T) -> bool,
{
    fn drop(&mut self) {
        self.heap.sift_down(0);
    }
}
