//! Recency Index Module
//!
//! Orders cached keys by insertion time for least-recently-inserted eviction.

use std::collections::BTreeSet;

// == Recency Index ==
/// Tracks insertion order for eviction.
///
/// Entries are `(inserted_at, key)` pairs kept in a `BTreeSet`, so:
/// - First = oldest insertion
/// - Last = newest insertion
/// - Equal timestamps are ordered by key
///
/// The set holds its own copy of each key rather than a reference into the
/// primary index.
#[derive(Debug)]
pub struct RecencyIndex<T, K> {
    /// Insertion order of keys
    order: BTreeSet<(T, K)>,
}

impl<T: Ord, K: Ord> Default for RecencyIndex<T, K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord, K: Ord> RecencyIndex<T, K> {
    // == Constructor ==
    /// Creates a new empty recency index.
    pub fn new() -> Self {
        Self {
            order: BTreeSet::new(),
        }
    }

    // == Insert ==
    /// Records `key` as inserted at `inserted_at`.
    ///
    /// Returns false if the exact pair was already present.
    pub fn insert(&mut self, inserted_at: T, key: K) -> bool {
        self.order.insert((inserted_at, key))
    }

    // == Remove ==
    /// Removes the pair for `key` inserted at `inserted_at`.
    ///
    /// Returns false if no such pair was tracked.
    pub fn remove(&mut self, inserted_at: T, key: K) -> bool {
        self.order.remove(&(inserted_at, key))
    }

    // == Evict Oldest ==
    /// Returns and removes the oldest pair.
    ///
    /// Returns None if the index is empty.
    pub fn evict_oldest(&mut self) -> Option<(T, K)> {
        self.order.pop_first()
    }

    // == Peek Oldest ==
    /// Returns the oldest pair without removing it.
    pub fn peek_oldest(&self) -> Option<&(T, K)> {
        self.order.first()
    }

    // == Length ==
    pub fn len(&self) -> usize {
        self.order.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    // == Contains ==
    /// Checks if `key` is tracked with exactly this timestamp.
    pub fn contains(&self, inserted_at: T, key: K) -> bool {
        self.order.contains(&(inserted_at, key))
    }

    // == Iter ==
    /// Iterates pairs from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &(T, K)> {
        self.order.iter()
    }
}
