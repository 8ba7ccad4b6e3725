//! Dual Index Module
//!
//! Keeps the primary (key → entry) index and the recency index in lockstep.
//! Every method here expects to run under the cache's lock.

use std::collections::{BTreeMap, HashMap, TryReserveError};
use std::hash::{BuildHasher, Hash};

use tracing::error;

use crate::cache::entry::is_stale;
use crate::cache::{CacheEntry, CacheStats, RecencyIndex, Timestamp};

// == Primary Index ==
/// Key → entry storage backing a cache.
///
/// Implemented for `HashMap` and `BTreeMap`; the choice only affects lookup
/// cost and the bounds required on the key.
pub trait PrimaryIndex: Default {
    /// Key tuple type
    type Key: Ord + Clone;
    /// Timestamp type stored with every entry
    type Stamp: Timestamp;
    /// Cached value type
    type Value: Clone;

    fn lookup(&self, key: &Self::Key) -> Option<&CacheEntry<Self::Stamp, Self::Value>>;

    fn contains_key(&self, key: &Self::Key) -> bool {
        self.lookup(key).is_some()
    }

    fn insert_entry(
        &mut self,
        key: Self::Key,
        entry: CacheEntry<Self::Stamp, Self::Value>,
    ) -> Option<CacheEntry<Self::Stamp, Self::Value>>;

    fn remove_entry(&mut self, key: &Self::Key) -> Option<CacheEntry<Self::Stamp, Self::Value>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Makes sure one more entry can be inserted without allocating.
    fn try_reserve_one(&mut self) -> Result<(), TryReserveError>;

    fn entries(
        &self,
    ) -> Box<dyn Iterator<Item = (&Self::Key, &CacheEntry<Self::Stamp, Self::Value>)> + '_>;
}

impl<K, T, V, S> PrimaryIndex for HashMap<K, CacheEntry<T, V>, S>
where
    K: Hash + Ord + Clone,
    T: Timestamp,
    V: Clone,
    S: BuildHasher + Default,
{
    type Key = K;
    type Stamp = T;
    type Value = V;

    fn lookup(&self, key: &K) -> Option<&CacheEntry<T, V>> {
        self.get(key)
    }

    fn insert_entry(&mut self, key: K, entry: CacheEntry<T, V>) -> Option<CacheEntry<T, V>> {
        self.insert(key, entry)
    }

    fn remove_entry(&mut self, key: &K) -> Option<CacheEntry<T, V>> {
        self.remove(key)
    }

    fn len(&self) -> usize {
        HashMap::len(self)
    }

    fn try_reserve_one(&mut self) -> Result<(), TryReserveError> {
        self.try_reserve(1)
    }

    fn entries(&self) -> Box<dyn Iterator<Item = (&K, &CacheEntry<T, V>)> + '_> {
        Box::new(self.iter())
    }
}

impl<K, T, V> PrimaryIndex for BTreeMap<K, CacheEntry<T, V>>
where
    K: Ord + Clone,
    T: Timestamp,
    V: Clone,
{
    type Key = K;
    type Stamp = T;
    type Value = V;

    fn lookup(&self, key: &K) -> Option<&CacheEntry<T, V>> {
        self.get(key)
    }

    fn insert_entry(&mut self, key: K, entry: CacheEntry<T, V>) -> Option<CacheEntry<T, V>> {
        self.insert(key, entry)
    }

    fn remove_entry(&mut self, key: &K) -> Option<CacheEntry<T, V>> {
        self.remove(key)
    }

    fn len(&self) -> usize {
        BTreeMap::len(self)
    }

    // Tree nodes are allocated on insert; there is nothing to reserve up front.
    fn try_reserve_one(&mut self) -> Result<(), TryReserveError> {
        Ok(())
    }

    fn entries(&self) -> Box<dyn Iterator<Item = (&K, &CacheEntry<T, V>)> + '_> {
        Box::new(self.iter())
    }
}

// == Insert Outcome ==
/// Result of trying to index a freshly obtained value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The value is now cached
    Inserted,
    /// Another caller cached a value for the key first; indexes untouched
    LostRace,
}

// == Indexes ==
/// The primary and recency indexes plus the counters guarded with them.
pub struct Indexes<P: PrimaryIndex> {
    primary: P,
    recency: RecencyIndex<P::Stamp, P::Key>,
    stats: CacheStats,
}

impl<P: PrimaryIndex> Default for Indexes<P> {
    fn default() -> Self {
        Self {
            primary: P::default(),
            recency: RecencyIndex::new(),
            stats: CacheStats::new(),
        }
    }
}

impl<P: PrimaryIndex> std::fmt::Debug for Indexes<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Indexes")
            .field("entries", &self.primary.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

pub(crate) type Age<P> = <<P as PrimaryIndex>::Stamp as Timestamp>::Age;

impl<P: PrimaryIndex> Indexes<P> {
    // == Lookup ==
    /// Returns the cached value for `key` if it is fresh at `now`.
    ///
    /// A stale entry is dropped from both indexes before returning None.
    pub fn lookup_fresh(
        &mut self,
        key: &P::Key,
        max_age: Age<P>,
        now: P::Stamp,
    ) -> Option<P::Value> {
        let stale = match self.primary.lookup(key) {
            Some(entry) if !entry.is_stale(max_age, now) => {
                self.stats.record_hit();
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if stale {
            self.remove(key);
            self.stats.record_expiration();
        }
        self.stats.record_miss();
        None
    }

    // == Insert ==
    /// Indexes `value` for `key` at `now` unless the key is already cached.
    ///
    /// On error, or if a panic unwinds out of the key's `Ord`/`Hash`, both
    /// indexes are left as they were before the call.
    pub fn insert(
        &mut self,
        key: P::Key,
        now: P::Stamp,
        value: P::Value,
    ) -> Result<InsertOutcome, TryReserveError> {
        if self.primary.contains_key(&key) {
            self.stats.record_race();
            return Ok(InsertOutcome::LostRace);
        }

        self.primary.try_reserve_one()?;

        let pending = PendingRecency::insert(&mut self.recency, now, key.clone());
        self.primary.insert_entry(key, CacheEntry::new(now, value));
        pending.commit();

        self.stats.set_total_entries(self.primary.len());
        Ok(InsertOutcome::Inserted)
    }

    // == Remove ==
    /// Removes `key` from both indexes, returning its entry if it was cached.
    ///
    /// The recency entry is checked first, so a mismatch panics before
    /// either index is modified.
    pub fn remove(&mut self, key: &P::Key) -> Option<CacheEntry<P::Stamp, P::Value>> {
        let inserted_at = self.primary.lookup(key)?.inserted_at;
        if !self.recency.remove(inserted_at, key.clone()) {
            invariant_violation("primary entry had no matching recency entry");
        }
        let entry = self.primary.remove_entry(key)?;
        self.stats.set_total_entries(self.primary.len());
        Some(entry)
    }

    // == Erase ==
    /// Unconditional removal on behalf of a caller. Returns whether `key` was cached.
    pub fn erase(&mut self, key: &P::Key) -> bool {
        let removed = self.remove(key).is_some();
        if removed {
            self.stats.record_erasure();
        }
        removed
    }

    // == Evict ==
    /// Removes up to `budget` entries, oldest first, while the oldest one
    /// is stale or the cache holds more than `max_elements` entries.
    ///
    /// Returns the number of entries removed.
    pub fn evict(
        &mut self,
        now: P::Stamp,
        max_age: Age<P>,
        max_elements: u64,
        budget: u64,
    ) -> usize {
        let mut removed = 0;

        for _ in 0..budget {
            let Some((inserted_at, oldest_key)) = self.recency.peek_oldest() else {
                break;
            };

            let stale = is_stale(*inserted_at, max_age, now);
            let over_capacity = self.recency.len() as u64 > max_elements;
            if !stale && !over_capacity {
                break;
            }

            // Checked before either index changes
            if !self.primary.contains_key(oldest_key) {
                invariant_violation("recency entry had no matching primary entry");
            }
            if let Some((_, key)) = self.recency.evict_oldest() {
                self.primary.remove_entry(&key);
            }

            if stale {
                self.stats.record_expiration();
            } else {
                self.stats.record_eviction();
            }
            removed += 1;
        }

        self.stats.set_total_entries(self.primary.len());
        removed
    }

    // == Length ==
    pub fn len(&self) -> usize {
        self.primary.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }

    // == Stats ==
    /// Returns a snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.primary.len());
        stats
    }

    // == Consistency Check ==
    /// Panics unless both indexes describe exactly the same entries.
    pub fn assert_consistent(&self) {
        assert_eq!(
            self.primary.len(),
            self.recency.len(),
            "index sizes differ"
        );
        for (key, entry) in self.primary.entries() {
            assert!(
                self.recency.contains(entry.inserted_at, key.clone()),
                "primary entry {:?} missing from recency index",
                entry.inserted_at
            );
        }
        for (inserted_at, key) in self.recency.iter() {
            let Some(entry) = self.primary.lookup(key) else {
                panic!("recency entry {:?} missing from primary index", inserted_at);
            };
            assert_eq!(entry.inserted_at, *inserted_at, "timestamps differ");
        }
    }
}

// == Pending Recency Insert ==
/// A recency entry that is removed again unless the matching primary insert
/// completes.
struct PendingRecency<'a, T: Timestamp, K: Ord + Clone> {
    recency: &'a mut RecencyIndex<T, K>,
    inserted_at: T,
    key: K,
    committed: bool,
}

impl<'a, T: Timestamp, K: Ord + Clone> PendingRecency<'a, T, K> {
    fn insert(recency: &'a mut RecencyIndex<T, K>, inserted_at: T, key: K) -> Self {
        if !recency.insert(inserted_at, key.clone()) {
            invariant_violation("recency entry already present for an uncached key");
        }
        Self {
            recency,
            inserted_at,
            key,
            committed: false,
        }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl<T: Timestamp, K: Ord + Clone> Drop for PendingRecency<'_, T, K> {
    fn drop(&mut self) {
        if !self.committed {
            self.recency.remove(self.inserted_at, self.key.clone());
        }
    }
}

// == Invariant Violation ==
/// The two indexes disagree. Continuing could hide corruption, so bail out.
#[cold]
#[track_caller]
fn invariant_violation(what: &str) -> ! {
    error!("cache index invariant violated: {}", what);
    panic!("cache index invariant violated: {what}");
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};

    type HashIndexes = Indexes<HashMap<&'static str, CacheEntry<u64, u32>>>;
    type TreeIndexes = Indexes<BTreeMap<&'static str, CacheEntry<u64, u32>>>;

    #[test]
    fn test_insert_and_lookup() {
        let mut indexes = HashIndexes::default();

        assert_eq!(indexes.insert("a", 0, 1).unwrap(), InsertOutcome::Inserted);
        assert_eq!(indexes.lookup_fresh(&"a", 10, 5), Some(1));
        assert_eq!(indexes.len(), 1);
        indexes.assert_consistent();
    }

    #[test]
    fn test_lookup_stale_removes_entry() {
        let mut indexes = HashIndexes::default();

        indexes.insert("a", 0, 1).unwrap();
        assert_eq!(indexes.lookup_fresh(&"a", 10, 11), None);
        assert!(indexes.is_empty());
        indexes.assert_consistent();

        let stats = indexes.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.expirations, 1);
    }

    #[test]
    fn test_insert_existing_key_loses_race() {
        let mut indexes = TreeIndexes::default();

        indexes.insert("a", 0, 1).unwrap();
        assert_eq!(indexes.insert("a", 3, 2).unwrap(), InsertOutcome::LostRace);

        // The first value stays cached with its original timestamp
        assert_eq!(indexes.lookup_fresh(&"a", 10, 4), Some(1));
        assert_eq!(indexes.stats().races, 1);
        indexes.assert_consistent();
    }

    #[test]
    fn test_remove_missing_key() {
        let mut indexes = HashIndexes::default();

        assert!(indexes.remove(&"nope").is_none());
        assert!(!indexes.erase(&"nope"));
        assert_eq!(indexes.stats().erasures, 0);
    }

    #[test]
    fn test_evict_stale_then_stop() {
        let mut indexes = TreeIndexes::default();

        indexes.insert("a", 0, 1).unwrap();
        indexes.insert("b", 5, 2).unwrap();
        indexes.insert("c", 20, 3).unwrap();

        // At t=16 only "a" and "b" are stale; "c" stops the pass
        assert_eq!(indexes.evict(16, 10, 100, 10), 2);
        assert_eq!(indexes.len(), 1);
        assert_eq!(indexes.stats().expirations, 2);
        indexes.assert_consistent();
    }

    #[test]
    fn test_evict_over_capacity() {
        let mut indexes = HashIndexes::default();

        for (i, key) in ["a", "b", "c", "d"].into_iter().enumerate() {
            indexes.insert(key, i as u64, i as u32).unwrap();
        }

        assert_eq!(indexes.evict(4, 100, 2, 10), 2);
        assert_eq!(indexes.lookup_fresh(&"a", 100, 4), None);
        assert_eq!(indexes.lookup_fresh(&"c", 100, 4), Some(2));
        assert_eq!(indexes.stats().evictions, 2);
        indexes.assert_consistent();
    }

    #[test]
    fn test_evict_respects_budget() {
        let mut indexes = HashIndexes::default();

        for (i, key) in ["a", "b", "c", "d", "e"].into_iter().enumerate() {
            indexes.insert(key, i as u64, 0).unwrap();
        }

        assert_eq!(indexes.evict(100, 1, 0, 3), 3);
        assert_eq!(indexes.len(), 2);
        assert_eq!(indexes.evict(100, 1, 0, 0), 0);
        assert_eq!(indexes.len(), 2);
    }

    #[test]
    fn test_evict_empty() {
        let mut indexes = HashIndexes::default();
        assert_eq!(indexes.evict(0, 0, 0, 3), 0);
    }

    static TRIPPING_HASHES: AtomicUsize = AtomicUsize::new(0);

    /// Panics the second time key 13 is hashed.
    #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
    struct TrippingKey(u32);

    impl Hash for TrippingKey {
        fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
            if self.0 == 13 && TRIPPING_HASHES.fetch_add(1, Ordering::SeqCst) == 1 {
                panic!("hash failure");
            }
            self.0.hash(state);
        }
    }

    #[test]
    fn test_insert_rolls_back_on_unwind() {
        let mut indexes: Indexes<HashMap<TrippingKey, CacheEntry<u64, u32>>> = Indexes::default();
        indexes.insert(TrippingKey(1), 0, 1).unwrap();

        // First hash is the presence check, second is the primary insert,
        // which runs after the recency entry was added.
        let result = catch_unwind(AssertUnwindSafe(|| indexes.insert(TrippingKey(13), 1, 2)));
        assert!(result.is_err());

        assert_eq!(indexes.len(), 1);
        assert_eq!(indexes.recency.len(), 1);
        indexes.assert_consistent();
    }
    #[test]
    #[should_panic(expected = "cache index invariant violated")]
    fn test_remove_without_recency_entry_panics() {
        let mut indexes = HashIndexes::default();
        indexes.insert("a", 0, 1).unwrap();
        indexes.recency.remove(0, "a");

        indexes.remove(&"a");
    }

    #[test]
    fn test_remove_mismatch_leaves_primary_untouched() {
        let mut indexes = HashIndexes::default();
        indexes.insert("a", 0, 1).unwrap();
        indexes.recency.remove(0, "a");

        let result = catch_unwind(AssertUnwindSafe(|| indexes.remove(&"a")));
        assert!(result.is_err());
        assert!(indexes.primary.contains_key(&"a"));
    }

    #[test]
    #[should_panic(expected = "cache index invariant violated")]
    fn test_evict_without_primary_entry_panics() {
        let mut indexes = TreeIndexes::default();
        indexes.insert("a", 0, 1).unwrap();
        indexes.primary.remove_entry(&"a");

        indexes.evict(100, 10, 0, 3);
    }

    #[test]
    fn test_evict_mismatch_leaves_recency_untouched() {
        let mut indexes = TreeIndexes::default();
        indexes.insert("a", 0, 1).unwrap();
        indexes.primary.remove_entry(&"a");

        let result = catch_unwind(AssertUnwindSafe(|| indexes.evict(100, 10, 0, 3)));
        assert!(result.is_err());
        assert!(indexes.recency.contains(0, "a"));
    }

    #[test]
    #[should_panic(expected = "cache index invariant violated")]
    fn test_insert_with_stray_recency_entry_panics() {
        let mut indexes = HashIndexes::default();
        indexes.recency.insert(5, "a");

        let _ = indexes.insert("a", 5, 1);
    }
}
