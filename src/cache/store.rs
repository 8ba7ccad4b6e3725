//! Cache Store Module
//!
//! Get-or-compute cache combining a primary index with recency tracking and
//! TTL expiration.

use std::marker::PhantomData;

use tracing::{debug, trace};

use crate::cache::index::Age;
use crate::cache::{IndexLock, Indexes, InsertOutcome, PrimaryIndex, ValueObtainer};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

// == Cache Store ==
/// A cache that computes missing values with an obtainer and evicts entries
/// by age and by count.
///
/// Use one of the aliases rather than naming this type directly:
/// [`LruCache`](crate::cache::LruCache), [`LruCacheMt`](crate::cache::LruCacheMt),
/// [`TreeLruCache`](crate::cache::TreeLruCache) or
/// [`TreeLruCacheMt`](crate::cache::TreeLruCacheMt).
///
/// # Concurrent misses
/// The obtainer runs without the lock held. Callers that miss on the same key
/// at the same time each run the obtainer and each get their own value back;
/// the first one to re-acquire the lock has its value cached. There is no
/// per-key de-duplication of obtainer calls.
///
/// # Example
/// ```
/// use timed_lru::cache::LruCacheMt;
///
/// let cache: LruCacheMt<(u32, String), usize, u64, _> =
///     LruCacheMt::new(10, 100, |key: &(u32, String)| {
///         Ok::<_, std::convert::Infallible>(key.1.len() * key.0 as usize)
///     });
///
/// assert_eq!(cache.get(0, (2, "abc".to_string())).unwrap(), 6);
/// ```
pub struct LruCacheBase<P, L, O>
where
    P: PrimaryIndex,
{
    /// Age after which an entry is stale
    max_age: Age<P>,
    /// Soft bound on the number of entries
    max_elements: u64,
    /// Eviction attempts made after each insertion
    cleanup_budget: u64,
    /// Computes values on a miss
    obtainer: O,
    /// Primary and recency indexes behind one lock
    indexes: L,
    _primary: PhantomData<fn() -> P>,
}

impl<P, L, O> LruCacheBase<P, L, O>
where
    P: PrimaryIndex,
    L: IndexLock<Target = Indexes<P>>,
    O: ValueObtainer<P::Key, P::Value>,
{
    // == Constructor ==
    /// Creates a cache.
    ///
    /// # Arguments
    /// * `max_age` - Period after which every entry is discarded
    /// * `max_elements` - Capacity, past which the least recently inserted
    ///   entries are removed. Zero is accepted and keeps the cache nearly empty.
    /// * `obtainer` - Computes the value for a key that is not cached
    pub fn new(max_age: Age<P>, max_elements: u64, obtainer: O) -> Self {
        Self::with_config(CacheConfig::new(max_age, max_elements), obtainer)
    }

    /// Creates a cache from a [`CacheConfig`].
    pub fn with_config(config: CacheConfig<Age<P>>, obtainer: O) -> Self {
        Self {
            max_age: config.max_age,
            max_elements: config.max_elements,
            cleanup_budget: config.cleanup_budget,
            obtainer,
            indexes: L::new(Indexes::default()),
            _primary: PhantomData,
        }
    }

    // == Get ==
    /// Returns the cached value for `key` or obtains, caches and returns it.
    ///
    /// A hit returns immediately. On a miss the obtainer runs unlocked, the
    /// value is cached unless another caller cached one first, and a few
    /// entries are evicted if they are stale or over capacity.
    ///
    /// Obtainer errors are returned as is and never cached.
    pub fn get(&self, now: P::Stamp, key: P::Key) -> Result<P::Value, O::Error> {
        {
            let mut indexes = self.indexes.lock();
            if let Some(value) = indexes.lookup_fresh(&key, self.max_age, now) {
                trace!(?now, "cache hit");
                return Ok(value);
            }
        }

        debug!(?now, "cache miss, obtaining value");
        let value = self.obtainer.obtain(&key).map_err(CacheError::Obtainer)?;

        let mut indexes = self.indexes.lock();
        match indexes.insert(key, now, value.clone())? {
            InsertOutcome::Inserted => {
                let evicted =
                    indexes.evict(now, self.max_age, self.max_elements, self.cleanup_budget);
                if evicted > 0 {
                    debug!(evicted, remaining = indexes.len(), "evicted entries after insert");
                }
            }
            InsertOutcome::LostRace => {
                debug!(?now, "value cached concurrently, returning own result");
            }
        }

        Ok(value)
    }

    // == Cleanup ==
    /// Removes at most `max_operations` entries that are stale or push the
    /// cache over capacity, oldest first.
    ///
    /// `get` already does this a little after every insertion, so calling it
    /// is only needed to keep a hard bound or to drop stale entries of an
    /// idle cache.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup(&self, now: P::Stamp, max_operations: u64) -> usize {
        let mut indexes = self.indexes.lock();
        let evicted = indexes.evict(now, self.max_age, self.max_elements, max_operations);
        if evicted > 0 {
            debug!(evicted, remaining = indexes.len(), "cleanup removed entries");
        }
        evicted
    }

    // == Erase ==
    /// Removes the entry for `key` regardless of its age.
    ///
    /// Returns false, and does nothing else, if `key` was not cached.
    pub fn erase(&self, key: &P::Key) -> bool {
        self.indexes.lock().erase(key)
    }

    // == Length ==
    /// Returns the current number of entries, stale ones included.
    pub fn len(&self) -> usize {
        self.indexes.lock().len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.indexes.lock().is_empty()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> crate::cache::CacheStats {
        self.indexes.lock().stats()
    }

    pub fn max_age(&self) -> Age<P> {
        self.max_age
    }

    pub fn max_elements(&self) -> u64 {
        self.max_elements
    }

    pub fn cleanup_budget(&self) -> u64 {
        self.cleanup_budget
    }

    // == Consistency Check ==
    /// Panics unless the primary and recency indexes hold the same entries
    /// with the same timestamps.
    pub fn assert_consistent(&self) {
        self.indexes.lock().assert_consistent();
    }
}

impl<P, L, O> std::fmt::Debug for LruCacheBase<P, L, O>
where
    P: PrimaryIndex,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruCacheBase")
            .field("max_age", &self.max_age)
            .field("max_elements", &self.max_elements)
            .field("cleanup_budget", &self.cleanup_budget)
            .finish_non_exhaustive()
    }
}
