//! Cache Module
//!
//! Provides a get-or-compute cache with TTL expiration and
//! least-recently-inserted eviction.

mod entry;
mod index;
mod lock;
mod lru;
mod obtainer;
mod stats;
mod store;


use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;

// Re-export public types
pub use entry::{CacheEntry, Timestamp};
pub use index::{Indexes, InsertOutcome, PrimaryIndex};
pub use lock::IndexLock;
pub use lru::RecencyIndex;
pub use obtainer::ValueObtainer;
pub use stats::CacheStats;
pub use store::LruCacheBase;

// == Public Constants ==
/// Eviction attempts made after every insertion unless configured otherwise
pub const DEFAULT_CLEANUP_BUDGET: u64 = 3;

// == Cache Variants ==
/// Hashed primary index
pub type HashIndex<K, V, T> = HashMap<K, CacheEntry<T, V>>;

/// Ordered primary index
pub type TreeIndex<K, V, T> = BTreeMap<K, CacheEntry<T, V>>;

/// Hashed cache for use from a single thread.
pub type LruCache<K, V, T, O> =
    LruCacheBase<HashIndex<K, V, T>, RefCell<Indexes<HashIndex<K, V, T>>>, O>;

/// Hashed cache shareable between threads.
pub type LruCacheMt<K, V, T, O> =
    LruCacheBase<HashIndex<K, V, T>, Mutex<Indexes<HashIndex<K, V, T>>>, O>;

/// Ordered cache for use from a single thread. Keys need not be `Hash`.
pub type TreeLruCache<K, V, T, O> =
    LruCacheBase<TreeIndex<K, V, T>, RefCell<Indexes<TreeIndex<K, V, T>>>, O>;

/// Ordered cache shareable between threads. Keys need not be `Hash`.
pub type TreeLruCacheMt<K, V, T, O> =
    LruCacheBase<TreeIndex<K, V, T>, Mutex<Indexes<TreeIndex<K, V, T>>>, O>;
