//! Cache Entry Module
//!
//! Defines the stored entry and the timestamp abstraction used for staleness.

use std::fmt::Debug;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

// == Timestamp ==
/// A monotonic point in time supplied by the caller on every cache call.
///
/// The cache never reads a clock itself, so any well-ordered type with an
/// addable age works. Tests typically use plain `u64` ticks.
pub trait Timestamp: Copy + Ord + Debug {
    /// Span between two timestamps, used for the maximum age.
    type Age: Copy + Debug;

    /// Returns `self + age`, or `None` if that is not representable.
    fn checked_add_age(self, age: Self::Age) -> Option<Self>;
}

impl Timestamp for Instant {
    type Age = Duration;

    fn checked_add_age(self, age: Duration) -> Option<Self> {
        self.checked_add(age)
    }
}

impl Timestamp for u64 {
    type Age = u64;

    fn checked_add_age(self, age: u64) -> Option<Self> {
        self.checked_add(age)
    }
}

impl Timestamp for DateTime<Utc> {
    type Age = chrono::Duration;

    fn checked_add_age(self, age: chrono::Duration) -> Option<Self> {
        self.checked_add_signed(age)
    }
}

// == Cache Entry ==
/// The value cached for one key together with its insertion time.
///
/// Entries are never updated in place. A refreshed value is a new entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry<T, V> {
    /// When the value was inserted
    pub inserted_at: T,
    /// The cached value
    pub value: V,
}

impl<T: Timestamp, V> CacheEntry<T, V> {
    // == Constructor ==
    pub fn new(inserted_at: T, value: V) -> Self {
        Self { inserted_at, value }
    }

    // == Is Stale ==
    /// Checks if the entry is older than `max_age` at `now`.
    ///
    /// Boundary condition: an entry is still fresh when
    /// `inserted_at + max_age == now`. It becomes stale strictly after that.
    pub fn is_stale(&self, max_age: T::Age, now: T) -> bool {
        is_stale(self.inserted_at, max_age, now)
    }
}

// == Utility Functions ==
/// Staleness test shared by lookups and the eviction pass.
///
/// An overflowing deadline never goes stale.
pub fn is_stale<T: Timestamp>(inserted_at: T, max_age: T::Age, now: T) -> bool {
    match inserted_at.checked_add_age(max_age) {
        Some(deadline) => deadline < now,
        None => false,
    }
}
