//! Lock Mode Module
//!
//! The two ways a cache can guard its indexes, chosen through the type.

use std::cell::{RefCell, RefMut};
use std::ops::DerefMut;

use parking_lot::{Mutex, MutexGuard};

// == Index Lock ==
/// Exclusive access to the cache's indexes.
///
/// - `parking_lot::Mutex` for caches shared between threads
/// - `RefCell` for caches used from one thread only; no atomics, and the
///   resulting cache is `!Sync`
///
/// The guard is always dropped before the value obtainer runs, so an
/// obtainer may call back into the same cache, and a panicking obtainer
/// never holds the lock. Only an index invariant panic unwinds through a
/// held guard; it fires before either index is modified, and neither lock
/// poisons, so the cache stays usable afterwards.
pub trait IndexLock {
    type Target;
    type Guard<'a>: DerefMut<Target = Self::Target>
    where
        Self: 'a;

    fn new(value: Self::Target) -> Self;

    fn lock(&self) -> Self::Guard<'_>;
}

impl<T> IndexLock for Mutex<T> {
    type Target = T;
    type Guard<'a>
        = MutexGuard<'a, T>
    where
        Self: 'a;

    fn new(value: T) -> Self {
        Mutex::new(value)
    }

    fn lock(&self) -> MutexGuard<'_, T> {
        Mutex::lock(self)
    }
}

impl<T> IndexLock for RefCell<T> {
    type Target = T;
    type Guard<'a>
        = RefMut<'a, T>
    where
        Self: 'a;

    fn new(value: T) -> Self {
        RefCell::new(value)
    }

    fn lock(&self) -> RefMut<'_, T> {
        self.borrow_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bump<L: IndexLock<Target = u32>>(lock: &L) -> u32 {
        let mut guard = lock.lock();
        *guard += 1;
        *guard
    }

    #[test]
    fn test_mutex_lock() {
        let lock = <Mutex<u32> as IndexLock>::new(0);
        assert_eq!(bump(&lock), 1);
        assert_eq!(bump(&lock), 2);
    }

    #[test]
    fn test_refcell_lock_released_between_calls() {
        let lock = <RefCell<u32> as IndexLock>::new(0);
        assert_eq!(bump(&lock), 1);
        assert_eq!(bump(&lock), 2);
        assert!(lock.try_borrow_mut().is_ok());
    }
}
