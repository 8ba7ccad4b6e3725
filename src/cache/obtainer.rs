//! Value Obtainer Module
//!
//! The capability a cache calls to compute a value on a miss.

// == Value Obtainer ==
/// Computes the value for a key the cache does not hold.
///
/// Called without the cache lock held. It may be slow, may fail, and may be
/// called several times at once for the same key.
///
/// Any `Fn(&K) -> Result<V, E>` is a value obtainer.
pub trait ValueObtainer<K, V> {
    type Error;

    fn obtain(&self, key: &K) -> Result<V, Self::Error>;
}

impl<K, V, E, F> ValueObtainer<K, V> for F
where
    F: Fn(&K) -> Result<V, E>,
{
    type Error = E;

    fn obtain(&self, key: &K) -> Result<V, E> {
        self(key)
    }
}
