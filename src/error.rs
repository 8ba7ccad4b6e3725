//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use std::collections::TryReserveError;

use thiserror::Error;

// == Cache Error Enum ==
/// Errors surfaced by [`LruCacheBase::get`](crate::cache::LruCacheBase::get).
///
/// `E` is the error type of the value obtainer. Index invariant violations
/// are not represented here: they panic.
#[derive(Error, Debug)]
pub enum CacheError<E> {
    /// The value obtainer failed; nothing was cached
    #[error("value obtainer failed: {0}")]
    Obtainer(#[source] E),

    /// Room for a new entry could not be reserved; both indexes are unchanged
    #[error("could not reserve space for a new cache entry: {0}")]
    ResourceExhausted(#[from] TryReserveError),
}

impl<E> CacheError<E> {
    /// Returns the obtainer error, if that is what failed.
    pub fn into_obtainer_error(self) -> Option<E> {
        match self {
            CacheError::Obtainer(err) => Some(err),
            CacheError::ResourceExhausted(_) => None,
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for cache lookups.
pub type Result<T, E> = std::result::Result<T, CacheError<E>>;
