//! Timed LRU - a bounded get-or-compute cache
//!
//! Maps key tuples to lazily computed values, evicting entries by age and
//! by least-recently-inserted order once over capacity. The caller supplies
//! the current time on every call; the cache never reads a clock.

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{LruCache, LruCacheMt, TreeLruCache, TreeLruCacheMt};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
