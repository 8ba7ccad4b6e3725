//! Configuration Module
//!
//! Handles the fixed parameters of a cache, optionally loaded from
//! environment variables.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_CLEANUP_BUDGET;

/// Cache configuration parameters.
///
/// `A` is the age type of the timestamps the cache is used with
/// (`Duration` for `Instant`, `u64` for tick counters, ...). A cache keeps
/// its configuration for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig<A> {
    /// Age after which an entry is stale
    pub max_age: A,
    /// Soft bound on the number of entries
    pub max_elements: u64,
    /// Eviction attempts made after each insertion
    #[serde(default = "default_cleanup_budget")]
    pub cleanup_budget: u64,
}

fn default_cleanup_budget() -> u64 {
    DEFAULT_CLEANUP_BUDGET
}

impl<A> CacheConfig<A> {
    /// Creates a config with the default cleanup budget.
    pub fn new(max_age: A, max_elements: u64) -> Self {
        Self {
            max_age,
            max_elements,
            cleanup_budget: DEFAULT_CLEANUP_BUDGET,
        }
    }

    /// Sets how many eviction attempts follow each insertion.
    pub fn with_cleanup_budget(mut self, cleanup_budget: u64) -> Self {
        self.cleanup_budget = cleanup_budget;
        self
    }
}

impl CacheConfig<Duration> {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `{PREFIX}_MAX_AGE_MS` - Maximum entry age in milliseconds (default: 60000)
    /// - `{PREFIX}_MAX_ELEMENTS` - Maximum cache entries (default: 1000)
    /// - `{PREFIX}_CLEANUP_BUDGET` - Evictions attempted per insertion (default: 3)
    ///
    /// Unset or unparsable variables fall back to the default.
    pub fn from_env(prefix: &str) -> Self {
        let defaults = Self::default();
        Self {
            max_age: read_var(prefix, "MAX_AGE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_age),
            max_elements: read_var(prefix, "MAX_ELEMENTS").unwrap_or(defaults.max_elements),
            cleanup_budget: read_var(prefix, "CLEANUP_BUDGET").unwrap_or(defaults.cleanup_budget),
        }
    }
}

impl Default for CacheConfig<Duration> {
    fn default() -> Self {
        Self::new(Duration::from_secs(60), 1000)
    }
}

fn read_var(prefix: &str, name: &str) -> Option<u64> {
    env::var(format!("{}_{}", prefix, name))
        .ok()
        .and_then(|v| v.parse().ok())
}
