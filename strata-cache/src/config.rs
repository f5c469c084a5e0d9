//! Engine configuration.

use std::time::Duration;

/// Tunables for the cache engine's concurrency guards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Bounded wait when acquiring any guard or the store-read limiter.
    /// A caller that cannot acquire within this window fails with
    /// [`strata_core::CacheError::GuardTimeout`] instead of blocking
    /// indefinitely on a hung dependency.
    pub guard_timeout: Duration,
    /// Maximum simultaneous in-flight batched reads against the shared
    /// store, capping connection pressure under high fan-out.
    pub store_read_permits: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            guard_timeout: Duration::from_secs(10),
            store_read_permits: 500,
        }
    }
}

impl CacheConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bounded guard-acquisition wait.
    pub fn with_guard_timeout(mut self, timeout: Duration) -> Self {
        self.guard_timeout = timeout;
        self
    }

    /// Set the store-read concurrency bound.
    pub fn with_store_read_permits(mut self, permits: usize) -> Self {
        self.store_read_permits = permits;
        self
    }
}
