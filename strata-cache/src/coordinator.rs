//! Cross-instance warm coordination extension point.
//!
//! Bulk warming is NOT coordinated across instances: two processes that
//! observe a stale cache at the same time will both fetch the full data set
//! from the origin. That redundancy is an accepted limitation of the core
//! protocol, not a bug. Deployments that want to dedupe it can inject a
//! [`WarmCoordinator`] backed by whatever leader-election or lease mechanism
//! they already run; nothing in the engine depends on one existing.

use async_trait::async_trait;
use strata_core::CacheResult;

/// Optional cluster-wide lease around the bulk warm's origin fetch.
#[async_trait]
pub trait WarmCoordinator: Send + Sync {
    /// Attempt to take the warm lease. Returning `false` means another
    /// instance is warming; the caller skips its own origin fetch and
    /// relies on the other instance's published records.
    async fn try_acquire(&self) -> CacheResult<bool>;

    /// Release a previously acquired lease.
    async fn release(&self) -> CacheResult<()>;
}

/// Default coordinator: every instance always gets the lease, preserving
/// the uncoordinated (possibly redundant) warm behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopWarmCoordinator;

#[async_trait]
impl WarmCoordinator for NoopWarmCoordinator {
    async fn try_acquire(&self) -> CacheResult<bool> {
        Ok(true)
    }

    async fn release(&self) -> CacheResult<()> {
        Ok(())
    }
}
