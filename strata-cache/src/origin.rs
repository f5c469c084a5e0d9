//! Origin data provider trait.

use async_trait::async_trait;
use strata_core::{CacheResult, Cacheable};

/// Provider of authoritative domain objects, wrapping the true backing
/// datastore.
///
/// The cache only ever reads through this trait; objects are mutated at the
/// origin by other actors, and the cache detects those mutations through
/// the shared index store's version records.
#[async_trait]
pub trait Origin<T: Cacheable>: Send + Sync {
    /// Fetch a single object by primary key.
    ///
    /// Implementations may reject keys that do not parse as their identity
    /// type with [`strata_core::CacheError::MalformedKey`].
    async fn fetch_one(&self, key: &str) -> CacheResult<Option<T>>;

    /// Fetch the objects matching a batch of primary keys. Unknown keys are
    /// simply absent from the result.
    async fn fetch_many(&self, keys: &[String]) -> CacheResult<Vec<T>>;

    /// Fetch the complete data set for this type.
    async fn fetch_all(&self) -> CacheResult<Vec<T>>;
}
