//! Shared index store trait and the in-memory implementation.
//!
//! The store is the cluster-visible coherence catalog. Implementations wrap
//! whatever key-value service a deployment uses; the engine only needs
//! opaque string get/set plus a pattern key scan.

use std::collections::HashMap;

use async_trait::async_trait;
use strata_core::CacheResult;
use tokio::sync::RwLock;

/// Client contract for the shared, cluster-visible index store.
///
/// Writes are treated as commutative, last-writer-wins per key. Missing
/// entries are absences, not errors. Implementations are responsible for
/// their own retry policy; the engine performs none.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Set a single key.
    async fn set(&self, key: &str, value: &str) -> CacheResult<()>;

    /// Set a batch of keys as one call.
    async fn set_many(&self, entries: &[(String, String)]) -> CacheResult<()>;

    /// Get a single key, `None` when absent.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Get a batch of keys. The result preserves input order; absent keys
    /// yield `None` in their slot.
    async fn get_many(&self, keys: &[String]) -> CacheResult<Vec<Option<String>>>;

    /// List keys matching a pattern. The engine only emits trailing-`*`
    /// patterns (`<Type>.<Field>.*`).
    async fn scan_keys(&self, pattern: &str) -> CacheResult<Vec<String>>;
}

/// In-memory [`IndexStore`] for tests and single-node deployments.
///
/// Uses tokio::sync::RwLock for safe async access. Pattern scans support
/// exactly the trailing-`*` prefix patterns the engine emits; any other
/// pattern is matched as a literal key.
#[derive(Debug, Default)]
pub struct InMemoryIndexStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Remove a single key, returning its previous value.
    pub async fn remove(&self, key: &str) -> Option<String> {
        self.entries.write().await.remove(key)
    }

    /// Drop every key.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Copy of the full key-value contents, for test assertions.
    pub async fn snapshot(&self) -> HashMap<String, String> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl IndexStore for InMemoryIndexStore {
    async fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn set_many(&self, entries: &[(String, String)]) -> CacheResult<()> {
        let mut guard = self.entries.write().await;
        for (key, value) in entries {
            guard.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn get_many(&self, keys: &[String]) -> CacheResult<Vec<Option<String>>> {
        let guard = self.entries.read().await;
        Ok(keys.iter().map(|key| guard.get(key).cloned()).collect())
    }

    async fn scan_keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let guard = self.entries.read().await;
        let keys = match pattern.strip_suffix('*') {
            Some(prefix) => guard
                .keys()
                .filter(|key| key.starts_with(prefix))
                .cloned()
                .collect(),
            None => guard
                .keys()
                .filter(|key| key.as_str() == pattern)
                .cloned()
                .collect(),
        };
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_then_get_round_trips() {
        let store = InMemoryIndexStore::new();
        store.set("User.Id.1", "a").await.unwrap();
        assert_eq!(store.get("User.Id.1").await.unwrap(), Some("a".to_string()));
        assert_eq!(store.get("User.Id.2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_overwrites_existing_value() {
        let store = InMemoryIndexStore::new();
        store.set("k", "old").await.unwrap();
        store.set("k", "new").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("new".to_string()));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_many_preserves_input_order_with_gaps() {
        let store = InMemoryIndexStore::new();
        store
            .set_many(&[
                ("a".to_string(), "1".to_string()),
                ("c".to_string(), "3".to_string()),
            ])
            .await
            .unwrap();

        let values = store
            .get_many(&["a".to_string(), "b".to_string(), "c".to_string()])
            .await
            .unwrap();
        assert_eq!(
            values,
            vec![Some("1".to_string()), None, Some("3".to_string())]
        );
    }

    #[tokio::test]
    async fn test_scan_keys_matches_trailing_star_prefix() {
        let store = InMemoryIndexStore::new();
        store
            .set_many(&[
                ("User.Uid.a".to_string(), "1".to_string()),
                ("User.Uid.b".to_string(), "2".to_string()),
                ("User.Name.a".to_string(), "3".to_string()),
                ("Account.Uid.a".to_string(), "4".to_string()),
            ])
            .await
            .unwrap();

        let mut keys = store.scan_keys("User.Uid.*").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["User.Uid.a", "User.Uid.b"]);
    }

    #[tokio::test]
    async fn test_scan_keys_without_star_is_exact() {
        let store = InMemoryIndexStore::new();
        store.set("User.ReloadAll", "t").await.unwrap();
        store.set("User.ReloadAllXtra", "t").await.unwrap();

        let keys = store.scan_keys("User.ReloadAll").await.unwrap();
        assert_eq!(keys, vec!["User.ReloadAll"]);
    }
}
