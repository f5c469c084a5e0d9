//! Strata Test Utilities
//!
//! Centralized test infrastructure for the Strata workspace:
//! - A sample cacheable entity with a realistic schema
//! - An in-memory origin provider with mutation helpers
//! - Call-counting decorators for the origin and the index store
//!
//! The counting decorators replace process-wide call counters with explicit
//! counters owned by the test harness: every assertion reads the decorator
//! instance it constructed, nothing global.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use strata_cache::{IndexStore, Origin};
use strata_core::{CacheError, CacheResult, CacheSchema, Cacheable};

// Re-export the pieces nearly every test needs
pub use strata_cache::{CacheConfig, CoherentCache, InMemoryIndexStore};
pub use strata_core::IndexRecord;

// ============================================================================
// SAMPLE ENTITY
// ============================================================================

/// Sample cacheable entity: a user with a uuid primary key, a numeric
/// secondary index, and a case-folded name index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestUser {
    pub user_id: i64,
    pub uid: Uuid,
    pub full_name: String,
    pub revision: u64,
}

impl TestUser {
    /// Create a user at revision 1 with a fresh random uid.
    pub fn new(user_id: i64, full_name: impl Into<String>) -> Self {
        Self {
            user_id,
            uid: Uuid::new_v4(),
            full_name: full_name.into(),
            revision: 1,
        }
    }
}

impl Cacheable for TestUser {
    fn id(&self) -> String {
        self.uid.to_string()
    }

    fn version(&self) -> String {
        self.revision.to_string()
    }
}

/// The cache schema for [`TestUser`]: `Uid` is the primary key, `UserId`
/// and case-folded `FullName` are secondary indexes.
pub fn user_schema() -> CacheSchema<TestUser> {
    CacheSchema::builder("User")
        .key("Uid")
        .index("UserId", |u: &TestUser| u.user_id.to_string())
        .index_case_fold("FullName", |u: &TestUser| u.full_name.clone())
        .build()
        .expect("static test schema is valid")
}

/// A small fixed user set for scenario tests.
pub fn sample_users() -> Vec<TestUser> {
    vec![
        TestUser::new(1, "Alice Carver"),
        TestUser::new(2, "Bruno Keel"),
    ]
}

// ============================================================================
// IN-MEMORY ORIGIN
// ============================================================================

/// In-memory [`Origin`] over a mutable user set.
///
/// Mutation helpers simulate the backing datastore changing underneath the
/// cache; the cache only ever observes those changes through version
/// comparison against the shared store.
#[derive(Debug, Default)]
pub struct InMemoryOrigin {
    users: RwLock<Vec<TestUser>>,
}

impl InMemoryOrigin {
    pub fn new(users: Vec<TestUser>) -> Self {
        Self {
            users: RwLock::new(users),
        }
    }

    /// Snapshot of the current user set.
    pub fn users(&self) -> Vec<TestUser> {
        self.users.read().map(|guard| guard.clone()).unwrap_or_default()
    }

    /// Insert or replace (by uid) a user.
    pub fn upsert(&self, user: TestUser) {
        if let Ok(mut guard) = self.users.write() {
            match guard.iter_mut().find(|u| u.uid == user.uid) {
                Some(existing) => *existing = user,
                None => guard.push(user),
            }
        }
    }

    /// Advance a user's revision, returning the updated user.
    pub fn bump_revision(&self, uid: Uuid) -> Option<TestUser> {
        let mut guard = self.users.write().ok()?;
        let user = guard.iter_mut().find(|u| u.uid == uid)?;
        user.revision += 1;
        Some(user.clone())
    }

    /// Delete a user; returns whether one was removed.
    pub fn remove(&self, uid: Uuid) -> bool {
        match self.users.write() {
            Ok(mut guard) => {
                let before = guard.len();
                guard.retain(|u| u.uid != uid);
                guard.len() != before
            }
            Err(_) => false,
        }
    }

    fn read(&self) -> CacheResult<Vec<TestUser>> {
        self.users
            .read()
            .map(|guard| guard.clone())
            .map_err(|_| CacheError::dependency("origin", "user set lock poisoned"))
    }
}

#[async_trait]
impl Origin<TestUser> for InMemoryOrigin {
    async fn fetch_one(&self, key: &str) -> CacheResult<Option<TestUser>> {
        let uid = Uuid::parse_str(key).map_err(|e| CacheError::MalformedKey {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        Ok(self.read()?.into_iter().find(|u| u.uid == uid))
    }

    async fn fetch_many(&self, keys: &[String]) -> CacheResult<Vec<TestUser>> {
        Ok(self
            .read()?
            .into_iter()
            .filter(|u| keys.iter().any(|key| key == &u.uid.to_string()))
            .collect())
    }

    async fn fetch_all(&self) -> CacheResult<Vec<TestUser>> {
        self.read()
    }
}

// ============================================================================
// CALL-COUNTING DECORATORS
// ============================================================================

/// [`Origin`] decorator counting calls per method.
#[derive(Debug, Default)]
pub struct CountingOrigin<O> {
    inner: O,
    fetch_one: AtomicUsize,
    fetch_many: AtomicUsize,
    fetch_all: AtomicUsize,
}

impl<O> CountingOrigin<O> {
    pub fn new(inner: O) -> Self {
        Self {
            inner,
            fetch_one: AtomicUsize::new(0),
            fetch_many: AtomicUsize::new(0),
            fetch_all: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &O {
        &self.inner
    }

    pub fn fetch_one_calls(&self) -> usize {
        self.fetch_one.load(Ordering::SeqCst)
    }

    pub fn fetch_many_calls(&self) -> usize {
        self.fetch_many.load(Ordering::SeqCst)
    }

    pub fn fetch_all_calls(&self) -> usize {
        self.fetch_all.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.fetch_one_calls() + self.fetch_many_calls() + self.fetch_all_calls()
    }
}

#[async_trait]
impl<T, O> Origin<T> for CountingOrigin<O>
where
    T: Cacheable,
    O: Origin<T>,
{
    async fn fetch_one(&self, key: &str) -> CacheResult<Option<T>> {
        self.fetch_one.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_one(key).await
    }

    async fn fetch_many(&self, keys: &[String]) -> CacheResult<Vec<T>> {
        self.fetch_many.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_many(keys).await
    }

    async fn fetch_all(&self) -> CacheResult<Vec<T>> {
        self.fetch_all.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_all().await
    }
}

/// [`IndexStore`] decorator counting calls per method.
#[derive(Debug, Default)]
pub struct CountingStore<S> {
    inner: S,
    get: AtomicUsize,
    get_many: AtomicUsize,
    set: AtomicUsize,
    set_many: AtomicUsize,
    scan_keys: AtomicUsize,
}

impl<S> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            get: AtomicUsize::new(0),
            get_many: AtomicUsize::new(0),
            set: AtomicUsize::new(0),
            set_many: AtomicUsize::new(0),
            scan_keys: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn get_calls(&self) -> usize {
        self.get.load(Ordering::SeqCst)
    }

    pub fn get_many_calls(&self) -> usize {
        self.get_many.load(Ordering::SeqCst)
    }

    pub fn set_calls(&self) -> usize {
        self.set.load(Ordering::SeqCst)
    }

    pub fn set_many_calls(&self) -> usize {
        self.set_many.load(Ordering::SeqCst)
    }

    pub fn scan_calls(&self) -> usize {
        self.scan_keys.load(Ordering::SeqCst)
    }

    /// Every write call, single and batched.
    pub fn write_calls(&self) -> usize {
        self.set_calls() + self.set_many_calls()
    }
}

#[async_trait]
impl<S> IndexStore for CountingStore<S>
where
    S: IndexStore,
{
    async fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        self.set.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value).await
    }

    async fn set_many(&self, entries: &[(String, String)]) -> CacheResult<()> {
        self.set_many.fetch_add(1, Ordering::SeqCst);
        self.inner.set_many(entries).await
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.get.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn get_many(&self, keys: &[String]) -> CacheResult<Vec<Option<String>>> {
        self.get_many.fetch_add(1, Ordering::SeqCst);
        self.inner.get_many(keys).await
    }

    async fn scan_keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        self.scan_keys.fetch_add(1, Ordering::SeqCst);
        self.inner.scan_keys(pattern).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_schema_builds() {
        let schema = user_schema();
        assert_eq!(schema.type_name(), "User");
        assert_eq!(schema.key_field(), "Uid");
        assert_eq!(schema.index_fields().len(), 2);
    }

    #[tokio::test]
    async fn test_origin_rejects_non_uuid_key() {
        let origin = InMemoryOrigin::new(sample_users());
        let err = origin.fetch_one("not-a-uuid").await.unwrap_err();
        assert!(matches!(err, CacheError::MalformedKey { .. }));
    }

    #[tokio::test]
    async fn test_origin_round_trips_by_uid() {
        let users = sample_users();
        let uid = users[0].uid;
        let origin = InMemoryOrigin::new(users);

        let got = origin.fetch_one(&uid.to_string()).await.unwrap();
        assert_eq!(got.map(|u| u.uid), Some(uid));
    }

    #[tokio::test]
    async fn test_bump_revision_changes_version_token() {
        let users = sample_users();
        let uid = users[0].uid;
        let origin = InMemoryOrigin::new(users);

        let updated = origin.bump_revision(uid).unwrap();
        assert_eq!(updated.revision, 2);
        assert_eq!(updated.version(), "2");
    }

    #[tokio::test]
    async fn test_counting_origin_tracks_each_method() {
        let origin = CountingOrigin::new(InMemoryOrigin::new(sample_users()));
        let uid = origin.inner().users()[0].uid.to_string();

        let _ = origin.fetch_one(&uid).await.unwrap();
        let _ = origin.fetch_many(&[uid]).await.unwrap();
        let _ = origin.fetch_all().await.unwrap();
        let _ = origin.fetch_all().await.unwrap();

        assert_eq!(origin.fetch_one_calls(), 1);
        assert_eq!(origin.fetch_many_calls(), 1);
        assert_eq!(origin.fetch_all_calls(), 2);
        assert_eq!(origin.total_calls(), 4);
    }

    #[tokio::test]
    async fn test_counting_store_tracks_reads_and_writes() {
        let store = CountingStore::new(InMemoryIndexStore::new());
        store.set("k", "v").await.unwrap();
        let _ = store.get("k").await.unwrap();
        let _ = store.get_many(&["k".to_string()]).await.unwrap();
        let _ = store.scan_keys("k*").await.unwrap();

        assert_eq!(store.set_calls(), 1);
        assert_eq!(store.get_calls(), 1);
        assert_eq!(store.get_many_calls(), 1);
        assert_eq!(store.scan_calls(), 1);
        assert_eq!(store.write_calls(), 1);
    }
}
