//! The cache-coherence engine.
//!
//! Orchestrates reads, staleness checks, lazy and bulk reloads, and index
//! publication for one cacheable type. The engine adds concurrency control
//! and caching on top of its collaborators - it never masks their failures:
//! any store or origin error is logged with the failing operation's name
//! and propagated to the caller unmodified.
//!
//! # Guards
//!
//! Five process-local guards bound origin load and redundant work (none
//! coordinate across instances):
//!
//! - warm guard: single-flight bulk warm
//! - batch guard: one batched fetch-and-publish at a time
//! - publish guard: one single-key fetch-and-publish at a time
//!   (process-wide, not per-key)
//! - refresh guard: one local-only refresh at a time
//! - store-read limiter: bounds simultaneous batched store reads
//!
//! Every acquisition waits at most [`CacheConfig::guard_timeout`]; on expiry
//! the operation fails with [`CacheError::GuardTimeout`]. The engine never
//! runs a guarded section unguarded.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::time::timeout;

use strata_core::{CacheError, CacheResult, CacheSchema, Cacheable, IndexRecord};

use crate::config::CacheConfig;
use crate::coordinator::{NoopWarmCoordinator, WarmCoordinator};
use crate::keyspace::Keyspace;
use crate::origin::Origin;
use crate::store::IndexStore;

/// Two-tier coherent cache for one cacheable type.
///
/// Generic over the shared index store `S` and the origin provider `O`.
/// All operations take `&self` and are safe to call from many concurrent
/// tasks; wrap the engine in an [`Arc`] to share it.
pub struct CoherentCache<T, S, O>
where
    T: Cacheable,
    S: IndexStore,
    O: Origin<T>,
{
    schema: CacheSchema<T>,
    keyspace: Keyspace,
    memory: DashMap<String, T>,
    store: Arc<S>,
    origin: Arc<O>,
    config: CacheConfig,
    coordinator: Arc<dyn WarmCoordinator>,
    warm_guard: Semaphore,
    batch_guard: Semaphore,
    publish_guard: Semaphore,
    refresh_guard: Semaphore,
    store_reads: Semaphore,
}

impl<T, S, O> CoherentCache<T, S, O>
where
    T: Cacheable,
    S: IndexStore,
    O: Origin<T>,
{
    /// Create an engine for the type described by `schema`.
    ///
    /// The schema is resolved here, once; key formatting never touches it
    /// again per call.
    pub fn new(schema: CacheSchema<T>, store: Arc<S>, origin: Arc<O>, config: CacheConfig) -> Self {
        let keyspace = Keyspace::new(schema.type_name(), schema.key_field());
        Self {
            keyspace,
            memory: DashMap::new(),
            store,
            origin,
            coordinator: Arc::new(NoopWarmCoordinator),
            warm_guard: Semaphore::new(1),
            batch_guard: Semaphore::new(1),
            publish_guard: Semaphore::new(1),
            refresh_guard: Semaphore::new(1),
            store_reads: Semaphore::new(config.store_read_permits),
            config,
            schema,
        }
    }

    /// Inject a cross-instance warm coordinator (see
    /// [`crate::coordinator`]). Without one, concurrent instances may warm
    /// redundantly.
    pub fn with_coordinator(mut self, coordinator: Arc<dyn WarmCoordinator>) -> Self {
        self.coordinator = coordinator;
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn schema(&self) -> &CacheSchema<T> {
        &self.schema
    }

    pub fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    // ========================================================================
    // PUBLIC CACHE CONTRACT
    // ========================================================================

    /// Ensure the cache reflects the full origin data set.
    ///
    /// No-op when the warm marker is present AND local memory agrees with
    /// the store's primary-key records. Otherwise fetches everything from
    /// the origin, loads local memory, publishes every index record, and
    /// bumps the warm marker. Single-flight per process: concurrent callers
    /// wait for the in-flight warm instead of issuing a second one.
    pub async fn warm_all(&self) -> CacheResult<()> {
        logged("warm_all", self.warm_all_inner()).await
    }

    /// Force-refresh a single primary key from the origin and republish its
    /// index records, bypassing any cached version.
    ///
    /// Returns `None` when the origin no longer has the object.
    pub async fn reload_one(&self, key: &str) -> CacheResult<Option<T>> {
        logged("reload_one", async {
            self.ensure_key(key)?;
            self.reload_and_publish(key, None).await
        })
        .await
    }

    /// Resolve the canonical object for a primary key.
    ///
    /// Serves from memory with zero I/O when the store's record matches the
    /// resident version; refreshes local memory only when it does not (the
    /// store record is already authoritative); fetches from the origin and
    /// publishes when the store or local memory has no entry at all.
    pub async fn get_by_key(&self, key: &str) -> CacheResult<Option<T>> {
        logged("get_by_key", self.get_by_key_inner(key)).await
    }

    /// Batched form of [`Self::get_by_key`].
    ///
    /// One bounded store read classifies every requested key as fresh or
    /// needing reload; the reload set goes to the origin as a single batch
    /// and is published as one unit. Keys with no discoverable index record
    /// are silently omitted from the result.
    pub async fn get_by_keys(&self, keys: &[String]) -> CacheResult<Vec<T>> {
        logged("get_by_keys", async {
            self.ensure_keys(keys)?;
            self.fetch_by_field(self.schema.key_field(), keys, true).await
        })
        .await
    }

    /// Resolve an object through a secondary index field.
    ///
    /// Returns `None` when no index record exists for the value: an index
    /// value alone cannot be turned into an origin fetch.
    pub async fn get_by_index(&self, field: &str, value: &str) -> CacheResult<Option<T>> {
        logged("get_by_index", self.get_by_index_inner(field, value)).await
    }

    /// Batched form of [`Self::get_by_index`].
    pub async fn get_by_indexes(&self, field: &str, values: &[String]) -> CacheResult<Vec<T>> {
        logged("get_by_indexes", async {
            self.ensure_keys(values)?;
            let folded: Vec<String> = values
                .iter()
                .map(|value| self.schema.fold_lookup_value(field, value))
                .collect();
            self.fetch_by_field(field, &folded, true).await
        })
        .await
    }

    /// Every object currently known to the shared store.
    ///
    /// Scans the primary-key namespace and delegates to the batch path with
    /// the already-qualified keys. Reflects a scan-time snapshot: there is
    /// no isolation against concurrent writers.
    pub async fn get_all_actual(&self) -> CacheResult<Vec<T>> {
        logged("get_all_actual", async {
            let keys = self.store.scan_keys(self.keyspace.primary_pattern()).await?;
            self.fetch_by_field(self.schema.key_field(), &keys, false).await
        })
        .await
    }

    // ========================================================================
    // WARM PATH
    // ========================================================================

    async fn warm_all_inner(&self) -> CacheResult<()> {
        let _permit = self.acquire(&self.warm_guard, "warm_all").await?;

        if !self.store_needs_warm().await? && !self.memory_out_of_sync().await? {
            return Ok(());
        }

        if !self.coordinator.try_acquire().await? {
            tracing::debug!(
                cache_type = self.schema.type_name(),
                "warm lease held by another instance, skipping origin fetch"
            );
            return Ok(());
        }
        let outcome = async {
            let objects = self.origin.fetch_all().await?;
            self.publish(&objects, true).await
        }
        .await;
        if let Err(error) = self.coordinator.release().await {
            tracing::warn!(error = %error, "failed to release warm lease");
        }
        outcome
    }

    /// Warm exactly once: only the marker's absence triggers this, so a
    /// process that has already warmed (or joined a warm) skips straight to
    /// the per-key protocol.
    async fn warm_if_never_warmed(&self) -> CacheResult<()> {
        if self.store_needs_warm().await? {
            self.warm_all_inner().await?;
        }
        Ok(())
    }

    /// Staleness signal A: the warm marker is absent from the shared store.
    async fn store_needs_warm(&self) -> CacheResult<bool> {
        Ok(self.store.get(self.keyspace.warm_marker()).await?.is_none())
    }

    /// Staleness signal B: local memory disagrees with the store's
    /// primary-key namespace, by entry count or by any version token.
    async fn memory_out_of_sync(&self) -> CacheResult<bool> {
        let keys = self.store.scan_keys(self.keyspace.primary_pattern()).await?;
        if self.memory.len() != keys.len() {
            return Ok(true);
        }

        let records = self
            .read_records(self.schema.key_field(), &keys, false)
            .await?;
        if records.is_empty() {
            return Ok(true);
        }

        Ok(records.iter().any(|record| {
            self.memory
                .get(&record.id)
                .map(|entry| entry.value().version() != record.version)
                .unwrap_or(true)
        }))
    }

    // ========================================================================
    // SINGLE-KEY PATH
    // ========================================================================

    async fn get_by_key_inner(&self, key: &str) -> CacheResult<Option<T>> {
        self.ensure_key(key)?;
        self.warm_if_never_warmed().await?;

        let Some(record) = self.read_record(self.schema.key_field(), key).await? else {
            // Unknown cluster-wide: first discovery publishes the records.
            return self.reload_and_publish(key, None).await;
        };

        let resident = self.memory.get(key).map(|entry| entry.value().clone());
        match resident {
            None => self.reload_and_publish(key, Some(&record.version)).await,
            Some(object) if object.version() != record.version => {
                self.refresh_local(key, &record.version).await
            }
            Some(object) => Ok(Some(object)),
        }
    }

    async fn get_by_index_inner(&self, field: &str, value: &str) -> CacheResult<Option<T>> {
        self.ensure_key(value)?;
        self.warm_if_never_warmed().await?;

        let folded = self.schema.fold_lookup_value(field, value);
        let Some(record) = self.read_record(field, &folded).await? else {
            return Ok(None);
        };

        let resident = self
            .memory
            .get(&record.id)
            .map(|entry| entry.value().clone());
        match resident {
            None => self.reload_and_publish(&record.id, Some(&record.version)).await,
            Some(object) if object.version() != record.version => {
                self.refresh_local(&record.id, &record.version).await
            }
            Some(object) => Ok(Some(object)),
        }
    }

    /// Fetch one key from the origin, load it into memory, and publish its
    /// index records (primary plus every secondary).
    ///
    /// `expected_version` is the version the caller discovered in the
    /// store, if any; when memory already holds it the fetch is skipped -
    /// checked once before taking the guard and once after, since another
    /// caller may have completed the same reload while we waited.
    async fn reload_and_publish(
        &self,
        key: &str,
        expected_version: Option<&str>,
    ) -> CacheResult<Option<T>> {
        if let Some(object) = self.resident_at(key, expected_version) {
            return Ok(Some(object));
        }

        let _permit = self.acquire(&self.publish_guard, "reload_and_publish").await?;
        if let Some(object) = self.resident_at(key, expected_version) {
            return Ok(Some(object));
        }

        let Some(object) = self.origin.fetch_one(key).await? else {
            return Ok(None);
        };

        let record = IndexRecord::new(key, object.version());
        let entries = self.record_entries(&object, &record)?;
        self.memory.insert(key.to_string(), object.clone());
        self.store.set_many(&entries).await?;

        Ok(Some(object))
    }

    /// Refresh local memory from the origin WITHOUT touching the shared
    /// store: a record matching `expected_version` is already published
    /// there by whoever authored it.
    async fn refresh_local(&self, key: &str, expected_version: &str) -> CacheResult<Option<T>> {
        if let Some(object) = self.resident_at(key, Some(expected_version)) {
            return Ok(Some(object));
        }

        let _permit = self.acquire(&self.refresh_guard, "refresh_local").await?;
        if let Some(object) = self.resident_at(key, Some(expected_version)) {
            return Ok(Some(object));
        }

        let Some(object) = self.origin.fetch_one(key).await? else {
            return Ok(None);
        };
        self.memory.insert(key.to_string(), object.clone());

        Ok(Some(object))
    }

    /// The resident copy of `key`, if it already carries the expected
    /// version.
    fn resident_at(&self, key: &str, expected_version: Option<&str>) -> Option<T> {
        let expected = expected_version?;
        self.memory.get(key).and_then(|entry| {
            if entry.value().version() == expected {
                Some(entry.value().clone())
            } else {
                None
            }
        })
    }

    // ========================================================================
    // BATCH PATH
    // ========================================================================

    /// Shared implementation behind every batch entry point.
    ///
    /// `format_keys` is false when the keys are already fully qualified
    /// (the scan path hands them over verbatim).
    async fn fetch_by_field(
        &self,
        field: &str,
        keys: &[String],
        format_keys: bool,
    ) -> CacheResult<Vec<T>> {
        self.warm_if_never_warmed().await?;

        let records = self.read_records(field, keys, format_keys).await?;
        let mut result = Vec::new();
        if records.is_empty() {
            return Ok(result);
        }

        // Missing and stale both land in the reload set; the batch path
        // does not distinguish them the way the single-key path does.
        let mut to_reload = Vec::new();
        for record in &records {
            match self.memory.get(&record.id).map(|entry| entry.value().clone()) {
                Some(object) if object.version() == record.version => result.push(object),
                _ => to_reload.push(record.id.clone()),
            }
        }

        if !to_reload.is_empty() {
            result.extend(self.reload_batch(&to_reload).await?);
        }

        Ok(result)
    }

    /// Fetch a key batch from the origin and publish it as one unit.
    async fn reload_batch(&self, keys: &[String]) -> CacheResult<Vec<T>> {
        let _permit = self.acquire(&self.batch_guard, "reload_batch").await?;

        let objects = self.origin.fetch_many(keys).await?;
        if objects.is_empty() {
            return Ok(Vec::new());
        }

        self.publish(&objects, false).await?;
        Ok(objects)
    }

    // ========================================================================
    // PUBLICATION
    // ========================================================================

    /// Load objects into memory and publish their index records as a single
    /// store write.
    ///
    /// A non-warm publish short-circuits entirely when every object is
    /// already resident at its fetched version. A warm publish always
    /// writes and appends the warm marker.
    async fn publish(&self, objects: &[T], warm: bool) -> CacheResult<()> {
        if !warm
            && objects.iter().all(|object| {
                self.memory
                    .get(&object.id())
                    .map(|entry| entry.value().version() == object.version())
                    .unwrap_or(false)
            })
        {
            return Ok(());
        }

        let mut entries = Vec::new();
        for object in objects {
            let record = IndexRecord::new(object.id(), object.version());
            entries.extend(self.record_entries(object, &record)?);
            self.memory.insert(object.id(), object.clone());
        }

        if warm {
            entries.push((
                self.keyspace.warm_marker().to_string(),
                Utc::now().to_rfc3339(),
            ));
        }

        self.store.set_many(&entries).await?;
        Ok(())
    }

    /// All shared-store entries for one object version: the primary key and
    /// every secondary index key, each carrying the identical record.
    fn record_entries(&self, object: &T, record: &IndexRecord) -> CacheResult<Vec<(String, String)>> {
        let json = encode_record(record)?;
        let mut entries: Vec<(String, String)> = self
            .schema
            .index_fields()
            .iter()
            .map(|field| {
                (
                    self.keyspace.field_key(field.name(), &field.value_of(object)),
                    json.clone(),
                )
            })
            .collect();
        entries.push((self.keyspace.primary_key(&record.id), json));
        Ok(entries)
    }

    // ========================================================================
    // STORE READS
    // ========================================================================

    async fn read_record(&self, field: &str, value: &str) -> CacheResult<Option<IndexRecord>> {
        let store_key = self.keyspace.field_key(field, value);
        match self.store.get(&store_key).await? {
            Some(json) => Ok(Some(decode_record(&store_key, &json)?)),
            None => Ok(None),
        }
    }

    /// Batched record read under the store-read limiter. Absent keys are
    /// dropped; corrupt payloads fail the whole read.
    async fn read_records(
        &self,
        field: &str,
        keys: &[String],
        format_keys: bool,
    ) -> CacheResult<Vec<IndexRecord>> {
        let _permit = self.acquire(&self.store_reads, "store_read").await?;

        let store_keys: Vec<String> = if format_keys {
            keys.iter()
                .map(|key| self.keyspace.field_key(field, key))
                .collect()
        } else {
            keys.to_vec()
        };

        let values = self.store.get_many(&store_keys).await?;
        let mut records = Vec::new();
        for (store_key, value) in store_keys.iter().zip(values) {
            if let Some(json) = value {
                records.push(decode_record(store_key, &json)?);
            }
        }
        Ok(records)
    }

    // ========================================================================
    // GUARDS & VALIDATION
    // ========================================================================

    /// Bounded guard acquisition. The timeout policy is fail, not proceed:
    /// a caller that cannot take the guard within the configured window
    /// gets [`CacheError::GuardTimeout`].
    async fn acquire<'a>(
        &self,
        guard: &'a Semaphore,
        operation: &'static str,
    ) -> CacheResult<SemaphorePermit<'a>> {
        match timeout(self.config.guard_timeout, guard.acquire()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_closed)) => Err(CacheError::dependency(operation, "guard semaphore closed")),
            Err(_elapsed) => Err(CacheError::GuardTimeout {
                operation,
                waited: self.config.guard_timeout,
            }),
        }
    }

    fn ensure_key(&self, key: &str) -> CacheResult<()> {
        if key.is_empty() {
            return Err(CacheError::MalformedKey {
                key: key.to_string(),
                reason: "key must not be empty".to_string(),
            });
        }
        Ok(())
    }

    fn ensure_keys(&self, keys: &[String]) -> CacheResult<()> {
        for key in keys {
            self.ensure_key(key)?;
        }
        Ok(())
    }
}

/// Run an operation, logging any failure with the operation's name before
/// propagating it unmodified.
async fn logged<F, R>(operation: &'static str, operation_future: F) -> CacheResult<R>
where
    F: Future<Output = CacheResult<R>>,
{
    match operation_future.await {
        Ok(value) => Ok(value),
        Err(error) => {
            tracing::error!(error = %error, operation, "cache operation failed");
            Err(error)
        }
    }
}

fn encode_record(record: &IndexRecord) -> CacheResult<String> {
    serde_json::to_string(record).map_err(|e| CacheError::Encode {
        id: record.id.clone(),
        reason: e.to_string(),
    })
}

fn decode_record(store_key: &str, json: &str) -> CacheResult<IndexRecord> {
    serde_json::from_str(json).map_err(|e| CacheError::Decode {
        key: store_key.to_string(),
        reason: e.to_string(),
    })
}
