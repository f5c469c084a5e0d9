//! Strata Cache - Two-Tier Coherent Cache Engine
//!
//! A fast in-process memory table kept correct against a shared, versioned
//! key-value index, with lazy and bulk reload from an origin data provider.
//!
//! # Design
//!
//! The shared store is a coherence catalog, not a payload store: per cached
//! object it holds only an `{id, version}` [`strata_core::IndexRecord`]
//! under `<Type>.<Field>.<Value>` keys (primary key plus every secondary
//! index), and a `<Type>.ReloadAll` marker recording that the type has been
//! bulk-warmed at least once. Full objects live only in each process's
//! local memory table. Freshness is decided by comparing a local object's
//! version token against the store's record; other instances discover new
//! versions through the records the writing instance published, never by
//! push notification.
//!
//! # Coherence Protocol
//!
//! A keyed read classifies the requested object four ways:
//!
//! - unknown to the store: fetch from the origin and publish records under
//!   every namespaced key
//! - known but absent locally: fetch and publish, double-checked against
//!   memory to skip work another caller already finished
//! - present locally at a different version: refresh local memory only -
//!   the store record is already authoritative
//! - present at the store's version: serve from memory with zero I/O
//!
//! Batched reads merge the "absent" and "stale" classes into one batched
//! reload-and-publish. There is no cross-instance warm coordination by
//! default: concurrent instances may warm redundantly (see
//! [`WarmCoordinator`] for the injectable extension point).

pub mod config;
pub mod coordinator;
pub mod engine;
pub mod keyspace;
pub mod origin;
pub mod store;

pub use config::CacheConfig;
pub use coordinator::{NoopWarmCoordinator, WarmCoordinator};
pub use engine::CoherentCache;
pub use keyspace::Keyspace;
pub use origin::Origin;
pub use store::{InMemoryIndexStore, IndexStore};
