//! The contract a domain object must satisfy to be cached.

/// Marker trait for types servable by the coherent cache.
///
/// # Implementation Requirements
///
/// - `id()` must return the same value for the same logical object across
///   calls; it is the primary key used for the shared-store namespace and
///   the local memory table.
/// - `version()` is an opaque token compared for equality only. Any change
///   to the object at the origin must produce a different token; no ordering
///   is assumed between tokens.
/// - Implementations must be `Clone` (cache reads hand out copies) and
///   `Send + Sync + 'static` for async compatibility.
///
/// There is deliberately no `Serialize` bound: full domain objects never
/// leave local memory. Only the `{id, version}` pointer is persisted in the
/// shared store.
pub trait Cacheable: Clone + Send + Sync + 'static {
    /// The primary key value identifying this object.
    fn id(&self) -> String;

    /// The opaque version token for this object's current state.
    fn version(&self) -> String;
}
