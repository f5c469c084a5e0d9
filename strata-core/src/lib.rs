//! Strata Core - Cache Contracts and Data Types
//!
//! Pure data structures with no behavior. All other crates depend on this.
//! This crate contains ONLY data types and contracts - no I/O, no caching
//! logic.

pub mod cacheable;
pub mod error;
pub mod record;
pub mod schema;

pub use cacheable::Cacheable;
pub use error::{CacheError, CacheResult, SchemaError};
pub use record::IndexRecord;
pub use schema::{CacheSchema, IndexField, SchemaBuilder};
