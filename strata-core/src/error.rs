//! Error types for Strata cache operations

use std::time::Duration;
use thiserror::Error;

/// Schema construction errors.
///
/// These surface when a [`crate::CacheSchema`] is built, never at call time:
/// a type's cache schema is resolved exactly once.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Type {type_name} declares no primary key field")]
    MissingKeyField { type_name: String },

    #[error("Type {type_name} declares more than one primary key field: {first}, {second}")]
    DuplicateKeyField {
        type_name: String,
        first: String,
        second: String,
    },

    #[error("Duplicate cache field {name} on type {type_name}")]
    DuplicateField { type_name: String, name: String },
}

/// Master error type for all cache operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// The input key fails format validation. Surfaced immediately to the
    /// caller, never retried.
    #[error("Malformed key `{key}`: {reason}")]
    MalformedKey { key: String, reason: String },

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// A shared-store or origin call failed. The engine logs the failing
    /// operation's name and propagates this unmodified; it never retries.
    #[error("Dependency call failed during {operation}: {reason}")]
    Dependency { operation: String, reason: String },

    /// A mutual-exclusion guard (or the store-read limiter) could not be
    /// acquired within the bounded wait. The operation fails rather than
    /// proceeding unguarded.
    #[error("Timed out acquiring the {operation} guard after {waited:?}")]
    GuardTimeout {
        operation: &'static str,
        waited: Duration,
    },

    /// An index record could not be serialized for publication.
    #[error("Failed to encode index record for `{id}`: {reason}")]
    Encode { id: String, reason: String },

    /// A shared-store payload could not be parsed as an index record.
    #[error("Corrupt index record under `{key}`: {reason}")]
    Decode { key: String, reason: String },
}

impl CacheError {
    /// Wrap a collaborator failure with the operation it occurred in.
    pub fn dependency(operation: impl Into<String>, reason: impl ToString) -> Self {
        Self::Dependency {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

// =============================================================================
// TESTS
// =============================================================================
