//! The pointer payload persisted in the shared store.

use serde::{Deserialize, Serialize};

/// The `{id, version}` pointer written to the shared store under every
/// namespaced key of a cached object.
///
/// This is the ONLY thing the cluster-visible store holds per object: the
/// full payload stays in each process's local memory. Every key published
/// for one object version (primary plus every secondary index) carries an
/// identical record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Primary key value of the object this record points at.
    pub id: String,
    /// Opaque version token, compared for equality only.
    pub version: String,
}

impl IndexRecord {
    /// Create a record pointing at the given object version.
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_record_json_round_trip() {
        let record = IndexRecord::new("a1", "7");
        let json = serde_json::to_string(&record).unwrap();
        let back: IndexRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_index_record_equality_is_exact() {
        assert_eq!(IndexRecord::new("a1", "1"), IndexRecord::new("a1", "1"));
        assert_ne!(IndexRecord::new("a1", "1"), IndexRecord::new("a1", "2"));
        assert_ne!(IndexRecord::new("a1", "1"), IndexRecord::new("a2", "1"));
    }
}
