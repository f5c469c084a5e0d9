//! Shared-store key namespace for one cacheable type.
//!
//! Every key the engine writes or reads is a composite string
//! `<TypeName>.<FieldName>.<FieldValue>`, plus one reserved
//! `<TypeName>.ReloadAll` marker whose presence records that the type has
//! completed at least one full warm.

/// Suffix of the reserved warm-marker key.
const WARM_SUFFIX: &str = "ReloadAll";

/// Key formatter scoped to one cache type.
///
/// Resolved once from the type's schema when the engine is constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyspace {
    type_name: String,
    key_field: String,
    warm_marker: String,
    primary_pattern: String,
}

impl Keyspace {
    /// Build the keyspace for a type and its primary-key field name.
    pub fn new(type_name: &str, key_field: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            key_field: key_field.to_string(),
            warm_marker: format!("{type_name}.{WARM_SUFFIX}"),
            primary_pattern: format!("{type_name}.{key_field}.*"),
        }
    }

    /// Fully qualified key for any field/value pair:
    /// `<Type>.<Field>.<Value>`.
    pub fn field_key(&self, field: &str, value: &str) -> String {
        format!("{}.{}.{}", self.type_name, field, value)
    }

    /// Fully qualified key for a primary-key value.
    pub fn primary_key(&self, value: &str) -> String {
        self.field_key(&self.key_field, value)
    }

    /// The reserved warm-marker key.
    pub fn warm_marker(&self) -> &str {
        &self.warm_marker
    }

    /// Scan pattern covering every primary-key-namespaced key of this type.
    pub fn primary_pattern(&self) -> &str {
        &self.primary_pattern
    }
}
