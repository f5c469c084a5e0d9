//! Explicit cache schema descriptors.
//!
//! A schema names the single primary-key field and the secondary index
//! fields of a cacheable type, with an accessor closure and an optional
//! case-fold flag per index field. It is supplied statically by the caller
//! and resolved exactly once when a cache engine is constructed - never
//! recomputed per call.

use std::fmt;

use crate::error::SchemaError;

/// Accessor extracting a field's stringified value from a domain object.
pub type FieldAccessor<T> = Box<dyn Fn(&T) -> String + Send + Sync>;

/// A secondary index field: a name, a value accessor, and whether values
/// are case-folded before entering the shared-store namespace.
pub struct IndexField<T> {
    name: String,
    accessor: FieldAccessor<T>,
    case_fold: bool,
}

impl<T> IndexField<T> {
    /// Field name as it appears in the shared-store key namespace.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether values of this field are case-folded.
    pub fn case_fold(&self) -> bool {
        self.case_fold
    }

    /// Extract this field's namespace value from an object, folded if the
    /// field requires it.
    pub fn value_of(&self, object: &T) -> String {
        let value = (self.accessor)(object);
        if self.case_fold {
            value.to_lowercase()
        } else {
            value
        }
    }
}

impl<T> fmt::Debug for IndexField<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexField")
            .field("name", &self.name)
            .field("case_fold", &self.case_fold)
            .finish()
    }
}

/// Immutable cache schema for one cacheable type.
///
/// Holds the cache type name (the first segment of every shared-store key),
/// the primary-key field name, and the declared secondary index fields.
/// Built via [`CacheSchema::builder`]; construction fails fast unless
/// exactly one primary-key field was declared.
pub struct CacheSchema<T> {
    type_name: String,
    key_field: String,
    index_fields: Vec<IndexField<T>>,
}

impl<T> CacheSchema<T> {
    /// Start building a schema for the given cache type name.
    pub fn builder(type_name: impl Into<String>) -> SchemaBuilder<T> {
        SchemaBuilder {
            type_name: type_name.into(),
            key_fields: Vec::new(),
            index_fields: Vec::new(),
        }
    }

    /// The cache type name used as the shared-store key prefix.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The primary-key field name.
    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    /// The declared secondary index fields.
    pub fn index_fields(&self) -> &[IndexField<T>] {
        &self.index_fields
    }

    /// Normalize a lookup value for the given field.
    ///
    /// Case-folded index fields fold the query the same way published values
    /// are folded, so mixed-case lookups resolve. Values for the primary key
    /// or for fields this schema does not declare pass through unchanged.
    pub fn fold_lookup_value(&self, field_name: &str, value: &str) -> String {
        let folds = self
            .index_fields
            .iter()
            .any(|field| field.name == field_name && field.case_fold);
        if folds {
            value.to_lowercase()
        } else {
            value.to_string()
        }
    }
}

impl<T> fmt::Debug for CacheSchema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheSchema")
            .field("type_name", &self.type_name)
            .field("key_field", &self.key_field)
            .field("index_fields", &self.index_fields)
            .finish()
    }
}

/// Builder for [`CacheSchema`].
pub struct SchemaBuilder<T> {
    type_name: String,
    key_fields: Vec<String>,
    index_fields: Vec<IndexField<T>>,
}

impl<T> SchemaBuilder<T> {
    /// Declare the primary-key field. Must be called exactly once; the
    /// field's value is supplied at runtime by [`crate::Cacheable::id`].
    pub fn key(mut self, name: impl Into<String>) -> Self {
        self.key_fields.push(name.into());
        self
    }

    /// Declare a secondary index field.
    pub fn index<F>(self, name: impl Into<String>, accessor: F) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        self.index_inner(name.into(), Box::new(accessor), false)
    }

    /// Declare a secondary index field whose values are case-folded.
    pub fn index_case_fold<F>(self, name: impl Into<String>, accessor: F) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        self.index_inner(name.into(), Box::new(accessor), true)
    }

    fn index_inner(mut self, name: String, accessor: FieldAccessor<T>, case_fold: bool) -> Self {
        self.index_fields.push(IndexField {
            name,
            accessor,
            case_fold,
        });
        self
    }

    /// Validate and build the schema.
    ///
    /// # Errors
    ///
    /// - [`SchemaError::MissingKeyField`] when no primary key was declared
    /// - [`SchemaError::DuplicateKeyField`] when more than one was
    /// - [`SchemaError::DuplicateField`] when two fields share a name
    pub fn build(mut self) -> Result<CacheSchema<T>, SchemaError> {
        let key_field = match self.key_fields.len() {
            0 => {
                return Err(SchemaError::MissingKeyField {
                    type_name: self.type_name,
                })
            }
            1 => self.key_fields.remove(0),
            _ => {
                return Err(SchemaError::DuplicateKeyField {
                    first: self.key_fields.remove(0),
                    second: self.key_fields.remove(0),
                    type_name: self.type_name,
                })
            }
        };

        let mut seen = vec![key_field.clone()];
        for field in &self.index_fields {
            if seen.iter().any(|name| name == &field.name) {
                return Err(SchemaError::DuplicateField {
                    type_name: self.type_name,
                    name: field.name.clone(),
                });
            }
            seen.push(field.name.clone());
        }

        Ok(CacheSchema {
            type_name: self.type_name,
            key_field,
            index_fields: self.index_fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct Widget {
        serial: String,
        label: String,
    }

    fn widget_schema() -> CacheSchema<Widget> {
        CacheSchema::builder("Widget")
            .key("Serial")
            .index("Label", |w: &Widget| w.label.clone())
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_requires_a_key_field() {
        let result = CacheSchema::<Widget>::builder("Widget")
            .index("Label", |w: &Widget| w.label.clone())
            .build();
        assert_eq!(
            result.err(),
            Some(SchemaError::MissingKeyField {
                type_name: "Widget".to_string()
            })
        );
    }

    #[test]
    fn test_build_rejects_two_key_fields() {
        let result = CacheSchema::<Widget>::builder("Widget")
            .key("Serial")
            .key("Label")
            .build();
        assert!(matches!(
            result,
            Err(SchemaError::DuplicateKeyField { .. })
        ));
    }

    #[test]
    fn test_build_rejects_duplicate_field_names() {
        let result = CacheSchema::<Widget>::builder("Widget")
            .key("Serial")
            .index("Serial", |w: &Widget| w.serial.clone())
            .build();
        assert_eq!(
            result.err(),
            Some(SchemaError::DuplicateField {
                type_name: "Widget".to_string(),
                name: "Serial".to_string()
            })
        );
    }

    #[test]
    fn test_index_value_respects_case_fold() {
        let schema = CacheSchema::builder("Widget")
            .key("Serial")
            .index_case_fold("Label", |w: &Widget| w.label.clone())
            .build()
            .unwrap();

        let widget = Widget {
            serial: "s-1".to_string(),
            label: "Flux Capacitor".to_string(),
        };
        let field = &schema.index_fields()[0];
        assert_eq!(field.value_of(&widget), "flux capacitor");
    }

    #[test]
    fn test_fold_lookup_value_only_folds_declared_folding_fields() {
        let schema = CacheSchema::builder("Widget")
            .key("Serial")
            .index("Plain", |w: &Widget| w.label.clone())
            .index_case_fold("Folded", |w: &Widget| w.label.clone())
            .build()
            .unwrap();

        assert_eq!(schema.fold_lookup_value("Folded", "MiXeD"), "mixed");
        assert_eq!(schema.fold_lookup_value("Plain", "MiXeD"), "MiXeD");
        assert_eq!(schema.fold_lookup_value("Serial", "MiXeD"), "MiXeD");
        assert_eq!(schema.fold_lookup_value("Unknown", "MiXeD"), "MiXeD");
    }

    #[test]
    fn test_schema_accessors() {
        let schema = widget_schema();
        assert_eq!(schema.type_name(), "Widget");
        assert_eq!(schema.key_field(), "Serial");
        assert_eq!(schema.index_fields().len(), 1);
        assert_eq!(schema.index_fields()[0].name(), "Label");
        assert!(!schema.index_fields()[0].case_fold());
    }
}
