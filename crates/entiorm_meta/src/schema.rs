//! Entity-level metadata and schemas.

use crate::column::ColumnMeta;
use crate::error::{MetaError, MetaResult};
use entiorm_codec::ValueKind;

/// Name of the identity field every entity carries.
pub const ID_FIELD: &str = "e_id";

/// Entity-level metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityMeta {
    /// Stable entity name, unique per backend.
    pub name: String,
    /// Schema version of the entity definition.
    pub version: u32,
}

impl EntityMeta {
    /// Creates entity metadata.
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

/// Entity metadata plus its declared columns.
///
/// The identity field [`ID_FIELD`] is implicit and never listed among the
/// columns.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySchema {
    meta: EntityMeta,
    columns: Vec<(String, ColumnMeta)>,
}

impl EntitySchema {
    /// Starts building a schema.
    pub fn builder(name: impl Into<String>, version: u32) -> EntitySchemaBuilder {
        EntitySchemaBuilder {
            meta: EntityMeta::new(name, version),
            columns: Vec::new(),
        }
    }

    pub(crate) fn from_parts(meta: EntityMeta, columns: Vec<(String, ColumnMeta)>) -> Self {
        Self { meta, columns }
    }

    /// Entity-level metadata.
    pub fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    /// Entity name.
    pub fn name(&self) -> &str {
        &self.meta.name
    }

    /// Declared columns in declaration order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &ColumnMeta)> {
        self.columns.iter().map(|(k, c)| (k.as_str(), c))
    }

    /// Number of declared columns, identity excluded.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Metadata of one column.
    pub fn column(&self, field: &str) -> Option<&ColumnMeta> {
        self.columns
            .iter()
            .find(|(k, _)| k == field)
            .map(|(_, c)| c)
    }

    /// Returns true if `field` is the identity field or a declared column.
    pub fn has_field(&self, field: &str) -> bool {
        field == ID_FIELD || self.column(field).is_some()
    }

    /// The value kind stored under `field`, if known.
    pub fn kind_of(&self, field: &str) -> Option<ValueKind> {
        if field == ID_FIELD {
            return Some(ValueKind::Text);
        }
        self.column(field)
            .and_then(|c| c.data_type)
            .map(|t| t.value_kind())
    }

    /// Checks every column, naming the first invalid one.
    pub fn check(&self) -> MetaResult<()> {
        for (field, column) in &self.columns {
            column.check().map_err(|violation| MetaError::InvalidColumn {
                entity: self.meta.name.clone(),
                field: field.clone(),
                violation,
            })?;
        }
        Ok(())
    }

    /// Returns true if every column is valid.
    pub fn is_valid(&self) -> bool {
        self.check().is_ok()
    }
}

/// Builder for [`EntitySchema`].
#[derive(Debug, Clone)]
pub struct EntitySchemaBuilder {
    meta: EntityMeta,
    columns: Vec<(String, ColumnMeta)>,
}

impl EntitySchemaBuilder {
    /// Declares a column. A repeated key replaces the earlier declaration.
    #[must_use]
    pub fn column(mut self, field: impl Into<String>, meta: ColumnMeta) -> Self {
        let field = field.into();
        match self.columns.iter_mut().find(|(k, _)| *k == field) {
            Some(slot) => slot.1 = meta,
            None => self.columns.push((field, meta)),
        }
        self
    }

    /// Finishes the schema without checking it.
    pub fn build(self) -> EntitySchema {
        EntitySchema::from_parts(self.meta, self.columns)
    }

    /// Finishes the schema, rejecting invalid columns and a column that
    /// shadows the identity field.
    pub fn try_build(self) -> MetaResult<EntitySchema> {
        if self.columns.iter().any(|(k, _)| k == ID_FIELD) {
            return Err(MetaError::DuplicateColumn {
                entity: self.meta.name,
                field: ID_FIELD.to_string(),
            });
        }
        let schema = self.build();
        schema.check()?;
        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{DataType, MetaViolation};

    fn person() -> EntitySchema {
        EntitySchema::builder("person", 1)
            .column("name", ColumnMeta::new(DataType::Text))
            .column("age", ColumnMeta::new(DataType::Int).nullable())
            .build()
    }

    #[test]
    fn columns_keep_declaration_order() {
        let schema = person();
        let keys: Vec<_> = schema.columns().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["name", "age"]);
    }

    #[test]
    fn identity_field_is_implicit() {
        let schema = person();
        assert!(schema.has_field(ID_FIELD));
        assert_eq!(schema.kind_of(ID_FIELD), Some(ValueKind::Text));
        assert_eq!(schema.kind_of("age"), Some(ValueKind::Integer));
        assert_eq!(schema.kind_of("unknown"), None);
    }

    #[test]
    fn try_build_rejects_invalid_column() {
        let err = EntitySchema::builder("broken", 1)
            .column("id", ColumnMeta::new(DataType::Uuid).primary_key().nullable())
            .try_build()
            .unwrap_err();
        assert_eq!(
            err,
            MetaError::InvalidColumn {
                entity: "broken".into(),
                field: "id".into(),
                violation: MetaViolation::NullablePrimaryKey,
            }
        );
    }

    #[test]
    fn try_build_rejects_identity_shadowing() {
        let result = EntitySchema::builder("shadow", 1)
            .column(ID_FIELD, ColumnMeta::new(DataType::Text))
            .try_build();
        assert!(matches!(result, Err(MetaError::DuplicateColumn { .. })));
    }

    #[test]
    fn redeclared_column_replaces() {
        let schema = EntitySchema::builder("x", 1)
            .column("a", ColumnMeta::new(DataType::Text))
            .column("a", ColumnMeta::new(DataType::Long))
            .build();
        assert_eq!(schema.column_count(), 1);
        assert_eq!(schema.column("a").unwrap().data_type, Some(DataType::Long));
    }
}
