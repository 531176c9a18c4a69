//! Column metadata.

use entiorm_codec::ValueKind;
use std::fmt;
use thiserror::Error;

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// 32-bit integer.
    Int,
    /// 64-bit integer.
    Long,
    /// Single precision float.
    Float,
    /// Double precision float.
    Double,
    /// Unbounded text.
    Text,
    /// Short string.
    String,
    /// Binary data.
    Blob,
    /// Boolean.
    Boolean,
    /// JSON document.
    Json,
    /// Timestamp.
    Date,
    /// UUID stored as text.
    Uuid,
    /// Auto-incrementing integer.
    Serial,
}

impl DataType {
    /// All data types, in declaration order.
    pub const ALL: [DataType; 12] = [
        DataType::Int,
        DataType::Long,
        DataType::Float,
        DataType::Double,
        DataType::Text,
        DataType::String,
        DataType::Blob,
        DataType::Boolean,
        DataType::Json,
        DataType::Date,
        DataType::Uuid,
        DataType::Serial,
    ];

    /// The value kind a column of this type holds.
    #[must_use]
    pub const fn value_kind(self) -> ValueKind {
        match self {
            DataType::Int | DataType::Long | DataType::Serial => ValueKind::Integer,
            DataType::Float | DataType::Double => ValueKind::Float,
            DataType::Text | DataType::String | DataType::Uuid => ValueKind::Text,
            DataType::Blob => ValueKind::Bytes,
            DataType::Boolean => ValueKind::Bool,
            DataType::Json => ValueKind::Json,
            DataType::Date => ValueKind::Timestamp,
        }
    }

    /// Returns true if a foreign key may reference through this type.
    #[must_use]
    pub const fn allows_foreign_key(self) -> bool {
        !matches!(
            self,
            DataType::Float | DataType::Double | DataType::Blob | DataType::Boolean
        )
    }

    /// Lowercase name as used in declarations.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            DataType::Int => "int",
            DataType::Long => "long",
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::Text => "text",
            DataType::String => "string",
            DataType::Blob => "blob",
            DataType::Boolean => "boolean",
            DataType::Json => "json",
            DataType::Date => "date",
            DataType::Uuid => "uuid",
            DataType::Serial => "serial",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reference from a column to a key of another relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForeignKey {
    /// Referenced column.
    pub target_key: String,
    /// Referenced relation (entity name).
    pub target_relation: String,
    /// Schema of the referenced relation, when it differs from the owner's.
    pub schema: Option<String>,
}

impl ForeignKey {
    /// Creates a foreign key to `relation.key`.
    pub fn new(target_key: impl Into<String>, target_relation: impl Into<String>) -> Self {
        Self {
            target_key: target_key.into(),
            target_relation: target_relation.into(),
            schema: None,
        }
    }

    /// Sets the referenced schema.
    #[must_use]
    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }
}

/// Properties of one entity field.
///
/// Built with [`ColumnMeta::new`] and the chained setters:
///
/// ```
/// use entiorm_meta::{ColumnMeta, DataType, ForeignKey};
///
/// let owner = ColumnMeta::new(DataType::Uuid).foreign_key(ForeignKey::new("e_id", "user"));
/// assert!(owner.is_valid());
///
/// let broken = ColumnMeta::new(DataType::Text).nullable().primary_key();
/// assert!(!broken.is_valid());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ColumnMeta {
    /// Part of the primary key.
    pub primary_key: bool,
    /// Values must be unique across rows.
    pub unique: bool,
    /// Null is an acceptable value.
    pub can_be_null: bool,
    /// Storage type. Optional only so that invalid declarations can be
    /// represented and rejected.
    pub data_type: Option<DataType>,
    /// Reference to another relation.
    pub foreign_key: Option<ForeignKey>,
}

impl ColumnMeta {
    /// A non-null, non-key column of the given type.
    #[must_use]
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type: Some(data_type),
            ..Self::default()
        }
    }

    /// Marks the column as primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Marks the column as unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Allows null values.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.can_be_null = true;
        self
    }

    /// Adds a foreign key.
    #[must_use]
    pub fn foreign_key(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_key = Some(foreign_key);
        self
    }

    /// Checks the column invariants, naming the first one broken.
    pub fn check(&self) -> Result<(), MetaViolation> {
        if self.can_be_null && self.data_type.is_none() {
            return Err(MetaViolation::NullableWithoutType);
        }
        if self.can_be_null && self.primary_key {
            return Err(MetaViolation::NullablePrimaryKey);
        }
        if let (Some(_), Some(data_type)) = (&self.foreign_key, self.data_type) {
            if !data_type.allows_foreign_key() {
                return Err(MetaViolation::ForeignKeyOnType(data_type));
            }
        }
        Ok(())
    }

    /// Returns true if the column invariants hold.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.check().is_ok()
    }
}

/// A broken column invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MetaViolation {
    /// `can_be_null` set without a data type.
    #[error("nullable column must declare a data type")]
    NullableWithoutType,
    /// `can_be_null` and `primary_key` both set.
    #[error("primary key column cannot be nullable")]
    NullablePrimaryKey,
    /// Foreign key on a type that cannot carry one.
    #[error("foreign key not allowed on {0} column")]
    ForeignKeyOnType(DataType),
}

/// Checks column properties, returning the first rule they break.
pub fn check_column_meta(props: &ColumnMeta) -> Result<(), MetaViolation> {
    props.check()
}

/// Validates column properties.
///
/// Rejects nullable columns without a type, nullable primary keys and
/// foreign keys on float, double, blob or boolean columns.
#[must_use]
pub fn validate_column_meta(props: &ColumnMeta) -> bool {
    props.is_valid()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nullable_requires_type() {
        let props = ColumnMeta {
            can_be_null: true,
            ..ColumnMeta::default()
        };
        assert_eq!(props.check(), Err(MetaViolation::NullableWithoutType));
        assert!(!validate_column_meta(&props));
    }

    #[test]
    fn nullable_primary_key_rejected() {
        let props = ColumnMeta::new(DataType::Uuid).primary_key().nullable();
        assert_eq!(check_column_meta(&props), Err(MetaViolation::NullablePrimaryKey));
    }

    #[test]
    fn foreign_key_type_restrictions() {
        for data_type in DataType::ALL {
            let props = ColumnMeta::new(data_type).foreign_key(ForeignKey::new("e_id", "other"));
            let forbidden = matches!(
                data_type,
                DataType::Float | DataType::Double | DataType::Blob | DataType::Boolean
            );
            assert_eq!(validate_column_meta(&props), !forbidden, "{data_type}");
        }
    }

    #[test]
    fn untyped_non_null_column_is_accepted() {
        assert!(validate_column_meta(&ColumnMeta::default()));
    }

    #[test]
    fn value_kinds() {
        assert_eq!(DataType::Serial.value_kind(), ValueKind::Integer);
        assert_eq!(DataType::Uuid.value_kind(), ValueKind::Text);
        assert_eq!(DataType::Date.value_kind(), ValueKind::Timestamp);
    }
}
