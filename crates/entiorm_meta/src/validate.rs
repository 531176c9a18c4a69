//! Record shape validation.
//!
//! Cross-checks a [`Record`] built from manual or external data against the
//! metadata of its entity. Validation never mutates the record; callers
//! decide whether to reject the write.

use crate::column::DataType;
use crate::schema::{EntitySchema, ID_FIELD};
use entiorm_codec::{Record, Value, ValueKind};
use std::fmt;
use thiserror::Error;

/// How much of a record is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// A whole entity: every declared column must be present.
    Full,
    /// A partial update: only the present fields are checked.
    Patch,
}

/// One problem found in a record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldIssue {
    /// The field is not declared by the entity.
    Unknown {
        /// Field key.
        field: String,
    },
    /// A declared column is absent.
    Missing {
        /// Field key.
        field: String,
    },
    /// Null in a column that does not accept it.
    NullNotAllowed {
        /// Field key.
        field: String,
    },
    /// The value kind does not fit the column type.
    WrongType {
        /// Field key.
        field: String,
        /// Declared column type.
        expected: DataType,
        /// Kind actually found.
        found: ValueKind,
    },
    /// A uuid column holds text that is not a UUID.
    MalformedUuid {
        /// Field key.
        field: String,
    },
    /// The identity field is missing or not text.
    BadIdentity,
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldIssue::Unknown { field } => write!(f, "unknown field {field}"),
            FieldIssue::Missing { field } => write!(f, "missing field {field}"),
            FieldIssue::NullNotAllowed { field } => write!(f, "{field} cannot be null"),
            FieldIssue::WrongType {
                field,
                expected,
                found,
            } => write!(f, "{field} expects {expected}, found {found}"),
            FieldIssue::MalformedUuid { field } => write!(f, "{field} is not a valid uuid"),
            FieldIssue::BadIdentity => write!(f, "{ID_FIELD} must be a text identity"),
        }
    }
}

/// A record that does not match its entity metadata.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{entity} record failed validation: {}", render(.issues))]
pub struct ValidationError {
    /// Entity name.
    pub entity: String,
    /// Every problem found, in field order.
    pub issues: Vec<FieldIssue>,
}

fn render(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Returns true if `value` may be stored in a column of `data_type`.
///
/// Integers are accepted by float columns.
#[must_use]
pub fn fits(data_type: DataType, value: &Value) -> bool {
    match (data_type.value_kind(), value) {
        (ValueKind::Float, Value::Integer(_)) => true,
        (kind, value) => value.kind() == kind,
    }
}

/// Checks `record` against `schema`.
pub fn validate_record(
    schema: &EntitySchema,
    record: &Record,
    shape: Shape,
) -> Result<(), ValidationError> {
    let mut issues = Vec::new();

    match record.get(ID_FIELD) {
        Some(Value::Text(_)) => {}
        None if shape == Shape::Patch => {}
        _ => issues.push(FieldIssue::BadIdentity),
    }

    for (field, value) in record.iter() {
        if field == ID_FIELD {
            continue;
        }
        let Some(column) = schema.column(field) else {
            issues.push(FieldIssue::Unknown {
                field: field.clone(),
            });
            continue;
        };
        if value.is_null() {
            if !column.can_be_null {
                issues.push(FieldIssue::NullNotAllowed {
                    field: field.clone(),
                });
            }
            continue;
        }
        let Some(data_type) = column.data_type else {
            continue;
        };
        if !fits(data_type, value) {
            issues.push(FieldIssue::WrongType {
                field: field.clone(),
                expected: data_type,
                found: value.kind(),
            });
        } else if data_type == DataType::Uuid
            && value
                .as_text()
                .is_some_and(|s| uuid::Uuid::parse_str(s).is_err())
        {
            issues.push(FieldIssue::MalformedUuid {
                field: field.clone(),
            });
        }
    }

    if shape == Shape::Full {
        for (field, column) in schema.columns() {
            if !record.contains(field) && !column.can_be_null && column.data_type != Some(DataType::Serial) {
                issues.push(FieldIssue::Missing {
                    field: field.to_string(),
                });
            }
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationError {
            entity: schema.name().to_string(),
            issues,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnMeta;

    fn schema() -> EntitySchema {
        EntitySchema::builder("account", 1)
            .column("name", ColumnMeta::new(DataType::Text))
            .column("balance", ColumnMeta::new(DataType::Double))
            .column("owner", ColumnMeta::new(DataType::Uuid).nullable())
            .column("seq", ColumnMeta::new(DataType::Serial))
            .build()
    }

    fn valid() -> Record {
        Record::new()
            .with(ID_FIELD, "a1")
            .with("name", "main")
            .with("balance", 10i64)
            .with("owner", "67e55044-10b1-426f-9247-bb680e5fe0c8")
    }

    #[test]
    fn valid_record_passes() {
        assert_eq!(validate_record(&schema(), &valid(), Shape::Full), Ok(()));
    }

    #[test]
    fn nullable_column_may_be_absent_or_null() {
        let mut record = valid();
        record.insert("owner", Value::Null);
        assert!(validate_record(&schema(), &record, Shape::Full).is_ok());
        record.remove("owner");
        assert!(validate_record(&schema(), &record, Shape::Full).is_ok());
    }

    #[test]
    fn collects_every_issue() {
        let record = Record::new()
            .with(ID_FIELD, "a1")
            .with("balance", "lots")
            .with("owner", "not-a-uuid")
            .with("color", "red");

        let err = validate_record(&schema(), &record, Shape::Full).unwrap_err();
        assert_eq!(err.entity, "account");
        assert_eq!(
            err.issues,
            vec![
                FieldIssue::WrongType {
                    field: "balance".into(),
                    expected: DataType::Double,
                    found: ValueKind::Text,
                },
                FieldIssue::Unknown {
                    field: "color".into()
                },
                FieldIssue::MalformedUuid {
                    field: "owner".into()
                },
                FieldIssue::Missing {
                    field: "name".into()
                },
            ]
        );
    }

    #[test]
    fn patch_checks_only_present_fields() {
        let patch = Record::new().with("name", "renamed");
        assert!(validate_record(&schema(), &patch, Shape::Patch).is_ok());

        let patch = Record::new().with("name", Value::Null);
        let err = validate_record(&schema(), &patch, Shape::Patch).unwrap_err();
        assert_eq!(
            err.issues,
            vec![FieldIssue::NullNotAllowed {
                field: "name".into()
            }]
        );
    }

    #[test]
    fn full_record_needs_identity() {
        let mut record = valid();
        record.remove(ID_FIELD);
        let err = validate_record(&schema(), &record, Shape::Full).unwrap_err();
        assert_eq!(err.issues, vec![FieldIssue::BadIdentity]);
    }

    #[test]
    fn error_message_lists_issues() {
        let err = validate_record(&schema(), &Record::new().with(ID_FIELD, "x"), Shape::Full)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "account record failed validation: missing field name; missing field balance"
        );
    }
}
