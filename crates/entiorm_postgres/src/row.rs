//! Conversions between [`Value`]s and PostgreSQL parameters and rows.

use chrono::{DateTime, NaiveDateTime, Utc};
use entiorm_codec::{Record, Value};
use entiorm_meta::{DataType, ID_FIELD};
use entiorm_storage::{EntityConfig, RawQuery, StorageError, StorageResult};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row, TypeInfo};
use uuid::Uuid;

/// Builds an executable query from generated SQL and its parameters.
pub(crate) fn prepare(raw: &RawQuery) -> Query<'_, Postgres, PgArguments> {
    raw.params
        .iter()
        .fold(sqlx::query(&raw.exec), |query, value| bind_value(query, value))
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &Value,
) -> Query<'q, Postgres, PgArguments> {
    match value.clone() {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(b),
        Value::Integer(i) => query.bind(i),
        Value::Float(f) => query.bind(f),
        Value::Text(s) => query.bind(s),
        Value::Bytes(b) => query.bind(b),
        Value::Json(j) => query.bind(j),
        Value::Timestamp(t) => query.bind(t),
    }
}

fn decode_failed(column: &str, source: sqlx::Error) -> StorageError {
    StorageError::backend(format!("failed to decode column {column}"), source)
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> StorageResult<Option<T>>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get::<Option<T>, _>(column)
        .map_err(|e| decode_failed(column, e))
}

/// Decodes a column whose declared type is known.
fn typed_value(row: &PgRow, column: &str, data_type: Option<DataType>) -> StorageResult<Value> {
    let value = match data_type {
        Some(DataType::Int | DataType::Serial) => get::<i32>(row, column)?.map(Value::from),
        Some(DataType::Long) => get::<i64>(row, column)?.map(Value::from),
        Some(DataType::Float | DataType::Double) => get::<f64>(row, column)?.map(Value::from),
        Some(DataType::Text | DataType::String) | None => {
            get::<String>(row, column)?.map(Value::from)
        }
        Some(DataType::Blob) => get::<Vec<u8>>(row, column)?.map(Value::from),
        Some(DataType::Boolean) => get::<bool>(row, column)?.map(Value::from),
        Some(DataType::Json) => get::<serde_json::Value>(row, column)?.map(Value::Json),
        Some(DataType::Date) => get::<DateTime<Utc>>(row, column)?.map(Value::from),
        Some(DataType::Uuid) => get::<Uuid>(row, column)?.map(|u| Value::from(u.to_string())),
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Decodes an entity row selected with [`crate::sql::select_columns`].
pub(crate) fn entity_record(config: &EntityConfig, row: &PgRow) -> StorageResult<Record> {
    let mut record = Record::new();
    record.insert(ID_FIELD, typed_value(row, ID_FIELD, Some(DataType::Text))?);
    for (field, column) in config.schema().columns() {
        record.insert(field, typed_value(row, field, column.data_type)?);
    }
    Ok(record)
}

/// Decodes an arbitrary row by the server-reported column types.
pub(crate) fn dynamic_record(row: &PgRow) -> StorageResult<Record> {
    let mut record = Record::new();
    for column in row.columns() {
        let name = column.name();
        let value = match column.type_info().name() {
            "BOOL" => get::<bool>(row, name)?.map(Value::from),
            "INT2" => get::<i16>(row, name)?.map(|v| Value::from(i64::from(v))),
            "INT4" => get::<i32>(row, name)?.map(Value::from),
            "INT8" => get::<i64>(row, name)?.map(Value::from),
            "FLOAT4" => get::<f32>(row, name)?.map(Value::from),
            "FLOAT8" => get::<f64>(row, name)?.map(Value::from),
            "BYTEA" => get::<Vec<u8>>(row, name)?.map(Value::from),
            "JSON" | "JSONB" => get::<serde_json::Value>(row, name)?.map(Value::Json),
            "TIMESTAMPTZ" => get::<DateTime<Utc>>(row, name)?.map(Value::from),
            "TIMESTAMP" => get::<NaiveDateTime>(row, name)?.map(|t| Value::from(t.and_utc())),
            "UUID" => get::<Uuid>(row, name)?.map(|u| Value::from(u.to_string())),
            "VOID" => None,
            _ => get::<String>(row, name)?.map(Value::from),
        };
        record.insert(name, value.unwrap_or(Value::Null));
    }
    Ok(record)
}
