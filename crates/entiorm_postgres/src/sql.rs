//! SQL generation.
//!
//! Every statement is built as text plus an ordered parameter list. Values
//! are never spliced into the text: each one becomes a `$n::TYPE`
//! placeholder, and every identifier is checked by [`quote_ident`] before
//! it is quoted.
//!
//! Each entity table carries a hidden `e_seq BIGSERIAL` column next to the
//! `e_id` primary key. It records insertion order, which is the sequence
//! order queries see.

use entiorm_codec::{Record, Value, ValueKind};
use entiorm_meta::{DataType, ID_FIELD};
use entiorm_storage::{
    Direction, EntityConfig, Predicate, PredicateMode, Query, RawQuery, SearchTerm, StorageError,
    StorageResult, INSTALL_UID_KEY,
};

/// Hidden insertion-order column of every entity table.
pub const SEQ_COLUMN: &str = "e_seq";

/// Name of the key/value config table.
pub const CONFIG_TABLE: &str = "config";

const MAX_IDENT_LEN: usize = 63;

/// Returns true if `name` matches `[A-Za-z_][A-Za-z0-9_]*` and fits in a
/// PostgreSQL identifier.
#[must_use]
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= MAX_IDENT_LEN && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validates and double-quotes an identifier.
///
/// # Errors
///
/// Returns [`StorageError::InvalidIdentifier`] for anything but a plain
/// identifier.
pub fn quote_ident(name: &str) -> StorageResult<String> {
    if is_identifier(name) {
        Ok(format!("\"{name}\""))
    } else {
        Err(StorageError::InvalidIdentifier {
            ident: name.to_string(),
        })
    }
}

/// `"schema"."table"`.
pub fn qualified(schema: &str, table: &str) -> StorageResult<String> {
    Ok(format!("{}.{}", quote_ident(schema)?, quote_ident(table)?))
}

/// Column type used in `CREATE TABLE`.
#[must_use]
pub const fn column_type(data_type: Option<DataType>) -> &'static str {
    match data_type {
        Some(DataType::Int) => "INTEGER",
        Some(DataType::Long) => "BIGINT",
        Some(DataType::Float | DataType::Double) => "DOUBLE PRECISION",
        Some(DataType::Text) | None => "TEXT",
        Some(DataType::String) => "VARCHAR(255)",
        Some(DataType::Blob) => "BYTEA",
        Some(DataType::Boolean) => "BOOLEAN",
        Some(DataType::Json) => "JSONB",
        Some(DataType::Date) => "TIMESTAMPTZ",
        Some(DataType::Uuid) => "UUID",
        Some(DataType::Serial) => "SERIAL",
    }
}

/// Type a placeholder is cast to when it is written into a column.
#[must_use]
pub const fn cast_type(data_type: Option<DataType>) -> &'static str {
    match data_type {
        Some(DataType::Serial) => "INTEGER",
        Some(DataType::String) => "VARCHAR",
        other => column_type(other),
    }
}

/// Type a placeholder is cast to when it is compared, from the value itself.
const fn value_cast(kind: ValueKind) -> &'static str {
    match kind {
        ValueKind::Null | ValueKind::Text => "TEXT",
        ValueKind::Bool => "BOOLEAN",
        ValueKind::Integer => "BIGINT",
        ValueKind::Float => "DOUBLE PRECISION",
        ValueKind::Bytes => "BYTEA",
        ValueKind::Json => "JSONB",
        ValueKind::Timestamp => "TIMESTAMPTZ",
    }
}

/// Declared type of a field; `None` if the entity has no such field.
fn field_type(config: &EntityConfig, field: &str) -> Option<Option<DataType>> {
    if field == ID_FIELD {
        return Some(Some(DataType::Text));
    }
    config.schema().column(field).map(|c| c.data_type)
}

/// Text builder that numbers placeholders as values are bound.
#[derive(Debug, Default)]
struct SqlBuilder {
    sql: String,
    params: Vec<Value>,
}

impl SqlBuilder {
    fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    fn push(&mut self, text: &str) -> &mut Self {
        self.sql.push_str(text);
        self
    }

    fn push_bind(&mut self, value: Value, cast: &str) -> &mut Self {
        self.params.push(value);
        self.sql.push_str(&format!("${}::{cast}", self.params.len()));
        self
    }

    fn build(self) -> RawQuery {
        RawQuery {
            exec: self.sql,
            params: self.params,
        }
    }
}

/// Returns true if a raw statement produces a result set.
///
/// Queries and statements with a `RETURNING` clause are fetched; everything
/// else is executed and reports its affected row count.
#[must_use]
pub fn returns_rows(statement: &str) -> bool {
    let upper = statement.trim_start().to_ascii_uppercase();
    ["SELECT", "WITH", "VALUES", "SHOW", "TABLE"]
        .iter()
        .any(|kw| upper.starts_with(kw))
        || upper.contains(" RETURNING ")
}

/// Comma-separated, quoted list of the identity and every declared column.
pub fn select_columns(config: &EntityConfig) -> StorageResult<String> {
    let mut columns = vec![quote_ident(ID_FIELD)?];
    for (field, _) in config.schema().columns() {
        columns.push(quote_ident(field)?);
    }
    Ok(columns.join(", "))
}

/// `CREATE SCHEMA` for the backend schema.
pub fn create_schema(schema: &str) -> StorageResult<RawQuery> {
    Ok(RawQuery::new(format!(
        "CREATE SCHEMA IF NOT EXISTS {}",
        quote_ident(schema)?
    )))
}

/// `CREATE TABLE` for the config store.
pub fn create_config_table(schema: &str) -> StorageResult<RawQuery> {
    Ok(RawQuery::new(format!(
        "CREATE TABLE IF NOT EXISTS {} (c_key TEXT PRIMARY KEY, c_value TEXT NOT NULL)",
        qualified(schema, CONFIG_TABLE)?
    )))
}

/// Scripts run once when the schema is created.
pub fn bootstrap(schema: &str, install_uid: &str) -> StorageResult<Vec<RawQuery>> {
    let seed = RawQuery::new(format!(
        "INSERT INTO {} (c_key, c_value) VALUES ($1::TEXT, $2::TEXT) ON CONFLICT (c_key) DO NOTHING",
        qualified(schema, CONFIG_TABLE)?
    ))
    .bind(INSTALL_UID_KEY)
    .bind(install_uid);
    Ok(vec![create_schema(schema)?, create_config_table(schema)?, seed])
}

/// Checks whether a schema exists.
#[must_use]
pub fn schema_exists(schema: &str) -> RawQuery {
    RawQuery::new("SELECT 1 FROM information_schema.schemata WHERE schema_name = $1::TEXT")
        .bind(schema)
}

/// Reads one config value.
pub fn get_config(schema: &str, key: &str) -> StorageResult<RawQuery> {
    Ok(RawQuery::new(format!(
        "SELECT c_value FROM {} WHERE c_key = $1::TEXT",
        qualified(schema, CONFIG_TABLE)?
    ))
    .bind(key))
}

/// Upserts one config value.
pub fn set_config(schema: &str, key: &str, value: &str) -> StorageResult<RawQuery> {
    Ok(RawQuery::new(format!(
        "INSERT INTO {} (c_key, c_value) VALUES ($1::TEXT, $2::TEXT) \
         ON CONFLICT (c_key) DO UPDATE SET c_value = EXCLUDED.c_value",
        qualified(schema, CONFIG_TABLE)?
    ))
    .bind(key)
    .bind(value))
}

/// Deletes one config value.
pub fn remove_config(schema: &str, key: &str) -> StorageResult<RawQuery> {
    Ok(RawQuery::new(format!(
        "DELETE FROM {} WHERE c_key = $1::TEXT",
        qualified(schema, CONFIG_TABLE)?
    ))
    .bind(key))
}

/// `CREATE TABLE` for one entity class.
pub fn create_table(schema: &str, config: &EntityConfig) -> StorageResult<RawQuery> {
    let mut defs = vec![
        format!("{} BIGSERIAL", quote_ident(SEQ_COLUMN)?),
        format!("{} TEXT PRIMARY KEY", quote_ident(ID_FIELD)?),
    ];

    for (field, column) in config.schema().columns() {
        let mut def = format!("{} {}", quote_ident(field)?, column_type(column.data_type));
        if !column.can_be_null {
            def.push_str(" NOT NULL");
        }
        if column.unique || column.primary_key {
            def.push_str(" UNIQUE");
        }
        if let Some(fk) = &column.foreign_key {
            let target_schema = fk.schema.as_deref().unwrap_or(schema);
            def.push_str(&format!(
                " REFERENCES {} ({})",
                qualified(target_schema, &fk.target_relation.to_lowercase())?,
                quote_ident(&fk.target_key)?
            ));
        }
        defs.push(def);
    }

    Ok(RawQuery::new(format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        qualified(schema, config.table())?,
        defs.join(", ")
    )))
}

/// Inserts a record, doing nothing when the identity is taken.
pub fn insert(schema: &str, config: &EntityConfig, record: &Record) -> StorageResult<RawQuery> {
    let mut columns = Vec::with_capacity(record.len());
    let mut placeholders = SqlBuilder::default();
    for (i, (field, value)) in record.iter().enumerate() {
        let data_type = field_type(config, field).ok_or_else(|| {
            StorageError::invalid_record(format!(
                "{} has no column {field}",
                config.class_name()
            ))
        })?;
        columns.push(quote_ident(field)?);
        if i > 0 {
            placeholders.push(", ");
        }
        placeholders.push_bind(value.clone(), cast_type(data_type));
    }

    let SqlBuilder { sql: values, params } = placeholders;
    Ok(RawQuery {
        exec: format!(
            "INSERT INTO {} ({}) VALUES ({values}) ON CONFLICT ({}) DO NOTHING",
            qualified(schema, config.table())?,
            columns.join(", "),
            quote_ident(ID_FIELD)?
        ),
        params,
    })
}

/// Patches one record. An empty patch still reports whether the id exists.
pub fn update(
    schema: &str,
    config: &EntityConfig,
    id: &str,
    patch: &Record,
) -> StorageResult<RawQuery> {
    let id_col = quote_ident(ID_FIELD)?;
    let mut builder = SqlBuilder::new(format!(
        "UPDATE {} SET ",
        qualified(schema, config.table())?
    ));

    if patch.is_empty() {
        builder.push(&format!("{id_col} = {id_col}"));
    }
    for (i, (field, value)) in patch.iter().enumerate() {
        let data_type = field_type(config, field).ok_or_else(|| {
            StorageError::invalid_record(format!(
                "{} has no column {field}",
                config.class_name()
            ))
        })?;
        if i > 0 {
            builder.push(", ");
        }
        builder
            .push(&format!("{} = ", quote_ident(field)?))
            .push_bind(value.clone(), cast_type(data_type));
    }

    builder
        .push(&format!(" WHERE {id_col} = "))
        .push_bind(Value::from(id), "TEXT");
    Ok(builder.build())
}

/// Reads one record by identity.
pub fn select_by_id(schema: &str, config: &EntityConfig, id: &str) -> StorageResult<RawQuery> {
    let mut builder = SqlBuilder::new(format!(
        "SELECT {} FROM {} WHERE {} = ",
        select_columns(config)?,
        qualified(schema, config.table())?,
        quote_ident(ID_FIELD)?
    ));
    builder.push_bind(Value::from(id), "TEXT");
    Ok(builder.build())
}

/// Deletes one record by identity.
pub fn delete_by_id(schema: &str, table: &str, id: &str) -> StorageResult<RawQuery> {
    let mut builder = SqlBuilder::new(format!(
        "DELETE FROM {} WHERE {} = ",
        qualified(schema, table)?,
        quote_ident(ID_FIELD)?
    ));
    builder.push_bind(Value::from(id), "TEXT");
    Ok(builder.build())
}

/// Lists records matching a query.
///
/// Field terms are OR-ed; the predicates of one `AllOf` term are AND-ed.
pub fn select_list(schema: &str, config: &EntityConfig, query: &Query) -> StorageResult<RawQuery> {
    let mut builder = SqlBuilder::new(format!(
        "SELECT {} FROM {}",
        select_columns(config)?,
        qualified(schema, config.table())?
    ));

    for (i, (field, term)) in query.search.iter().enumerate() {
        builder.push(if i == 0 { " WHERE (" } else { " OR (" });
        push_term(&mut builder, config, field, term)?;
        builder.push(")");
    }

    builder.push(" ORDER BY ");
    push_order(&mut builder, config, query)?;

    if let Some(limit) = query.limit {
        builder.push(&format!(" LIMIT {limit}"));
    }
    if let Some(offset) = query.offset {
        builder.push(&format!(" OFFSET {offset}"));
    }
    Ok(builder.build())
}

/// First record equal on every field of `partial`.
pub fn find(schema: &str, config: &EntityConfig, partial: &Record) -> StorageResult<RawQuery> {
    let mut builder = SqlBuilder::new(format!(
        "SELECT {} FROM {}",
        select_columns(config)?,
        qualified(schema, config.table())?
    ));
    for (i, (field, value)) in partial.iter().enumerate() {
        builder.push(if i == 0 { " WHERE " } else { " AND " });
        push_predicate(&mut builder, config, field, PredicateMode::Equals, value)?;
    }
    builder.push(&format!(" ORDER BY {} ASC LIMIT 1", quote_ident(SEQ_COLUMN)?));
    Ok(builder.build())
}

fn push_term(
    builder: &mut SqlBuilder,
    config: &EntityConfig,
    field: &str,
    term: &SearchTerm,
) -> StorageResult<()> {
    match term {
        SearchTerm::Exact(value) => {
            push_predicate(builder, config, field, PredicateMode::Equals, value)
        }
        SearchTerm::Predicate(Predicate { mode, value }) => {
            push_predicate(builder, config, field, *mode, value)
        }
        SearchTerm::AllOf(predicates) if predicates.is_empty() => {
            builder.push("TRUE");
            Ok(())
        }
        SearchTerm::AllOf(predicates) => {
            for (i, predicate) in predicates.iter().enumerate() {
                builder.push(if i == 0 { "(" } else { " AND (" });
                push_predicate(builder, config, field, predicate.mode, &predicate.value)?;
                builder.push(")");
            }
            Ok(())
        }
    }
}

/// Emits one comparison. Fields the entity does not declare never match,
/// and neither do values whose kind the column cannot hold.
fn push_predicate(
    builder: &mut SqlBuilder,
    config: &EntityConfig,
    field: &str,
    mode: PredicateMode,
    value: &Value,
) -> StorageResult<()> {
    let Some(data_type) = field_type(config, field) else {
        builder.push("FALSE");
        return Ok(());
    };

    let column_kind = data_type.map_or(ValueKind::Text, DataType::value_kind);
    let numeric = |k: ValueKind| matches!(k, ValueKind::Integer | ValueKind::Float);
    let comparable = value.kind() == column_kind || (numeric(value.kind()) && numeric(column_kind));

    let mut expr = quote_ident(field)?;
    if data_type == Some(DataType::Uuid) {
        expr.push_str("::text");
    }
    let cast = value_cast(value.kind());

    match mode {
        PredicateMode::Equals if value.is_null() => {
            builder.push(&format!("{expr} IS NULL"));
        }
        PredicateMode::Not if value.is_null() => {
            builder.push(&format!("{expr} IS NOT NULL"));
        }
        PredicateMode::Equals if comparable => {
            builder.push(&format!("{expr} = ")).push_bind(value.clone(), cast);
        }
        PredicateMode::Not if comparable => {
            builder
                .push(&format!("{expr} IS DISTINCT FROM "))
                .push_bind(value.clone(), cast);
        }
        PredicateMode::Not => {
            builder.push("TRUE");
        }
        PredicateMode::Like if comparable && column_kind == ValueKind::Text => {
            builder
                .push(&format!("strpos({expr}, "))
                .push_bind(value.clone(), cast)
                .push(") > 0");
        }
        PredicateMode::SmallerThan if comparable && numeric(column_kind) => {
            builder.push(&format!("{expr} < ")).push_bind(value.clone(), cast);
        }
        PredicateMode::GreaterThan if comparable && numeric(column_kind) => {
            builder.push(&format!("{expr} > ")).push_bind(value.clone(), cast);
        }
        _ => {
            builder.push("FALSE");
        }
    }
    Ok(())
}

fn push_order(builder: &mut SqlBuilder, config: &EntityConfig, query: &Query) -> StorageResult<()> {
    let seq = quote_ident(SEQ_COLUMN)?;
    let Some(order) = query.primary_order() else {
        builder.push(&format!("{seq} ASC"));
        return Ok(());
    };
    let (dir, nulls) = match order.direction {
        Direction::Asc => ("ASC", "NULLS FIRST"),
        Direction::Desc => ("DESC", "NULLS LAST"),
    };

    if order.key != ID_FIELD && field_type(config, &order.key).is_some() {
        builder.push(&format!("{} {dir} {nulls}, ", quote_ident(&order.key)?));
    }
    builder.push(&format!("{seq} {dir}"));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use entiorm_meta::{ColumnMeta, EntitySchema, ForeignKey};

    fn user() -> EntityConfig {
        EntityConfig::new(
            EntitySchema::builder("User", 1)
                .column("name", ColumnMeta::new(DataType::String).unique())
                .column("age", ColumnMeta::new(DataType::Int).nullable())
                .column("owner", ColumnMeta::new(DataType::Uuid).nullable())
                .build(),
        )
    }

    #[test]
    fn identifier_rules() {
        assert!(is_identifier("user_2"));
        assert!(is_identifier("_hidden"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("2fast"));
        assert!(!is_identifier("name\"; DROP TABLE x; --"));
        assert!(!is_identifier(&"a".repeat(64)));
        assert_eq!(quote_ident("name").unwrap(), "\"name\"");
        assert!(matches!(
            quote_ident("bad name"),
            Err(StorageError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn type_mapping() {
        assert_eq!(column_type(Some(DataType::Double)), "DOUBLE PRECISION");
        assert_eq!(column_type(Some(DataType::Float)), "DOUBLE PRECISION");
        assert_eq!(cast_type(Some(DataType::Float)), "DOUBLE PRECISION");
        assert_eq!(column_type(Some(DataType::String)), "VARCHAR(255)");
        assert_eq!(column_type(Some(DataType::Date)), "TIMESTAMPTZ");
        assert_eq!(column_type(Some(DataType::Serial)), "SERIAL");
        assert_eq!(cast_type(Some(DataType::Serial)), "INTEGER");
        assert_eq!(cast_type(None), "TEXT");
    }

    #[test]
    fn bootstrap_is_parameterized() {
        let scripts = bootstrap("app", "uid-1").unwrap();
        assert_eq!(scripts[0].exec, "CREATE SCHEMA IF NOT EXISTS \"app\"");
        assert!(scripts[1].exec.starts_with("CREATE TABLE IF NOT EXISTS \"app\".\"config\""));
        assert_eq!(
            scripts[2].params,
            vec![Value::from(INSTALL_UID_KEY), Value::from("uid-1")]
        );
        assert!(bootstrap("app; DROP", "x").is_err());
    }

    #[test]
    fn create_table_ddl() {
        let config = EntityConfig::new(
            EntitySchema::builder("Post", 1)
                .column("title", ColumnMeta::new(DataType::Text))
                .column(
                    "author",
                    ColumnMeta::new(DataType::Text).foreign_key(ForeignKey::new("e_id", "User")),
                )
                .build(),
        );
        let ddl = create_table("app", &config).unwrap().exec;
        assert_eq!(
            ddl,
            "CREATE TABLE IF NOT EXISTS \"app\".\"post\" (\"e_seq\" BIGSERIAL, \
             \"e_id\" TEXT PRIMARY KEY, \"title\" TEXT NOT NULL, \
             \"author\" TEXT NOT NULL REFERENCES \"app\".\"user\" (\"e_id\"))"
        );
    }

    #[test]
    fn insert_binds_every_value() {
        let record = Record::new()
            .with(ID_FIELD, "u1")
            .with("name", "Bob")
            .with("age", 30i64);
        let q = insert("app", &user(), &record).unwrap();
        assert_eq!(
            q.exec,
            "INSERT INTO \"app\".\"user\" (\"age\", \"e_id\", \"name\") \
             VALUES ($1::INTEGER, $2::TEXT, $3::VARCHAR) ON CONFLICT (\"e_id\") DO NOTHING"
        );
        assert_eq!(q.params.len(), 3);
    }

    #[test]
    fn insert_rejects_undeclared_fields() {
        let record = Record::new().with(ID_FIELD, "u1").with("color", "red");
        assert!(matches!(
            insert("app", &user(), &record),
            Err(StorageError::InvalidRecord { .. })
        ));
    }

    #[test]
    fn update_statements() {
        let q = update("app", &user(), "u1", &Record::new().with("name", "Bobi")).unwrap();
        assert_eq!(
            q.exec,
            "UPDATE \"app\".\"user\" SET \"name\" = $1::VARCHAR WHERE \"e_id\" = $2::TEXT"
        );
        assert_eq!(q.params, vec![Value::from("Bobi"), Value::from("u1")]);

        let q = update("app", &user(), "u1", &Record::new()).unwrap();
        assert_eq!(
            q.exec,
            "UPDATE \"app\".\"user\" SET \"e_id\" = \"e_id\" WHERE \"e_id\" = $1::TEXT"
        );
    }

    #[test]
    fn search_terms_are_or_groups() {
        let query = Query::new()
            .where_eq("name", "Bob")
            .where_all("age", vec![Predicate::greater_than(18), Predicate::smaller_than(65)]);
        let q = select_list("app", &user(), &query).unwrap();
        assert_eq!(
            q.exec,
            "SELECT \"e_id\", \"name\", \"age\", \"owner\" FROM \"app\".\"user\" \
             WHERE ((\"age\" > $1::BIGINT) AND (\"age\" < $2::BIGINT)) \
             OR (\"name\" = $3::TEXT) ORDER BY \"e_seq\" ASC"
        );
        assert_eq!(
            q.params,
            vec![Value::from(18), Value::from(65), Value::from("Bob")]
        );
    }

    #[test]
    fn mismatched_or_unknown_fields_never_match() {
        let query = Query::new()
            .where_pred("age", Predicate::like("3"))
            .where_pred("name", Predicate::greater_than(1))
            .where_eq("color", "red");
        let q = select_list("app", &user(), &query).unwrap();
        assert!(q.exec.contains("WHERE (FALSE) OR (FALSE) OR (FALSE)"));
        assert!(q.params.is_empty());
    }

    #[test]
    fn like_is_a_literal_substring_test() {
        let q = select_list("app", &user(), &Query::new().where_pred("name", Predicate::like("o%"))).unwrap();
        assert!(q.exec.contains("WHERE (strpos(\"name\", $1::TEXT) > 0)"));
        assert_eq!(q.params, vec![Value::from("o%")]);
    }

    #[test]
    fn uuid_columns_compare_as_text() {
        let q = select_list(
            "app",
            &user(),
            &Query::new().where_eq("owner", "67e55044-10b1-426f-9247-bb680e5fe0c8"),
        )
        .unwrap();
        assert!(q.exec.contains("(\"owner\"::text = $1::TEXT)"));
    }

    #[test]
    fn not_and_null_predicates() {
        let q = select_list("app", &user(), &Query::new().where_pred("name", Predicate::not("Bob"))).unwrap();
        assert!(q.exec.contains("\"name\" IS DISTINCT FROM $1::TEXT"));

        let q = select_list("app", &user(), &Query::new().where_eq("age", Value::Null)).unwrap();
        assert!(q.exec.contains("(\"age\" IS NULL)"));
    }

    #[test]
    fn ordering_and_window() {
        let q = select_list(
            "app",
            &user(),
            &Query::new().order_by(ID_FIELD, Direction::Desc).limit(5).offset(10),
        )
        .unwrap();
        assert!(q.exec.ends_with("ORDER BY \"e_seq\" DESC LIMIT 5 OFFSET 10"));

        let q = select_list("app", &user(), &Query::new().order_by("age", Direction::Asc)).unwrap();
        assert!(q.exec.ends_with("ORDER BY \"age\" ASC NULLS FIRST, \"e_seq\" ASC"));

        // Unknown keys leave the sequence order in place.
        let q = select_list("app", &user(), &Query::new().order_by("zzz", Direction::Desc)).unwrap();
        assert!(q.exec.ends_with("ORDER BY \"e_seq\" DESC"));
    }

    #[test]
    fn find_requires_every_field() {
        let partial = Record::new().with("name", "Bob").with("age", 30i64);
        let q = find("app", &user(), &partial).unwrap();
        assert!(q
            .exec
            .ends_with("WHERE \"age\" = $1::BIGINT AND \"name\" = $2::TEXT ORDER BY \"e_seq\" ASC LIMIT 1"));
    }

    #[test]
    fn result_set_detection() {
        assert!(returns_rows("  select 1"));
        assert!(returns_rows("WITH x AS (SELECT 1) SELECT * FROM x"));
        assert!(returns_rows("DELETE FROM t WHERE a = $1 RETURNING a"));
        assert!(!returns_rows("CREATE SCHEMA s"));
        assert!(!returns_rows("UPDATE t SET a = 1"));
    }

    #[test]
    fn config_statements() {
        let q = set_config("app", "dbversion", "2").unwrap();
        assert!(q.exec.contains("ON CONFLICT (c_key) DO UPDATE"));
        assert_eq!(q.params, vec![Value::from("dbversion"), Value::from("2")]);
        assert_eq!(schema_exists("app").params, vec![Value::from("app")]);
    }
}
