//! Process-global metadata table keyed by Rust type.
//!
//! Entity types register their metadata explicitly, either piecewise with
//! [`define_entity`] / [`define_column`] or in one step with
//! [`register_schema`]. Lookups never reflect over values: they are keyed by
//! the type's [`TypeId`].

use crate::column::ColumnMeta;
use crate::schema::{EntityMeta, EntitySchema};
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::OnceLock;

#[derive(Debug, Clone, Default)]
struct Entry {
    meta: Option<EntityMeta>,
    columns: Vec<(String, ColumnMeta)>,
}

fn table() -> &'static RwLock<HashMap<TypeId, Entry>> {
    static TABLE: OnceLock<RwLock<HashMap<TypeId, Entry>>> = OnceLock::new();
    TABLE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Attaches entity-level metadata to `T`, replacing earlier metadata.
pub fn define_entity<T: 'static>(name: impl Into<String>, version: u32) {
    let mut table = table().write();
    table.entry(TypeId::of::<T>()).or_default().meta = Some(EntityMeta::new(name, version));
}

/// Attaches column metadata to a field of `T`, replacing an earlier
/// declaration of the same field.
pub fn define_column<T: 'static>(field: impl Into<String>, props: ColumnMeta) {
    let field = field.into();
    let mut table = table().write();
    let entry = table.entry(TypeId::of::<T>()).or_default();
    match entry.columns.iter_mut().find(|(k, _)| *k == field) {
        Some(slot) => slot.1 = props,
        None => entry.columns.push((field, props)),
    }
}

/// Registers a complete schema for `T`, replacing anything defined before.
pub fn register_schema<T: 'static>(schema: &EntitySchema) {
    let entry = Entry {
        meta: Some(schema.meta().clone()),
        columns: schema
            .columns()
            .map(|(k, c)| (k.to_string(), c.clone()))
            .collect(),
    };
    table().write().insert(TypeId::of::<T>(), entry);
}

/// Returns the schema of `T`, registering the one produced by `build` if
/// `T` has no entity metadata yet.
pub fn ensure_schema<T: 'static>(build: impl FnOnce() -> EntitySchema) -> EntitySchema {
    if let Some(schema) = schema_of::<T>() {
        return schema;
    }
    let schema = build();
    let mut table = table().write();
    let entry = table.entry(TypeId::of::<T>()).or_default();
    if entry.meta.is_none() {
        entry.meta = Some(schema.meta().clone());
        entry.columns = schema
            .columns()
            .map(|(k, c)| (k.to_string(), c.clone()))
            .collect();
    }
    EntitySchema::from_parts(entry.meta.clone().unwrap_or_else(|| schema.meta().clone()), entry.columns.clone())
}

/// Entity metadata of `T`.
pub fn entity_meta<T: 'static>() -> Option<EntityMeta> {
    table()
        .read()
        .get(&TypeId::of::<T>())
        .and_then(|e| e.meta.clone())
}

/// Column metadata of `field` on `T`.
pub fn column_meta<T: 'static>(field: &str) -> Option<ColumnMeta> {
    table().read().get(&TypeId::of::<T>()).and_then(|e| {
        e.columns
            .iter()
            .find(|(k, _)| k == field)
            .map(|(_, c)| c.clone())
    })
}

/// Full schema of `T`; `None` until entity metadata is defined.
pub fn schema_of<T: 'static>() -> Option<EntitySchema> {
    let table = table().read();
    let entry = table.get(&TypeId::of::<T>())?;
    let meta = entry.meta.clone()?;
    Some(EntitySchema::from_parts(meta, entry.columns.clone()))
}

/// True iff `T` has entity metadata and every annotated field passes
/// [`crate::validate_column_meta`].
pub fn validate_entity<T: 'static>() -> bool {
    let table = table().read();
    match table.get(&TypeId::of::<T>()) {
        Some(entry) => {
            entry.meta.is_some() && entry.columns.iter().all(|(_, c)| c.is_valid())
        }
        None => false,
    }
}
