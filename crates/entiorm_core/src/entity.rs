//! Entity identity and the entity trait.

use crate::error::CoreResult;
use entiorm_codec::Record;
use entiorm_meta::{EntitySchema, ID_FIELD};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an entity.
///
/// Entity IDs are text, stored under the `e_id` field. Generated IDs are
/// UUID v4 strings; IDs read back from a store are taken as they are.
/// - Immutable once assigned
/// - Never reused by [`EntityId::new`]
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(String);

impl EntityId {
    /// Creates a new random entity ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the ID as text.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Converts into the underlying string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }

    /// Parses the ID as a UUID, if it is one.
    #[must_use]
    pub fn to_uuid(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.0).ok()
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<Uuid> for EntityId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid.to_string())
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Trait for types persisted through an [`EntityWrapper`](crate::EntityWrapper).
///
/// Implementors are plain data holders. They describe their fields with an
/// [`EntitySchema`] and convert to and from a [`Record`]; the identity is
/// handled separately and never appears in `to_record`.
///
/// `Default` is the zero-argument factory: the default instance seeds
/// storage when a fresh store initializes the entity's table.
///
/// # Example
///
/// ```rust
/// use entiorm_codec::Record;
/// use entiorm_core::{CoreResult, Entity, EntityId};
/// use entiorm_meta::{registry, ColumnMeta, DataType, EntitySchema};
///
/// #[derive(Debug, Clone, Default)]
/// struct Tag {
///     id: EntityId,
///     label: String,
/// }
///
/// impl Entity for Tag {
///     fn schema() -> EntitySchema {
///         registry::ensure_schema::<Self>(|| {
///             EntitySchema::builder("Tag", 1)
///                 .column("label", ColumnMeta::new(DataType::Text))
///                 .build()
///         })
///     }
///
///     fn id(&self) -> &EntityId {
///         &self.id
///     }
///
///     fn to_record(&self) -> Record {
///         Record::new().with("label", self.label.clone())
///     }
///
///     fn from_record(id: EntityId, record: &Record) -> CoreResult<Self> {
///         Ok(Self { id, label: record.text("label")? })
///     }
/// }
///
/// assert_eq!(Tag::class_name(), "Tag");
/// ```
pub trait Entity: Default + Clone + Send + Sync + 'static {
    /// Metadata of the entity.
    fn schema() -> EntitySchema;

    /// The entity's stable identifier.
    fn id(&self) -> &EntityId;

    /// Persisted fields, without the identity.
    fn to_record(&self) -> Record;

    /// Rebuilds an entity from its identity and stored fields.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing or has the wrong
    /// kind.
    fn from_record(id: EntityId, record: &Record) -> CoreResult<Self>;

    /// Name the entity class is registered under.
    fn class_name() -> String {
        Self::schema().name().to_string()
    }
}

/// The full stored record of an entity: its fields plus [`ID_FIELD`].
pub fn entity_record<E: Entity>(entity: &E) -> Record {
    let mut record = entity.to_record();
    record.insert(ID_FIELD, entity.id().as_str());
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_unique() {
        let id1 = EntityId::new();
        let id2 = EntityId::new();
        assert_ne!(id1, id2);
        assert!(id1.to_uuid().is_some());
    }

    #[test]
    fn foreign_ids_are_kept_verbatim() {
        let id = EntityId::from("legacy-42");
        assert_eq!(id.as_str(), "legacy-42");
        assert!(id.to_uuid().is_none());
        assert_eq!(String::from(id), "legacy-42");
    }

    #[test]
    fn uuid_conversion() {
        let uuid = Uuid::new_v4();
        let id = EntityId::from(uuid);
        assert_eq!(id.to_uuid(), Some(uuid));
    }

    #[test]
    fn display_and_debug() {
        let id = EntityId::from("abc");
        assert_eq!(format!("{id}"), "abc");
        assert_eq!(format!("{id:?}"), "EntityId(abc)");
    }
}
