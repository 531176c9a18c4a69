use crate::entity::{Entity, EntityId};
use crate::error::CoreResult;
use entiorm_codec::Record;
use entiorm_meta::{registry, ColumnMeta, DataType, EntitySchema};

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct User {
    id: EntityId,
    pub name: String,
    pub age: i64,
}

impl User {
    pub fn new(name: impl Into<String>, age: i64) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            age,
        }
    }
}

impl Entity for User {
    fn schema() -> EntitySchema {
        registry::ensure_schema::<Self>(|| {
            EntitySchema::builder("User", 1)
                .column("name", ColumnMeta::new(DataType::Text))
                .column("age", ColumnMeta::new(DataType::Int))
                .build()
        })
    }

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("name", self.name.as_str())
            .with("age", self.age)
    }

    fn from_record(id: EntityId, record: &Record) -> CoreResult<Self> {
        Ok(Self {
            id,
            name: record.text("name")?,
            age: record.integer("age")?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Note {
    id: EntityId,
    pub text: String,
}

impl Note {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            text: text.into(),
        }
    }
}

impl Entity for Note {
    fn schema() -> EntitySchema {
        registry::ensure_schema::<Self>(|| {
            EntitySchema::builder("Note", 1)
                .column("text", ColumnMeta::new(DataType::Text).nullable())
                .build()
        })
    }

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn to_record(&self) -> Record {
        Record::new().with("text", self.text.as_str())
    }

    fn from_record(id: EntityId, record: &Record) -> CoreResult<Self> {
        Ok(Self {
            id,
            text: record.opt_text("text")?.unwrap_or_default(),
        })
    }
}
