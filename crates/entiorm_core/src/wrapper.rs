//! Typed entity access.

use crate::cache::Cache;
use crate::config::DbConfig;
use crate::entity::{entity_record, Entity, EntityId};
use crate::error::CoreResult;
use entiorm_codec::{CodecError, Record};
use entiorm_meta::{validate_record, Shape, ID_FIELD};
use entiorm_storage::{record_id, EntityConfig, Query, StorageBackend};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, trace};

/// Typed handle for one entity class.
///
/// Wrappers are returned by
/// [`Database::register_entity`](crate::Database::register_entity) and are
/// cheap to clone. Reads go through the database cache when the class is
/// cached: a miss populates it, creates populate it, and updates or deletes
/// drop the affected keys before returning.
pub struct EntityWrapper<E: Entity> {
    config: EntityConfig,
    backend: Arc<dyn StorageBackend>,
    cache: Option<Arc<dyn Cache>>,
    settings: Arc<DbConfig>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for EntityWrapper<E> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            backend: Arc::clone(&self.backend),
            cache: self.cache.clone(),
            settings: Arc::clone(&self.settings),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> fmt::Debug for EntityWrapper<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityWrapper")
            .field("class", &self.config.class_name())
            .field("table", &self.config.table())
            .field("backend", &self.backend.kind())
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

impl<E: Entity> EntityWrapper<E> {
    pub(crate) fn new(
        config: EntityConfig,
        backend: Arc<dyn StorageBackend>,
        cache: Option<Arc<dyn Cache>>,
        settings: Arc<DbConfig>,
    ) -> Self {
        Self {
            config,
            backend,
            cache,
            settings,
            _entity: PhantomData,
        }
    }

    /// Class name of the wrapped entity.
    #[must_use]
    pub fn class_name(&self) -> &str {
        self.config.class_name()
    }

    /// Backend registration of the wrapped entity.
    #[must_use]
    pub fn config(&self) -> &EntityConfig {
        &self.config
    }

    /// Cache key of one instance.
    #[must_use]
    pub fn cache_key(&self, id: &EntityId) -> String {
        format!(
            "{}{}:{}",
            self.settings.cache_prefix,
            self.config.class_name(),
            id
        )
    }

    /// Checks an instance against the entity metadata.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`](crate::CoreError::Validation) listing
    /// every problem found.
    pub fn validate_object(&self, entity: &E) -> CoreResult<()> {
        validate_record(self.config.schema(), &entity_record(entity), Shape::Full)?;
        Ok(())
    }

    /// Stores a new instance.
    ///
    /// Returns `None` if the identity is already taken.
    pub async fn create_object(&self, entity: &E) -> CoreResult<Option<E>> {
        let record = entity_record(entity);
        if self.settings.validate_on_write {
            validate_record(self.config.schema(), &record, Shape::Full)?;
        }
        let Some(stored) = self.backend.create_entity(&self.config, record).await? else {
            debug!(class = self.class_name(), id = %entity.id(), "identity already taken");
            return Ok(None);
        };
        if let Some(cache) = &self.cache {
            cache.set(&self.cache_key(entity.id()), stored.clone()).await?;
        }
        self.decode(&stored).map(Some)
    }

    /// Applies a partial patch to one instance.
    ///
    /// Returns false if the id is unknown. The identity field is never
    /// patched.
    pub async fn update_object(&self, id: &EntityId, patch: &Record) -> CoreResult<bool> {
        self.check_patch(patch)?;
        let outcome = self
            .backend
            .update_entity(&self.config, id.as_str(), patch)
            .await;
        let invalidated = self.invalidate(std::slice::from_ref(id)).await;
        let updated = outcome?;
        invalidated?;
        Ok(updated)
    }

    /// Applies the same patch to every id.
    ///
    /// Every id is attempted; returns true only if all updates succeeded.
    pub async fn update_object_bulk(&self, ids: &[EntityId], patch: &Record) -> CoreResult<bool> {
        self.check_patch(patch)?;
        let outcome = self
            .backend
            .update_bulk_entity(&self.config, &raw_ids(ids), patch)
            .await;
        let invalidated = self.invalidate(ids).await;
        let updated = outcome?;
        invalidated?;
        Ok(updated)
    }

    /// Reads one instance.
    pub async fn get_obj_by_id(&self, id: &EntityId) -> CoreResult<Option<E>> {
        let key = self.cache_key(id);
        if let Some(cache) = &self.cache {
            if let Some(record) = cache.get(&key).await? {
                trace!(key = %key, "cache hit");
                return self.decode(&record).map(Some);
            }
        }

        let Some(record) = self
            .backend
            .get_entity_by_id(&self.config, id.as_str())
            .await?
        else {
            return Ok(None);
        };
        if let Some(cache) = &self.cache {
            cache.set(&key, record.clone()).await?;
        }
        self.decode(&record).map(Some)
    }

    /// Reads several instances, in request order. Unknown ids are skipped.
    pub async fn get_obj_by_id_bulk(&self, ids: &[EntityId]) -> CoreResult<Vec<E>> {
        let mut found: HashMap<String, Record> = HashMap::with_capacity(ids.len());
        let mut missing = Vec::new();

        for id in ids {
            let cached = match &self.cache {
                Some(cache) => cache.get(&self.cache_key(id)).await?,
                None => None,
            };
            match cached {
                Some(record) => {
                    found.insert(id.as_str().to_string(), record);
                }
                None => missing.push(id.as_str().to_string()),
            }
        }

        if !missing.is_empty() {
            let fetched = self
                .backend
                .get_entity_bulk_by_id(&self.config, &missing)
                .await?;
            for record in fetched {
                let Some(id) = record_id(&record).map(str::to_string) else {
                    continue;
                };
                if let Some(cache) = &self.cache {
                    cache
                        .set(&self.cache_key(&EntityId::from(id.as_str())), record.clone())
                        .await?;
                }
                found.insert(id, record);
            }
        }

        ids.iter()
            .filter_map(|id| found.get(id.as_str()))
            .map(|record| self.decode(record))
            .collect()
    }

    /// Lists instances. `None` lists everything in sequence order.
    pub async fn get_obj_list(&self, query: Option<Query>) -> CoreResult<Vec<E>> {
        let query = query.unwrap_or_default();
        let records = self.backend.get_entity_list(&self.config, &query).await?;
        records.iter().map(|record| self.decode(record)).collect()
    }

    /// Returns the first instance whose fields equal every field of
    /// `partial`.
    pub async fn find_obj(&self, partial: &Record) -> CoreResult<Option<E>> {
        self.backend
            .find_entity(&self.config, partial)
            .await?
            .map(|record| self.decode(&record))
            .transpose()
    }

    /// Deletes one instance. Returns false if the id is unknown.
    pub async fn delete(&self, id: &EntityId) -> CoreResult<bool> {
        let outcome = self
            .backend
            .delete_entity_by_id(self.config.class_name(), id.as_str())
            .await;
        let invalidated = self.invalidate(std::slice::from_ref(id)).await;
        let deleted = outcome?;
        invalidated?;
        Ok(deleted)
    }

    /// Deletes every listed instance.
    ///
    /// Every id is attempted; returns true only if all deletes succeeded.
    pub async fn delete_bulk(&self, ids: &[EntityId]) -> CoreResult<bool> {
        let outcome = self
            .backend
            .delete_entity_bulk_by_id(self.config.class_name(), &raw_ids(ids))
            .await;
        let invalidated = self.invalidate(ids).await;
        let deleted = outcome?;
        invalidated?;
        Ok(deleted)
    }

    fn check_patch(&self, patch: &Record) -> CoreResult<()> {
        if self.settings.validate_on_write {
            validate_record(self.config.schema(), patch, Shape::Patch)?;
        }
        Ok(())
    }

    async fn invalidate(&self, ids: &[EntityId]) -> CoreResult<()> {
        let Some(cache) = &self.cache else {
            return Ok(());
        };
        for id in ids {
            cache.delete(&self.cache_key(id)).await?;
        }
        Ok(())
    }

    fn decode(&self, record: &Record) -> CoreResult<E> {
        let id = record_id(record).ok_or_else(|| CodecError::missing_field(ID_FIELD))?;
        E::from_record(EntityId::from(id), record)
    }
}

fn raw_ids(ids: &[EntityId]) -> Vec<String> {
    ids.iter().map(|id| id.as_str().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::fixtures::User;
    use crate::CoreError;
    use entiorm_storage::{Direction, InMemoryBackend, Predicate};

    async fn wrapper_with(
        settings: DbConfig,
        cache: Option<Arc<InMemoryCache>>,
    ) -> (EntityWrapper<User>, Arc<InMemoryBackend>) {
        let backend = Arc::new(InMemoryBackend::new());
        let config = EntityConfig::new(User::schema());
        backend.register_entity(config.clone());
        backend.connect().await.unwrap();
        backend
            .init_entity(&config, &entity_record(&User::default()))
            .await
            .unwrap();
        let wrapper = EntityWrapper::new(
            config,
            backend.clone(),
            cache.map(|c| c as Arc<dyn Cache>),
            Arc::new(settings),
        );
        (wrapper, backend)
    }

    async fn users() -> EntityWrapper<User> {
        wrapper_with(DbConfig::default(), None).await.0
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let users = users().await;
        let bob = User::new("Bob", 30);

        let created = users.create_object(&bob).await.unwrap().unwrap();
        assert_eq!(created, bob);
        assert_eq!(users.get_obj_by_id(bob.id()).await.unwrap(), Some(bob));
    }

    #[tokio::test]
    async fn duplicate_create_returns_none() {
        let users = users().await;
        let bob = User::new("Bob", 30);
        users.create_object(&bob).await.unwrap();
        assert!(users.create_object(&bob).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_missing_is_false() {
        let users = users().await;
        assert!(!users.delete(&EntityId::new()).await.unwrap());
    }

    #[tokio::test]
    async fn bob_becomes_bobi() {
        let users = users().await;
        let bob = User::new("Bob", 30);
        users.create_object(&bob).await.unwrap();

        let by_name = |name: &str| Some(Query::new().where_eq("name", name));
        assert_eq!(users.get_obj_list(by_name("Bob")).await.unwrap().len(), 1);

        let patch = Record::new().with("name", "Bobi");
        assert!(users.update_object(bob.id(), &patch).await.unwrap());

        assert!(users.get_obj_list(by_name("Bob")).await.unwrap().is_empty());
        let renamed = users.get_obj_list(by_name("Bobi")).await.unwrap();
        assert_eq!(renamed.len(), 1);
        assert_eq!(renamed[0].age, 30);
        assert_eq!(renamed[0].id(), bob.id());
    }

    #[tokio::test]
    async fn id_order_follows_insertion() {
        let users = users().await;
        let mut ids = Vec::new();
        for i in 0..100 {
            let user = User::new(format!("user{i}"), i);
            ids.push(user.id().clone());
            users.create_object(&user).await.unwrap();
        }

        let asc = users
            .get_obj_list(Some(Query::new().order_by(ID_FIELD, Direction::Asc)))
            .await
            .unwrap();
        let desc = users
            .get_obj_list(Some(Query::new().order_by(ID_FIELD, Direction::Desc)))
            .await
            .unwrap();

        assert_eq!(asc.len(), 100);
        assert_eq!(desc.len(), 100);
        assert_ne!(asc[0].id(), desc[0].id());
        assert_eq!(asc[0].id(), &ids[0]);
        assert_eq!(desc[0].id(), &ids[99]);
    }

    #[tokio::test]
    async fn bulk_update_and_delete() {
        let users = users().await;
        let mut ids = Vec::new();
        for i in 0..4 {
            let user = User::new(format!("u{i}"), 20);
            ids.push(user.id().clone());
            users.create_object(&user).await.unwrap();
        }

        let patch = Record::new().with("age", 21);
        assert!(users.update_object_bulk(&ids[..2], &patch).await.unwrap());
        let older = users
            .get_obj_list(Some(Query::new().where_eq("age", 21)))
            .await
            .unwrap();
        assert_eq!(older.len(), 2);

        assert!(users.delete_bulk(&ids[..2]).await.unwrap());
        assert_eq!(users.get_obj_list(None).await.unwrap().len(), 2);

        // One unknown id fails the bulk, but the known one is still deleted.
        let partial = vec![ids[2].clone(), EntityId::new()];
        assert!(!users.delete_bulk(&partial).await.unwrap());
        assert_eq!(users.get_obj_list(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn bulk_get_keeps_request_order() {
        let users = users().await;
        let a = User::new("a", 1);
        let b = User::new("b", 2);
        users.create_object(&a).await.unwrap();
        users.create_object(&b).await.unwrap();

        let request = vec![b.id().clone(), EntityId::new(), a.id().clone()];
        let names: Vec<_> = users
            .get_obj_by_id_bulk(&request)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.name)
            .collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn find_requires_every_field() {
        let users = users().await;
        users.create_object(&User::new("Ann", 40)).await.unwrap();
        users.create_object(&User::new("Ann", 41)).await.unwrap();

        let found = users
            .find_obj(&Record::new().with("name", "Ann").with("age", 41))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.age, 41);
        assert!(users
            .find_obj(&Record::new().with("name", "Ann").with("age", 99))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn list_supports_windows_and_predicates() {
        let users = users().await;
        for i in 0..10 {
            users.create_object(&User::new(format!("n{i}"), i)).await.unwrap();
        }

        let first = users
            .get_obj_list(Some(Query::new().limit(3)))
            .await
            .unwrap();
        let second = users
            .get_obj_list(Some(Query::new().limit(3).offset(3)))
            .await
            .unwrap();
        assert_eq!(first.len(), 3);
        assert_ne!(first[0].id(), second[0].id());
        assert!(users
            .get_obj_list(Some(Query::new().limit(0)))
            .await
            .unwrap()
            .is_empty());

        let young = users
            .get_obj_list(Some(Query::new().where_pred("age", Predicate::smaller_than(3))))
            .await
            .unwrap();
        assert_eq!(young.len(), 3);
    }

    #[tokio::test]
    async fn reads_populate_cache_and_writes_invalidate() {
        let cache = Arc::new(InMemoryCache::new());
        let (users, _backend) = wrapper_with(DbConfig::default(), Some(cache.clone())).await;
        let bob = User::new("Bob", 30);
        let key = users.cache_key(bob.id());

        users.create_object(&bob).await.unwrap();
        assert!(cache.exist(&key).await.unwrap());

        users
            .update_object(bob.id(), &Record::new().with("age", 31))
            .await
            .unwrap();
        assert!(!cache.exist(&key).await.unwrap());

        let fetched = users.get_obj_by_id(bob.id()).await.unwrap().unwrap();
        assert_eq!(fetched.age, 31);
        assert!(cache.exist(&key).await.unwrap());

        users.delete(bob.id()).await.unwrap();
        assert!(!cache.exist(&key).await.unwrap());
        assert!(users.get_obj_by_id(bob.id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cache_answers_repeat_reads() {
        let cache = Arc::new(InMemoryCache::new());
        let (users, _backend) = wrapper_with(DbConfig::default(), Some(cache.clone())).await;
        let bob = User::new("Bob", 30);
        users.create_object(&bob).await.unwrap();

        users.get_obj_by_id(bob.id()).await.unwrap();
        users.get_obj_by_id(bob.id()).await.unwrap();
        assert_eq!(cache.stats().hits, 2);
    }

    #[tokio::test]
    async fn cache_keys_use_prefix() {
        let cache = Arc::new(InMemoryCache::new());
        let settings = DbConfig::default().cache_prefix("app:");
        let (users, _backend) = wrapper_with(settings, Some(cache)).await;
        let id = EntityId::from("42");
        assert_eq!(users.cache_key(&id), "app:User:42");
    }

    #[tokio::test]
    async fn invalid_writes_are_rejected() {
        let users = users().await;
        let patch = Record::new().with("age", "old");
        let err = users
            .update_object(&EntityId::new(), &patch)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let unknown = Record::new().with("nickname", "B");
        assert!(users.update_object(&EntityId::new(), &unknown).await.is_err());
    }

    #[tokio::test]
    async fn validation_can_be_disabled() {
        let settings = DbConfig::default().validate_on_write(false);
        let (users, _backend) = wrapper_with(settings, None).await;
        let bob = User::new("Bob", 30);
        users.create_object(&bob).await.unwrap();

        let patch = Record::new().with("nickname", "B");
        assert!(users.update_object(bob.id(), &patch).await.unwrap());
    }

    #[tokio::test]
    async fn validate_object_accepts_complete_instance() {
        let users = users().await;
        assert!(users.validate_object(&User::new("Bob", 30)).is_ok());
        assert!(users.validate_object(&User::default()).is_ok());
    }
}
