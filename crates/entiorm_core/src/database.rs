//! Database lifecycle: registration, start-up and migration.

use crate::cache::Cache;
use crate::config::{DbConfig, EntityOptions};
use crate::entity::{entity_record, Entity};
use crate::error::{CoreError, CoreResult};
use crate::migration::{MigrationChain, MigrationStep};
use crate::wrapper::EntityWrapper;
use entiorm_codec::Record;
use entiorm_storage::{EntityConfig, StorageBackend, DB_VERSION_KEY, INSTALL_UID_KEY};
use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Version a store without a stored `dbversion` is migrated from.
pub const INITIAL_VERSION: &str = "0";

struct RegisteredClass {
    name: String,
    config: EntityConfig,
    seed: Record,
    wrapper: Arc<dyn Any + Send + Sync>,
}

/// A storage backend composed with a cache, a migration chain and the set
/// of registered entity classes.
///
/// # Lifecycle
///
/// 1. Register every entity class with [`register_entity`](Self::register_entity)
/// 2. Call [`start`](Self::start)
/// 3. Use the returned [`EntityWrapper`]s
/// 4. Call [`stop`](Self::stop)
///
/// `start` connects the backend. A freshly created store is stamped with
/// the target version and gets storage for every registered class. An
/// existing store whose `dbversion` differs from the target is migrated.
///
/// # Example
///
/// ```rust
/// use entiorm_core::{Database, DbConfig};
/// use entiorm_storage::InMemoryBackend;
/// use std::sync::Arc;
///
/// let runtime = tokio::runtime::Runtime::new().unwrap();
/// runtime.block_on(async {
///     let db = Database::new(Arc::new(InMemoryBackend::new()), DbConfig::default());
///     db.start().await.unwrap();
///     assert_eq!(db.version().await.unwrap().as_deref(), Some("1"));
///     db.stop().await.unwrap();
/// });
/// ```
pub struct Database {
    backend: Arc<dyn StorageBackend>,
    cache: Option<Arc<dyn Cache>>,
    config: Arc<DbConfig>,
    migrations: MigrationChain,
    classes: RwLock<Vec<RegisteredClass>>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("backend", &self.backend.kind())
            .field("config", &self.config)
            .field("migrations", &self.migrations)
            .field("classes", &self.class_names())
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Creates a database over `backend`, without a cache.
    pub fn new(backend: Arc<dyn StorageBackend>, config: DbConfig) -> Self {
        Self {
            backend,
            cache: None,
            config: Arc::new(config),
            migrations: MigrationChain::new(),
            classes: RwLock::new(Vec::new()),
        }
    }

    /// Routes reads and writes of cached classes through `cache`.
    ///
    /// Only classes registered afterwards use it.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Replaces the migration chain.
    #[must_use]
    pub fn with_migrations(mut self, migrations: MigrationChain) -> Self {
        self.migrations = migrations;
        self
    }

    /// Adds one migration step.
    ///
    /// # Errors
    ///
    /// Returns an error if a step with the same source version exists.
    pub fn add_migration(&mut self, step: Box<dyn MigrationStep>) -> CoreResult<()> {
        self.migrations.register(step)
    }

    /// The registered migration steps.
    #[must_use]
    pub fn migrations(&self) -> &MigrationChain {
        &self.migrations
    }

    /// The underlying backend.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// The database configuration.
    #[must_use]
    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// Names of the registered classes, in registration order.
    #[must_use]
    pub fn class_names(&self) -> Vec<String> {
        self.classes.read().iter().map(|c| c.name.clone()).collect()
    }

    /// Registers an entity class and returns its wrapper.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity metadata is malformed, if a class of
    /// the same name is already registered, or if the database has already
    /// been started.
    pub fn register_entity<E: Entity>(&self, options: EntityOptions) -> CoreResult<EntityWrapper<E>> {
        if self.backend.is_connected() {
            return Err(CoreError::invalid_operation(
                "entities must be registered before start",
            ));
        }
        let schema = E::schema();
        schema.check()?;
        let name = schema.name().to_string();

        let mut classes = self.classes.write();
        if classes.iter().any(|c| c.name == name) {
            return Err(CoreError::invalid_operation(format!(
                "entity {name} is already registered"
            )));
        }

        let mut config = EntityConfig::new(schema);
        if let Some(table) = options.table {
            config = config.with_table(table);
        }
        self.backend.register_entity(config.clone());

        let cache = if options.cached {
            self.cache.clone()
        } else {
            None
        };
        let wrapper = EntityWrapper::<E>::new(
            config.clone(),
            Arc::clone(&self.backend),
            cache,
            Arc::clone(&self.config),
        );
        debug!(class = %name, table = config.table(), "entity registered");

        classes.push(RegisteredClass {
            name,
            config,
            seed: entity_record(&E::default()),
            wrapper: Arc::new(wrapper.clone()),
        });
        Ok(wrapper)
    }

    /// The wrapper registered under `class_name`.
    ///
    /// Returns `None` if no class has that name or if it was registered
    /// with a different entity type.
    #[must_use]
    pub fn wrapper<E: Entity>(&self, class_name: &str) -> Option<EntityWrapper<E>> {
        self.classes
            .read()
            .iter()
            .find(|c| c.name == class_name)
            .and_then(|c| c.wrapper.downcast_ref::<EntityWrapper<E>>())
            .cloned()
    }

    /// The stored schema version, if any.
    pub async fn version(&self) -> CoreResult<Option<String>> {
        Ok(self
            .backend
            .get_config(DB_VERSION_KEY)
            .await?
            .map(|entry| entry.value))
    }

    /// Returns true if the stored version differs from the target.
    ///
    /// A store without a stored version can always be updated.
    pub async fn can_update(&self) -> CoreResult<bool> {
        let stored = self.version().await?;
        Ok(stored.as_deref() != Some(self.config.target_version.as_str()))
    }

    /// Migrates the store from its stored version.
    ///
    /// Returns false when no step starts at the stored version.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Migration`] if a step fails; earlier steps stay
    /// applied.
    pub async fn update(&self) -> CoreResult<bool> {
        let from = self
            .version()
            .await?
            .unwrap_or_else(|| INITIAL_VERSION.to_string());
        if self.migrations.find(&from).is_none() {
            warn!(
                version = %from,
                target = %self.config.target_version,
                "no migration step for stored version"
            );
            return Ok(false);
        }

        let result = self.migrations.run(self.backend.as_ref(), &from).await?;
        if result.final_version != self.config.target_version {
            warn!(
                version = %result.final_version,
                target = %self.config.target_version,
                "migration chain stopped before the target version"
            );
        }
        info!(
            from = %from,
            to = %result.final_version,
            steps = result.applied_count(),
            "store migrated"
        );
        Ok(true)
    }

    /// Connects the backend and prepares the store.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the backend cannot connect or the
    /// store cannot be initialized, and [`CoreError::Migration`] if an
    /// existing store fails to migrate.
    pub async fn start(&self) -> CoreResult<()> {
        self.backend.connect().await?;

        if !self.backend.is_new() {
            if self.can_update().await? {
                self.update().await?;
            }
            info!(backend = self.backend.kind(), "database started");
            return Ok(());
        }

        if !self.backend.config_exist(DB_VERSION_KEY).await? {
            self.backend
                .set_config(DB_VERSION_KEY, &self.config.target_version)
                .await?;
        }
        if !self.backend.config_exist(INSTALL_UID_KEY).await? {
            self.backend
                .set_config(INSTALL_UID_KEY, &Uuid::new_v4().to_string())
                .await?;
        }

        let classes: Vec<(EntityConfig, Record)> = self
            .classes
            .read()
            .iter()
            .map(|c| (c.config.clone(), c.seed.clone()))
            .collect();
        for (config, seed) in &classes {
            self.backend.init_entity(config, seed).await?;
        }
        self.backend.init_new_db().await?;

        info!(
            backend = self.backend.kind(),
            version = %self.config.target_version,
            classes = classes.len(),
            "new store initialized"
        );
        Ok(())
    }

    /// Disconnects the backend. Returns false if it was not connected.
    pub async fn stop(&self) -> CoreResult<bool> {
        let stopped = self.backend.disconnect().await?;
        if stopped {
            info!(backend = self.backend.kind(), "database stopped");
        }
        Ok(stopped)
    }
}
