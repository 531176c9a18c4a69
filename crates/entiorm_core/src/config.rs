//! Database configuration.

/// Configuration of a [`Database`](crate::Database).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    /// Schema version the application expects. Fresh stores are stamped
    /// with it; existing stores are migrated towards it.
    pub target_version: String,

    /// Whether wrappers validate records against entity metadata before
    /// writing them.
    pub validate_on_write: bool,

    /// Prefix prepended to every cache key.
    pub cache_prefix: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            target_version: String::from("1"),
            validate_on_write: true,
            cache_prefix: String::new(),
        }
    }
}

impl DbConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the target schema version.
    #[must_use]
    pub fn target_version(mut self, version: impl Into<String>) -> Self {
        self.target_version = version.into();
        self
    }

    /// Sets whether writes are validated.
    #[must_use]
    pub const fn validate_on_write(mut self, value: bool) -> Self {
        self.validate_on_write = value;
        self
    }

    /// Sets the cache key prefix.
    #[must_use]
    pub fn cache_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_prefix = prefix.into();
        self
    }
}

/// Per-class options given to
/// [`Database::register_entity`](crate::Database::register_entity).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityOptions {
    /// Table or collection name; defaults to the lowercased class name.
    pub table: Option<String>,

    /// Whether the class goes through the database cache.
    pub cached: bool,
}

impl Default for EntityOptions {
    fn default() -> Self {
        Self {
            table: None,
            cached: true,
        }
    }
}

impl EntityOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the class in `table`.
    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Sets whether the class is cached.
    #[must_use]
    pub const fn cached(mut self, cached: bool) -> Self {
        self.cached = cached;
        self
    }
}
