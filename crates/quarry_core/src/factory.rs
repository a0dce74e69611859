//! Class-id registry for adapters, drivers, repositories and migrations.
//!
//! # Responsibility
//! - Map configured class ids to constructors.
//! - Reject ids registered under a different capability than requested.
//!
//! # Invariants
//! - Resolution either yields a constructor of the requested capability or
//!   fails with `ConfigError`; it never falls back to a default.

use crate::config::{ConfigError, ConnectionConfig};
use crate::db::migrations::Migration;
use crate::db::{Adapter, DbResult, SqliteAdapter};
use crate::query::Dialect;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};

pub const SQLITE_ADAPTER: &str = "quarry::SqliteAdapter";
pub const SQLITE_DRIVER: &str = "quarry::SqliteDriver";
pub const MYSQL_DRIVER: &str = "quarry::MySqlDriver";
pub const DEFAULT_REPOSITORY: &str = "quarry::Repository";

pub type AdapterConstructor = fn(&ConnectionConfig) -> DbResult<Box<dyn Adapter>>;
pub type MigrationConstructor = fn() -> Box<dyn Migration>;

#[derive(Clone, Copy)]
pub enum Registration {
    Adapter(AdapterConstructor),
    /// Drivers differ only in the SQL dialect they render.
    Driver(Dialect),
    /// Every repository class is served by `Repository<E>`.
    Repository,
    Migration(MigrationConstructor),
}

impl Registration {
    pub fn capability(&self) -> &'static str {
        match self {
            Self::Adapter(_) => "adapter",
            Self::Driver(_) => "driver",
            Self::Repository => "repository",
            Self::Migration(_) => "migration",
        }
    }
}

impl Debug for Registration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Driver(dialect) => write!(f, "Driver({})", dialect.name()),
            other => f.write_str(other.capability()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Factory {
    entries: BTreeMap<String, Registration>,
}

impl Default for Factory {
    fn default() -> Self {
        Self::new()
    }
}

impl Factory {
    /// Registry pre-populated with the built-in classes.
    pub fn new() -> Self {
        let mut factory = Self::empty();
        factory
            .register(SQLITE_ADAPTER, Registration::Adapter(open_sqlite))
            .register(SQLITE_DRIVER, Registration::Driver(Dialect::Sqlite))
            .register(MYSQL_DRIVER, Registration::Driver(Dialect::MySql))
            .register(DEFAULT_REPOSITORY, Registration::Repository);
        factory
    }

    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Registers (or replaces) one class id.
    pub fn register(&mut self, id: impl Into<String>, registration: Registration) -> &mut Self {
        self.entries.insert(id.into(), registration);
        self
    }

    pub fn register_migration(&mut self, id: impl Into<String>, constructor: MigrationConstructor) -> &mut Self {
        self.register(id, Registration::Migration(constructor))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn resolve_adapter(&self, id: &str) -> Result<AdapterConstructor, ConfigError> {
        match self.lookup(id, "adapter")? {
            Registration::Adapter(constructor) => Ok(*constructor),
            other => Err(mismatch(id, "adapter", other)),
        }
    }

    pub fn resolve_driver(&self, id: &str) -> Result<Dialect, ConfigError> {
        match self.lookup(id, "driver")? {
            Registration::Driver(dialect) => Ok(*dialect),
            other => Err(mismatch(id, "driver", other)),
        }
    }

    pub fn resolve_repository(&self, id: &str) -> Result<(), ConfigError> {
        match self.lookup(id, "repository")? {
            Registration::Repository => Ok(()),
            other => Err(mismatch(id, "repository", other)),
        }
    }

    pub fn resolve_migration(&self, id: &str) -> Result<MigrationConstructor, ConfigError> {
        match self.lookup(id, "migration")? {
            Registration::Migration(constructor) => Ok(*constructor),
            other => Err(mismatch(id, "migration", other)),
        }
    }

    fn lookup(&self, id: &str, expected: &'static str) -> Result<&Registration, ConfigError> {
        self.entries.get(id).ok_or_else(|| ConfigError::UnknownClass {
            id: id.to_string(),
            expected,
        })
    }
}

fn mismatch(id: &str, expected: &'static str, found: &Registration) -> ConfigError {
    ConfigError::ContractMismatch {
        id: id.to_string(),
        expected,
        found: found.capability(),
    }
}

fn open_sqlite(config: &ConnectionConfig) -> DbResult<Box<dyn Adapter>> {
    Ok(Box::new(SqliteAdapter::open(config)?))
}

#[cfg(test)]
mod tests {
    use super::{Factory, Registration, DEFAULT_REPOSITORY, MYSQL_DRIVER, SQLITE_ADAPTER, SQLITE_DRIVER};
    use crate::config::{ConfigError, ConnectionConfig};
    use crate::query::Dialect;

    #[test]
    fn builtin_classes_resolve_by_capability() {
        let factory = Factory::new();
        assert_eq!(factory.resolve_driver(SQLITE_DRIVER).unwrap(), Dialect::Sqlite);
        assert_eq!(factory.resolve_driver(MYSQL_DRIVER).unwrap(), Dialect::MySql);
        assert!(factory.resolve_repository(DEFAULT_REPOSITORY).is_ok());

        let open = factory.resolve_adapter(SQLITE_ADAPTER).unwrap();
        let adapter = open(&ConnectionConfig::sqlite(":memory:")).unwrap();
        assert_eq!(adapter.name(), "sqlite::memory:");
    }

    #[test]
    fn wrong_capability_is_a_contract_mismatch() {
        let err = Factory::new().resolve_adapter(SQLITE_DRIVER).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ContractMismatch { expected: "adapter", found: "driver", .. }
        ));
    }

    #[test]
    fn unregistered_ids_are_unknown() {
        let mut factory = Factory::empty();
        assert!(matches!(
            factory.resolve_repository(DEFAULT_REPOSITORY),
            Err(ConfigError::UnknownClass { expected: "repository", .. })
        ));
        factory.register("app::Repo", Registration::Repository);
        assert!(factory.contains("app::Repo"));
        assert!(factory.resolve_repository("app::Repo").is_ok());
    }
}
