//! Manager facade: cached drivers and repositories behind one value.
//!
//! # Responsibility
//! - Resolve connections and repositories from configuration through the
//!   factory, caching each for the lifetime of the manager.
//! - Route entity writes, persists and transactions to the right driver.
//!
//! # Invariants
//! - One driver per `(connection, driver class, adapter class)` key.
//! - One repository per `(repository class, entity type)` key.
//! - Class ids are capability-checked before anything is constructed.
//!
//! # See also
//! - `crate::factory` for class resolution.

use crate::config::OrmConfig;
use crate::db::migrations::Migrator;
use crate::db::IntoValue;
use crate::driver::Driver;
use crate::error::OrmResult;
use crate::factory::Factory;
use crate::model::Entity;
use crate::repo::persister::{PersistReport, WriteOutcome};
use crate::repo::repository::Repository;
use crate::repo::retriever::Retriever;
use log::{debug, info};
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::time::Instant;

type DriverKey = (String, String, String);
type RepositoryKey = (String, TypeId);

pub struct Orm {
    config: OrmConfig,
    factory: Factory,
    drivers: RefCell<BTreeMap<DriverKey, Rc<Driver>>>,
    repositories: RefCell<HashMap<RepositoryKey, Rc<dyn Any>>>,
}

impl Orm {
    /// Manager over `config` with the built-in classes registered.
    pub fn new(config: OrmConfig) -> OrmResult<Self> {
        Self::with_factory(config, Factory::new())
    }

    /// # Errors
    /// - `ConfigError::MissingDefaultConnection` for an invalid `config`.
    pub fn with_factory(config: OrmConfig, factory: Factory) -> OrmResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            factory,
            drivers: RefCell::new(BTreeMap::new()),
            repositories: RefCell::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &OrmConfig {
        &self.config
    }

    pub fn factory(&self) -> &Factory {
        &self.factory
    }

    /// Driver for connection `name` (default connection when `None`),
    /// optionally forcing an adapter class other than the configured one.
    ///
    /// # Errors
    /// - `ConfigError::UnknownConnection` for an unconfigured name.
    /// - `ConfigError::UnknownClass` / `ContractMismatch` for bad class ids.
    /// - `DbError::Open` when the handle cannot be opened.
    pub fn use_connection(&self, name: Option<&str>, adapter: Option<&str>) -> OrmResult<Rc<Driver>> {
        let name = name.unwrap_or(&self.config.default_connection);
        let config = self.config.connection(name)?;
        let adapter_class = adapter.unwrap_or(&config.adapter);
        let key = (
            name.to_string(),
            config.driver.clone(),
            adapter_class.to_string(),
        );

        if let Some(driver) = self.drivers.borrow().get(&key) {
            debug!("event=driver_resolve module=orm status=cached connection={name}");
            return Ok(Rc::clone(driver));
        }

        let started_at = Instant::now();
        let dialect = self.factory.resolve_driver(&config.driver)?;
        let open = self.factory.resolve_adapter(adapter_class)?;
        let driver = Rc::new(Driver::new(name, config.driver.as_str(), dialect, open(config)?));
        info!(
            "event=driver_resolve module=orm status=ok connection={} driver={} adapter={} dialect={} duration_ms={}",
            name,
            config.driver,
            adapter_class,
            dialect.name(),
            started_at.elapsed().as_millis()
        );
        self.drivers.borrow_mut().insert(key, Rc::clone(&driver));
        Ok(driver)
    }

    pub fn default_connection(&self) -> OrmResult<Rc<Driver>> {
        self.use_connection(None, None)
    }

    /// Repository for `E`, bound to `E::connection()` or the default one.
    pub fn get_repository<E: Entity>(&self) -> OrmResult<Rc<Repository<E>>> {
        let class = E::repository();
        self.factory.resolve_repository(class)?;
        let key = (class.to_string(), TypeId::of::<E>());

        let cached = self.repositories.borrow().get(&key).cloned();
        if let Some(repository) = cached.and_then(|any| any.downcast::<Repository<E>>().ok()) {
            return Ok(repository);
        }

        let driver = self.use_connection(E::connection(), None)?;
        let repository = Rc::new(Repository::<E>::new(driver, class));
        info!(
            "event=repository_resolve module=orm status=ok class={} table={}",
            class,
            E::table()
        );
        self.repositories
            .borrow_mut()
            .insert(key, Rc::clone(&repository) as Rc<dyn Any>);
        Ok(repository)
    }

    pub fn find<E: Entity>(&self) -> OrmResult<Retriever<E>> {
        Ok(self.get_repository::<E>()?.find())
    }

    pub fn find_one<E: Entity>(&self, id: impl IntoValue) -> OrmResult<Retriever<E>> {
        Ok(self.get_repository::<E>()?.find_one(id))
    }

    pub fn count<E: Entity>(&self) -> OrmResult<Retriever<E>> {
        Ok(self.get_repository::<E>()?.count())
    }

    pub fn create<E: Entity>(&self, entity: &mut E, defer: bool) -> OrmResult<WriteOutcome> {
        self.get_repository::<E>()?.create(entity, defer)
    }

    pub fn save<E: Entity>(&self, entity: &mut E, defer: bool) -> OrmResult<WriteOutcome> {
        self.get_repository::<E>()?.save(entity, defer)
    }

    pub fn delete<E: Entity>(&self, entity: &mut E, defer: bool) -> OrmResult<WriteOutcome> {
        self.get_repository::<E>()?.delete(entity, defer)
    }

    pub fn soft_delete<E: Entity>(&self, entity: &mut E, defer: bool) -> OrmResult<WriteOutcome> {
        self.get_repository::<E>()?.soft_delete(entity, defer)
    }

    /// Drops the queued operation of `entity`, if any.
    pub fn clear<E: Entity>(&self, entity: &E) -> OrmResult<usize> {
        let Some(handle) = entity.handle() else {
            return Ok(0);
        };
        Ok(self.get_repository::<E>()?.driver().clear(Some(handle)))
    }

    /// Drops every queued operation on every cached connection.
    pub fn clear_all(&self) -> usize {
        self.drivers
            .borrow()
            .values()
            .map(|driver| driver.clear(None))
            .sum()
    }

    /// Flushes the default connection's queue.
    pub fn persist(&self) -> OrmResult<PersistReport> {
        self.default_connection()?.persist()
    }

    pub fn persist_connection(&self, name: &str) -> OrmResult<PersistReport> {
        self.use_connection(Some(name), None)?.persist()
    }

    /// Flushes every cached connection, stopping at the first failure.
    pub fn persist_all(&self) -> OrmResult<Vec<PersistReport>> {
        let drivers: Vec<Rc<Driver>> = self.drivers.borrow().values().cloned().collect();
        drivers.iter().map(|driver| driver.persist()).collect()
    }

    pub fn begin_transaction(&self) -> OrmResult<()> {
        Ok(self.default_connection()?.begin_transaction()?)
    }

    /// Begins a transaction on the default connection unless one is open.
    pub fn ensure_transaction(&self) -> OrmResult<bool> {
        Ok(self.default_connection()?.ensure_transaction()?)
    }

    pub fn in_transaction(&self) -> OrmResult<bool> {
        Ok(self.default_connection()?.in_transaction())
    }

    pub fn commit(&self) -> OrmResult<()> {
        Ok(self.default_connection()?.commit()?)
    }

    pub fn rollback(&self) -> OrmResult<()> {
        Ok(self.default_connection()?.rollback()?)
    }

    pub fn last_insert_id(&self, table: Option<&str>, field: Option<&str>) -> OrmResult<i64> {
        Ok(self.default_connection()?.last_insert_id(table, field)?)
    }

    /// Applies the configured migrations on the default connection.
    pub fn migrate(&self) -> OrmResult<Vec<String>> {
        let driver = self.default_connection()?;
        self.configured_migrator(&driver)?.migrate()
    }

    /// Reverts the most recent configured migration.
    pub fn rollback_migration(&self) -> OrmResult<Option<String>> {
        let driver = self.default_connection()?;
        self.configured_migrator(&driver)?.rollback_last()
    }

    fn configured_migrator<'d>(&self, driver: &'d Driver) -> OrmResult<Migrator<'d>> {
        let mut migrator = driver.migrator();
        for (id, class) in &self.config.migrations {
            let construct = self.factory.resolve_migration(class)?;
            migrator = migrator.register(id.as_str(), construct());
        }
        Ok(migrator)
    }
}

#[cfg(test)]
mod tests {
    use super::Orm;
    use crate::config::{ConfigError, ConnectionConfig, OrmConfig};
    use crate::error::OrmError;
    use crate::factory::{MYSQL_DRIVER, SQLITE_DRIVER};
    use crate::query::Dialect;
    use std::rc::Rc;

    #[test]
    fn use_connection_caches_per_key() {
        let orm = Orm::new(OrmConfig::sqlite_memory("main")).unwrap();
        let first = orm.use_connection(None, None).unwrap();
        let second = orm.use_connection(Some("main"), None).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(first.connection(), "main");
        assert_eq!(first.class(), SQLITE_DRIVER);
    }

    #[test]
    fn driver_class_selects_dialect() {
        let config = OrmConfig::sqlite_memory("main").with_connection(
            "legacy",
            ConnectionConfig::sqlite(":memory:").with_driver(MYSQL_DRIVER),
        );
        let orm = Orm::new(config).unwrap();
        let legacy = orm.use_connection(Some("legacy"), None).unwrap();
        assert_eq!(legacy.dialect(), Dialect::MySql);
    }

    #[test]
    fn adapter_override_is_capability_checked() {
        let orm = Orm::new(OrmConfig::sqlite_memory("main")).unwrap();
        let err = orm.use_connection(None, Some(SQLITE_DRIVER)).unwrap_err();
        assert!(matches!(
            err,
            OrmError::Config(ConfigError::ContractMismatch { expected: "adapter", .. })
        ));
        assert!(matches!(
            orm.use_connection(Some("replica"), None),
            Err(OrmError::Config(ConfigError::UnknownConnection(_)))
        ));
    }

    #[test]
    fn empty_persist_on_fresh_manager() {
        let orm = Orm::new(OrmConfig::sqlite_memory("main")).unwrap();
        assert!(orm.persist().unwrap().is_empty());
        assert!(orm.persist_all().unwrap().iter().all(|report| report.is_empty()));
        assert_eq!(orm.clear_all(), 0);
    }
}
