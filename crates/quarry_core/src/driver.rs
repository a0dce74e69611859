//! Connection-level facade: one adapter, its dialect and its write queue.
//!
//! # Responsibility
//! - Hand out dialect-aware query and schema builders for one connection.
//! - Own the connection's persister and the transaction boundary.
//!
//! # Invariants
//! - Every builder a driver creates renders in the driver's dialect.
//! - All repositories bound to a driver share its single persister.
//!
//! # See also
//! - `crate::orm::Orm` which caches one driver per connection key.

use crate::db::migrations::Migrator;
use crate::db::{Adapter, DbResult, IntoValue};
use crate::error::OrmResult;
use crate::model::{Entity, EntityHandle};
use crate::query::{CompiledSql, Delete, Dialect, Insert, Query, Select, Update};
use crate::repo::persister::{PendingOperation, PersistReport, Persister, WriteOutcome};
use crate::repo::retriever::Retriever;
use crate::schema::Schema;
use std::cell::RefCell;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

pub struct Driver {
    connection: String,
    class: String,
    dialect: Dialect,
    adapter: Box<dyn Adapter>,
    persister: RefCell<Persister>,
}

impl Driver {
    pub fn new(
        connection: impl Into<String>,
        class: impl Into<String>,
        dialect: Dialect,
        adapter: Box<dyn Adapter>,
    ) -> Self {
        Self {
            connection: connection.into(),
            class: class.into(),
            dialect,
            adapter,
            persister: RefCell::new(Persister::new()),
        }
    }

    /// Configured connection name.
    pub fn connection(&self) -> &str {
        &self.connection
    }

    /// Driver class id this driver was resolved from.
    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn adapter(&self) -> &dyn Adapter {
        self.adapter.as_ref()
    }

    pub fn select(&self) -> Select {
        Select::with_dialect(self.dialect)
    }

    pub fn insert(&self) -> Insert {
        Insert::with_dialect(self.dialect)
    }

    pub fn update(&self) -> Update {
        Update::with_dialect(self.dialect)
    }

    pub fn delete(&self) -> Delete {
        Delete::with_dialect(self.dialect)
    }

    pub fn schema(&self) -> Schema<'_> {
        Schema::new(self.adapter(), self.dialect)
    }

    pub fn migrator(&self) -> Migrator<'_> {
        Migrator::new(self.adapter(), self.dialect)
    }

    /// Raw SQL on this connection; bind named parameters on the result.
    pub fn query(&self, sql: impl Into<String>) -> Query<'_> {
        Query::new(self.adapter(), sql)
    }

    pub(crate) fn query_compiled(&self, compiled: CompiledSql) -> Query<'_> {
        Query::from_compiled(self.adapter(), compiled)
    }

    pub fn find<E: Entity>(self: &Rc<Self>) -> Retriever<E> {
        Retriever::find(Rc::clone(self))
    }

    pub fn find_one<E: Entity>(self: &Rc<Self>, id: impl IntoValue) -> Retriever<E> {
        Retriever::find_one(Rc::clone(self), id)
    }

    pub fn count<E: Entity>(self: &Rc<Self>) -> Retriever<E> {
        Retriever::count(Rc::clone(self))
    }

    pub fn create<E: Entity>(&self, entity: &mut E, defer: bool) -> OrmResult<WriteOutcome> {
        self.persister
            .borrow_mut()
            .create(self.adapter(), self.dialect, entity, defer)
    }

    pub fn save<E: Entity>(&self, entity: &mut E, defer: bool) -> OrmResult<WriteOutcome> {
        self.persister
            .borrow_mut()
            .save(self.adapter(), self.dialect, entity, defer)
    }

    pub fn delete_entity<E: Entity>(&self, entity: &mut E, defer: bool) -> OrmResult<WriteOutcome> {
        self.persister
            .borrow_mut()
            .delete(self.adapter(), self.dialect, entity, defer)
    }

    pub fn soft_delete<E: Entity>(&self, entity: &mut E, defer: bool) -> OrmResult<WriteOutcome> {
        self.persister
            .borrow_mut()
            .soft_delete(self.adapter(), self.dialect, entity, defer)
    }

    /// Drops one queued operation, or the whole queue.
    pub fn clear(&self, handle: Option<EntityHandle>) -> usize {
        self.persister.borrow_mut().clear(handle)
    }

    /// Snapshot of the queued operations in execution order.
    pub fn pending(&self) -> Vec<PendingOperation> {
        self.persister.borrow().pending().to_vec()
    }

    pub fn persist(&self) -> OrmResult<PersistReport> {
        self.persister.borrow_mut().persist(self.adapter(), self.dialect)
    }

    pub fn begin_transaction(&self) -> DbResult<()> {
        self.adapter.begin_transaction()
    }

    pub fn ensure_transaction(&self) -> DbResult<bool> {
        self.adapter.ensure_transaction()
    }

    pub fn in_transaction(&self) -> bool {
        self.adapter.in_transaction()
    }

    pub fn commit(&self) -> DbResult<()> {
        self.adapter.commit()
    }

    pub fn rollback(&self) -> DbResult<()> {
        self.adapter.rollback()
    }

    pub fn last_insert_id(&self, table: Option<&str>, field: Option<&str>) -> DbResult<i64> {
        self.adapter.last_insert_id(table, field)
    }
}

impl Debug for Driver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("connection", &self.connection)
            .field("class", &self.class)
            .field("dialect", &self.dialect)
            .field("adapter", &self.adapter.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::Driver;
    use crate::db::{Adapter, SqliteAdapter, Value};
    use crate::query::{Dialect, Filter, QueryBuilder, TableTarget};
    use std::rc::Rc;

    fn driver(dialect: Dialect) -> Rc<Driver> {
        let adapter = SqliteAdapter::open_in_memory().unwrap();
        adapter
            .execute_batch("CREATE TABLE items (id INTEGER PRIMARY KEY, label TEXT);")
            .unwrap();
        Rc::new(Driver::new("main", "test::Driver", dialect, Box::new(adapter)))
    }

    #[test]
    fn builders_render_in_driver_dialect() {
        let mysql = driver(Dialect::MySql);
        assert_eq!(
            mysql.select().table("items").where_eq("id", 1).get_query_string().unwrap(),
            "SELECT * FROM `items` WHERE `id` = :p1"
        );
        let sqlite = driver(Dialect::Sqlite);
        assert_eq!(
            sqlite.delete().table("items").get_query_string().unwrap(),
            "DELETE FROM \"items\""
        );
    }

    #[test]
    fn raw_query_binds_named_parameters() {
        let driver = driver(Dialect::Sqlite);
        driver
            .insert()
            .table("items")
            .set("label", "lamp")
            .create_query(driver.adapter())
            .unwrap()
            .execute()
            .unwrap();

        let label = driver
            .query("SELECT label FROM items WHERE id = :id")
            .bind("id", 1)
            .get_scalar()
            .unwrap();
        assert_eq!(label, Some(Value::Text("lamp".to_string())));
        assert_eq!(driver.last_insert_id(None, None).unwrap(), 1);
    }

    #[test]
    fn transaction_passthrough_reaches_the_adapter() {
        let driver = driver(Dialect::Sqlite);
        assert!(driver.ensure_transaction().unwrap());
        assert!(driver.in_transaction());
        driver.rollback().unwrap();
        assert!(!driver.adapter().in_transaction());
        assert!(format!("{driver:?}").contains("sqlite::memory:"));
    }
}
