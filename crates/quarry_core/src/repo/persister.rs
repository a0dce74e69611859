//! Deferred write queue and immediate entity writes.
//!
//! # Responsibility
//! - Turn entity create/save/delete/soft-delete requests into INSERT,
//!   UPDATE and DELETE statements, immediately or on `persist`.
//! - Flush the queue atomically.
//!
//! # Invariants
//! - Queue order is execution order; a re-queued entity keeps its slot.
//! - `save` with no changed storable fields neither queues nor executes.
//! - After a failed flush the database is as before the flush and the queue
//!   is empty, unless the rollback itself failed (then the queue is kept).
//!
//! # See also
//! - `crate::driver::Driver` which owns one persister per connection.

use crate::db::{Adapter, Value};
use crate::error::{OrmError, OrmResult};
use crate::model::{now_timestamp, Entity, EntityHandle};
use crate::query::{Delete, Dialect, Filter, Insert, QueryBuilder, TableTarget, Update};
use log::{error, info};
use std::fmt::{Display, Formatter};
use std::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Create,
    Save,
    Delete,
    SoftDelete,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Save => "save",
            Self::Delete => "delete",
            Self::SoftDelete => "soft_delete",
        }
    }
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One queued write with the column snapshot taken at enqueue time.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOperation {
    pub handle: EntityHandle,
    pub kind: OperationKind,
    pub table: String,
    pub primary_key: String,
    /// Primary key value; `None` only for creates relying on generated ids.
    pub key: Option<Value>,
    pub values: Vec<(String, Value)>,
}

/// Observable result of a write request.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// Queued (or merged into an existing queue slot) until `persist`.
    Queued(EntityHandle),
    Executed {
        affected: usize,
        /// Generated primary key back-filled into the entity.
        last_insert_id: Option<i64>,
    },
    /// Nothing changed since the snapshot; no statement ran.
    Unchanged,
    /// A queued create was dropped instead of writing a delete.
    Dequeued(EntityHandle),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedOperation {
    pub handle: EntityHandle,
    pub kind: OperationKind,
    pub table: String,
    pub affected: usize,
    /// Primary key of a created row.
    pub inserted_id: Option<i64>,
}

/// Result of one successful `persist`.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistReport {
    pub batch_id: Uuid,
    pub executed: Vec<ExecutedOperation>,
}

impl PersistReport {
    fn empty() -> Self {
        Self {
            batch_id: Uuid::nil(),
            executed: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.executed.is_empty()
    }

    pub fn inserted_id(&self, handle: EntityHandle) -> Option<i64> {
        self.executed
            .iter()
            .find(|operation| operation.handle == handle)
            .and_then(|operation| operation.inserted_id)
    }

    /// Brings an entity written by this batch up to date: back-fills a
    /// generated primary key, refreshes its snapshot and releases its
    /// handle. Returns `false` when the batch did not touch the entity.
    pub fn apply<E: Entity>(&self, entity: &mut E) -> OrmResult<bool> {
        let Some(handle) = entity.handle() else {
            return Ok(false);
        };
        let Some(operation) = self.executed.iter().find(|op| op.handle == handle) else {
            return Ok(false);
        };

        if let Some(id) = operation.inserted_id {
            if entity.primary_key_value().is_none() {
                entity.set_field(E::primary_key(), Value::Integer(id))?;
            }
        }
        if operation.kind != OperationKind::Delete {
            entity.capture_original();
        }
        entity.state_mut().handle = None;
        Ok(true)
    }
}

/// Per-connection write queue.
#[derive(Debug, Default)]
pub struct Persister {
    queue: Vec<PendingOperation>,
    next_handle: u64,
}

impl Persister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> &[PendingOperation] {
        &self.queue
    }

    pub fn is_queued(&self, handle: EntityHandle) -> bool {
        self.position(handle).is_some()
    }

    /// Removes one queued operation, or all of them. Returns how many.
    pub fn clear(&mut self, handle: Option<EntityHandle>) -> usize {
        match handle {
            Some(handle) => match self.position(handle) {
                Some(index) => {
                    self.queue.remove(index);
                    1
                }
                None => 0,
            },
            None => {
                let removed = self.queue.len();
                self.queue.clear();
                removed
            }
        }
    }

    /// Inserts an entity. Dated entities get their timestamps stamped.
    pub fn create<E: Entity>(
        &mut self,
        adapter: &dyn Adapter,
        dialect: Dialect,
        entity: &mut E,
        defer: bool,
    ) -> OrmResult<WriteOutcome> {
        if let Some(columns) = E::timestamps() {
            let now = now_timestamp();
            if let Some(created) = columns.created {
                let unset = entity
                    .values()
                    .iter()
                    .any(|(column, value)| *column == created && *value == Value::Null);
                if unset {
                    entity.set_field(created, Value::Text(now.clone()))?;
                }
            }
            if let Some(modified) = columns.modified {
                entity.set_field(modified, Value::Text(now))?;
            }
        }

        let values = insert_values(entity);
        let key = entity.primary_key_value();
        if defer {
            let handle = self.enqueue(entity, OperationKind::Create, key, values);
            return Ok(WriteOutcome::Queued(handle));
        }

        let affected = Insert::with_dialect(dialect)
            .table(E::table())
            .set_all(values)
            .or_default_values()
            .create_query(adapter)?
            .affected_rows()?;
        // Supersedes a queued create of the same entity.
        self.dequeue_create(entity);

        let mut last_insert_id = None;
        if key.is_none() {
            let id = adapter
                .last_insert_id(Some(E::table()), Some(E::primary_key()))
                .map_err(|source| OrmError::statement("create", E::table(), source))?;
            entity.set_field(E::primary_key(), Value::Integer(id))?;
            last_insert_id = Some(id);
        }
        entity.capture_original();
        Ok(WriteOutcome::Executed {
            affected,
            last_insert_id,
        })
    }

    /// Updates the changed storable fields of an entity.
    pub fn save<E: Entity>(
        &mut self,
        adapter: &dyn Adapter,
        dialect: Dialect,
        entity: &mut E,
        defer: bool,
    ) -> OrmResult<WriteOutcome> {
        if self.changed_values(entity).is_empty() {
            return Ok(WriteOutcome::Unchanged);
        }
        if let Some(modified) = E::timestamps().and_then(|columns| columns.modified) {
            entity.set_field(modified, Value::Text(now_timestamp()))?;
        }

        if let Some(handle) = self.queued_create(entity) {
            // A queued create absorbs later saves.
            let values = insert_values(entity);
            let key = entity.primary_key_value();
            if let Some(index) = self.position(handle) {
                self.queue[index].values = values;
                self.queue[index].key = key;
            }
            return Ok(WriteOutcome::Queued(handle));
        }

        let key = require_key(entity, "save")?;
        let values = self.changed_values(entity);
        if values.is_empty() {
            return Ok(WriteOutcome::Unchanged);
        }
        if defer {
            let handle = self.enqueue(entity, OperationKind::Save, Some(key), values);
            return Ok(WriteOutcome::Queued(handle));
        }

        let affected = Update::with_dialect(dialect)
            .table(E::table())
            .set_all(values)
            .where_eq(E::primary_key(), key)
            .create_query(adapter)?
            .affected_rows()?;
        entity.capture_original();
        Ok(WriteOutcome::Executed {
            affected,
            last_insert_id: None,
        })
    }

    /// Deletes the entity's row by primary key.
    pub fn delete<E: Entity>(
        &mut self,
        adapter: &dyn Adapter,
        dialect: Dialect,
        entity: &mut E,
        defer: bool,
    ) -> OrmResult<WriteOutcome> {
        if let Some(handle) = self.dequeue_create(entity) {
            return Ok(WriteOutcome::Dequeued(handle));
        }
        let key = require_key(entity, "delete")?;
        if defer {
            let handle = self.enqueue(entity, OperationKind::Delete, Some(key), Vec::new());
            return Ok(WriteOutcome::Queued(handle));
        }

        let affected = Delete::with_dialect(dialect)
            .table(E::table())
            .where_eq(E::primary_key(), key)
            .create_query(adapter)?
            .affected_rows()?;
        Ok(WriteOutcome::Executed {
            affected,
            last_insert_id: None,
        })
    }

    /// Flags the entity's row as deleted instead of removing it.
    pub fn soft_delete<E: Entity>(
        &mut self,
        adapter: &dyn Adapter,
        dialect: Dialect,
        entity: &mut E,
        defer: bool,
    ) -> OrmResult<WriteOutcome> {
        let columns = E::soft_delete().ok_or_else(|| OrmError::NotSoftDeletable {
            table: E::table().to_string(),
        })?;
        if let Some(handle) = self.dequeue_create(entity) {
            return Ok(WriteOutcome::Dequeued(handle));
        }
        let key = require_key(entity, "soft_delete")?;

        let mut values = vec![(columns.flag.to_string(), Value::Integer(1))];
        entity.set_field(columns.flag, Value::Integer(1))?;
        if let Some(date) = columns.date {
            let now = Value::Text(now_timestamp());
            entity.set_field(date, now.clone())?;
            values.push((date.to_string(), now));
        }

        if defer {
            let handle = self.enqueue(entity, OperationKind::SoftDelete, Some(key), values);
            return Ok(WriteOutcome::Queued(handle));
        }

        let affected = Update::with_dialect(dialect)
            .table(E::table())
            .set_all(values)
            .where_eq(E::primary_key(), key)
            .create_query(adapter)?
            .affected_rows()?;
        entity.capture_original();
        Ok(WriteOutcome::Executed {
            affected,
            last_insert_id: None,
        })
    }

    /// Executes every queued operation in one transaction, in queue order.
    ///
    /// Commits only when this call began the transaction; rolls back on any
    /// failure either way.
    ///
    /// # Errors
    /// - `OrmError::PersistFailed` naming the failing operation; the queue
    ///   is cleared.
    /// - `OrmError::RollbackFailed` when undoing the batch failed too; the
    ///   queue is kept.
    pub fn persist(&mut self, adapter: &dyn Adapter, dialect: Dialect) -> OrmResult<PersistReport> {
        if self.queue.is_empty() {
            return Ok(PersistReport::empty());
        }

        let batch_id = Uuid::new_v4();
        let started_at = Instant::now();
        info!(
            "event=persist_flush module=repo status=start batch_id={} operations={}",
            batch_id,
            self.queue.len()
        );

        let began = adapter.ensure_transaction()?;
        let mut executed = Vec::with_capacity(self.queue.len());
        let mut failure = None;
        for (index, operation) in self.queue.iter().enumerate() {
            match execute_operation(adapter, dialect, operation) {
                Ok(done) => executed.push(done),
                Err(source) => {
                    failure = Some(OrmError::PersistFailed {
                        batch_id,
                        index,
                        kind: operation.kind,
                        table: operation.table.clone(),
                        source: Box::new(source),
                    });
                    break;
                }
            }
        }

        let failure = match failure {
            Some(failure) => failure,
            None if began => match adapter.commit() {
                Ok(()) => return Ok(self.finish(batch_id, executed, started_at)),
                Err(err) => OrmError::from(err),
            },
            None => return Ok(self.finish(batch_id, executed, started_at)),
        };

        if let Err(rollback_err) = adapter.rollback() {
            error!(
                "event=persist_flush module=repo status=rollback_failed batch_id={} error={} rollback_error={}",
                batch_id, failure, rollback_err
            );
            return Err(OrmError::RollbackFailed {
                batch_id,
                cause: Box::new(failure),
                source: rollback_err,
            });
        }
        self.queue.clear();
        error!(
            "event=persist_flush module=repo status=error batch_id={} duration_ms={} error={}",
            batch_id,
            started_at.elapsed().as_millis(),
            failure
        );
        Err(failure)
    }

    fn finish(
        &mut self,
        batch_id: Uuid,
        executed: Vec<ExecutedOperation>,
        started_at: Instant,
    ) -> PersistReport {
        self.queue.clear();
        info!(
            "event=persist_flush module=repo status=ok batch_id={} operations={} duration_ms={}",
            batch_id,
            executed.len(),
            started_at.elapsed().as_millis()
        );
        PersistReport { batch_id, executed }
    }

    fn position(&self, handle: EntityHandle) -> Option<usize> {
        self.queue.iter().position(|operation| operation.handle == handle)
    }

    fn queued_create<E: Entity>(&self, entity: &E) -> Option<EntityHandle> {
        let handle = entity.handle()?;
        let index = self.position(handle)?;
        (self.queue[index].kind == OperationKind::Create).then_some(handle)
    }

    fn dequeue_create<E: Entity>(&mut self, entity: &mut E) -> Option<EntityHandle> {
        let handle = self.queued_create(entity)?;
        self.clear(Some(handle));
        entity.state_mut().handle = None;
        Some(handle)
    }

    /// Changed storable fields minus the primary key.
    fn changed_values<E: Entity>(&self, entity: &E) -> Vec<(String, Value)> {
        let key = E::primary_key();
        entity
            .as_storable_changed_array()
            .into_iter()
            .filter(|(column, _)| *column != key)
            .map(|(column, value)| (column.to_string(), value))
            .collect()
    }

    /// Queues `kind` for `entity`, replacing its existing slot if it has one.
    fn enqueue<E: Entity>(
        &mut self,
        entity: &mut E,
        kind: OperationKind,
        key: Option<Value>,
        values: Vec<(String, Value)>,
    ) -> EntityHandle {
        let existing = entity.handle().filter(|handle| self.is_queued(*handle));
        let handle = match existing {
            Some(handle) => handle,
            None => {
                self.next_handle += 1;
                EntityHandle(self.next_handle)
            }
        };
        entity.state_mut().handle = Some(handle);

        let operation = PendingOperation {
            handle,
            kind,
            table: E::table().to_string(),
            primary_key: E::primary_key().to_string(),
            key,
            values,
        };
        match self.position(handle) {
            Some(index) => self.queue[index] = operation,
            None => self.queue.push(operation),
        }
        handle
    }
}

/// Storable fields for an INSERT; a NULL primary key is left to the database.
fn insert_values<E: Entity>(entity: &E) -> Vec<(String, Value)> {
    let key = E::primary_key();
    entity
        .as_storable_array()
        .into_iter()
        .filter(|(column, value)| !(*column == key && *value == Value::Null))
        .map(|(column, value)| (column.to_string(), value))
        .collect()
}

fn require_key<E: Entity>(entity: &E, operation: &'static str) -> OrmResult<Value> {
    entity
        .primary_key_value()
        .ok_or_else(|| OrmError::MissingPrimaryKey {
            table: E::table().to_string(),
            operation,
        })
}

fn execute_operation(
    adapter: &dyn Adapter,
    dialect: Dialect,
    operation: &PendingOperation,
) -> OrmResult<ExecutedOperation> {
    let table = operation.table.as_str();
    let key = || {
        operation.key.clone().ok_or_else(|| OrmError::MissingPrimaryKey {
            table: operation.table.clone(),
            operation: operation.kind.as_str(),
        })
    };

    let (affected, inserted_id) = match operation.kind {
        OperationKind::Create => {
            let affected = Insert::with_dialect(dialect)
                .table(table)
                .set_all(operation.values.clone())
                .or_default_values()
                .create_query(adapter)?
                .affected_rows()?;
            let inserted_id = match &operation.key {
                Some(Value::Integer(id)) => Some(*id),
                Some(_) => None,
                None => Some(
                    adapter
                        .last_insert_id(Some(table), Some(&operation.primary_key))
                        .map_err(|source| OrmError::statement("create", table, source))?,
                ),
            };
            (affected, inserted_id)
        }
        OperationKind::Save | OperationKind::SoftDelete => {
            let affected = Update::with_dialect(dialect)
                .table(table)
                .set_all(operation.values.clone())
                .where_eq(operation.primary_key.as_str(), key()?)
                .create_query(adapter)?
                .affected_rows()?;
            (affected, None)
        }
        OperationKind::Delete => {
            let affected = Delete::with_dialect(dialect)
                .table(table)
                .where_eq(operation.primary_key.as_str(), key()?)
                .create_query(adapter)?
                .affected_rows()?;
            (affected, None)
        }
    };

    Ok(ExecutedOperation {
        handle: operation.handle,
        kind: operation.kind,
        table: operation.table.clone(),
        affected,
        inserted_id,
    })
}

#[cfg(test)]
mod tests {
    use super::{OperationKind, Persister, WriteOutcome};
    use crate::db::{decode_value, Adapter, Record, SqliteAdapter, Value};
    use crate::error::{OrmError, OrmResult};
    use crate::model::{Entity, EntityState};
    use crate::query::Dialect;

    #[derive(Debug, Clone, Default)]
    struct Tag {
        id: Option<i64>,
        label: String,
        state: EntityState,
    }

    impl Tag {
        fn new(label: &str) -> Self {
            Self {
                label: label.to_string(),
                ..Self::default()
            }
        }
    }

    impl Entity for Tag {
        fn table() -> &'static str {
            "tags"
        }

        fn from_record(record: &Record) -> OrmResult<Self> {
            Ok(Self {
                id: record.get("id")?,
                label: record.get("label")?,
                state: EntityState::default(),
            })
        }

        fn values(&self) -> Vec<(&'static str, Value)> {
            vec![
                ("id", self.id.map_or(Value::Null, Value::Integer)),
                ("label", Value::Text(self.label.clone())),
            ]
        }

        fn set_field(&mut self, column: &str, value: Value) -> OrmResult<()> {
            match column {
                "id" => self.id = decode_value(column, &value)?,
                "label" => self.label = decode_value(column, &value)?,
                _ => {}
            }
            Ok(())
        }

        fn state(&self) -> &EntityState {
            &self.state
        }

        fn state_mut(&mut self) -> &mut EntityState {
            &mut self.state
        }
    }

    fn adapter() -> SqliteAdapter {
        let adapter = SqliteAdapter::open_in_memory().unwrap();
        adapter
            .execute_batch(
                "CREATE TABLE tags (id INTEGER PRIMARY KEY, label TEXT NOT NULL UNIQUE);",
            )
            .unwrap();
        adapter
    }

    fn count(adapter: &SqliteAdapter) -> i64 {
        let mut stmt = adapter.query("SELECT COUNT(*) AS n FROM tags").unwrap();
        stmt.fetch().unwrap().unwrap().get("n").unwrap()
    }

    #[test]
    fn immediate_create_backfills_key_and_snapshot() {
        let adapter = adapter();
        let mut persister = Persister::new();
        let mut tag = Tag::new("rust");

        let outcome = persister
            .create(&adapter, Dialect::Sqlite, &mut tag, false)
            .unwrap();
        assert_eq!(
            outcome,
            WriteOutcome::Executed {
                affected: 1,
                last_insert_id: Some(1)
            }
        );
        assert_eq!(tag.id, Some(1));
        assert!(tag.as_storable_changed_array().is_empty());
        assert_eq!(
            persister.save(&adapter, Dialect::Sqlite, &mut tag, false).unwrap(),
            WriteOutcome::Unchanged
        );
    }

    #[test]
    fn queued_create_absorbs_save_and_is_dropped_by_delete() {
        let adapter = adapter();
        let mut persister = Persister::new();
        let mut tag = Tag::new("draft");

        let WriteOutcome::Queued(handle) = persister
            .create(&adapter, Dialect::Sqlite, &mut tag, true)
            .unwrap()
        else {
            panic!("create should queue");
        };
        tag.label = "final".to_string();
        assert_eq!(
            persister.save(&adapter, Dialect::Sqlite, &mut tag, true).unwrap(),
            WriteOutcome::Queued(handle)
        );
        assert_eq!(persister.pending().len(), 1);
        assert_eq!(persister.pending()[0].kind, OperationKind::Create);
        assert_eq!(
            persister.pending()[0].values[0],
            ("label".to_string(), Value::Text("final".to_string()))
        );

        assert_eq!(
            persister.delete(&adapter, Dialect::Sqlite, &mut tag, true).unwrap(),
            WriteOutcome::Dequeued(handle)
        );
        assert!(persister.pending().is_empty());
        assert!(tag.handle().is_none());
    }

    #[test]
    fn requeue_replaces_slot_in_place() {
        let adapter = adapter();
        let mut persister = Persister::new();
        let mut first = Tag::new("a");
        let mut second = Tag::new("b");
        persister.create(&adapter, Dialect::Sqlite, &mut first, false).unwrap();
        persister.create(&adapter, Dialect::Sqlite, &mut second, false).unwrap();

        first.label = "a2".to_string();
        persister.save(&adapter, Dialect::Sqlite, &mut first, true).unwrap();
        assert_eq!(
            persister.save(&adapter, Dialect::Sqlite, &mut second, true).unwrap(),
            WriteOutcome::Unchanged
        );
        persister.delete(&adapter, Dialect::Sqlite, &mut first, true).unwrap();

        assert_eq!(persister.pending().len(), 1);
        assert_eq!(persister.pending()[0].kind, OperationKind::Delete);
    }

    #[test]
    fn persist_is_atomic_and_clears_queue_on_failure() {
        let adapter = adapter();
        let mut persister = Persister::new();
        let mut a = Tag::new("one");
        let mut b = Tag::new("one");
        let mut c = Tag::new("three");
        for tag in [&mut a, &mut b, &mut c] {
            persister.create(&adapter, Dialect::Sqlite, tag, true).unwrap();
        }

        let err = persister.persist(&adapter, Dialect::Sqlite).unwrap_err();
        assert!(matches!(
            err,
            OrmError::PersistFailed { index: 1, kind: OperationKind::Create, .. }
        ));
        assert_eq!(count(&adapter), 0);
        assert!(persister.pending().is_empty());
        assert!(!adapter.in_transaction());
    }

    #[test]
    fn persist_reports_inserted_ids_in_order() {
        let adapter = adapter();
        let mut persister = Persister::new();
        let mut a = Tag::new("x");
        let mut b = Tag::new("y");
        persister.create(&adapter, Dialect::Sqlite, &mut a, true).unwrap();
        persister.create(&adapter, Dialect::Sqlite, &mut b, true).unwrap();

        let report = persister.persist(&adapter, Dialect::Sqlite).unwrap();
        assert_eq!(report.executed.len(), 2);
        assert!(report.apply(&mut a).unwrap());
        assert!(report.apply(&mut b).unwrap());
        assert_eq!((a.id, b.id), (Some(1), Some(2)));
        assert!(a.as_storable_changed_array().is_empty());
        assert!(a.handle().is_none());
    }

    #[test]
    fn empty_persist_is_a_no_op() {
        let adapter = adapter();
        let mut persister = Persister::new();
        for _ in 0..2 {
            let report = persister.persist(&adapter, Dialect::Sqlite).unwrap();
            assert!(report.is_empty());
            assert!(!adapter.in_transaction());
        }
    }

    #[test]
    fn delete_without_key_and_soft_delete_without_columns_fail() {
        let adapter = adapter();
        let mut persister = Persister::new();
        let mut tag = Tag::new("loose");
        assert!(matches!(
            persister.delete(&adapter, Dialect::Sqlite, &mut tag, false),
            Err(OrmError::MissingPrimaryKey { operation: "delete", .. })
        ));
        assert!(matches!(
            persister.soft_delete(&adapter, Dialect::Sqlite, &mut tag, false),
            Err(OrmError::NotSoftDeletable { .. })
        ));
    }

    #[test]
    fn clear_removes_one_or_all() {
        let adapter = adapter();
        let mut persister = Persister::new();
        let mut a = Tag::new("a");
        let mut b = Tag::new("b");
        persister.create(&adapter, Dialect::Sqlite, &mut a, true).unwrap();
        persister.create(&adapter, Dialect::Sqlite, &mut b, true).unwrap();

        assert_eq!(persister.clear(a.handle()), 1);
        assert_eq!(persister.clear(a.handle()), 0);
        assert_eq!(persister.clear(None), 1);
        assert!(persister.pending().is_empty());
    }

    #[test]
    fn immediate_create_supersedes_queued_create() {
        let adapter = adapter();
        let mut persister = Persister::new();
        let mut tag = Tag::new("once");

        persister.create(&adapter, Dialect::Sqlite, &mut tag, true).unwrap();
        assert!(matches!(
            persister.create(&adapter, Dialect::Sqlite, &mut tag, false).unwrap(),
            WriteOutcome::Executed { affected: 1, .. }
        ));
        assert!(persister.pending().is_empty());
        assert!(tag.handle().is_none());

        assert!(persister.persist(&adapter, Dialect::Sqlite).unwrap().is_empty());
        assert_eq!(count(&adapter), 1);
    }

    #[derive(Debug, Default)]
    struct Ticket {
        id: Option<i64>,
        state: EntityState,
    }

    impl Entity for Ticket {
        fn table() -> &'static str {
            "tickets"
        }

        fn from_record(record: &Record) -> OrmResult<Self> {
            Ok(Self {
                id: record.get("id")?,
                state: EntityState::default(),
            })
        }

        fn values(&self) -> Vec<(&'static str, Value)> {
            vec![("id", self.id.map_or(Value::Null, Value::Integer))]
        }

        fn set_field(&mut self, column: &str, value: Value) -> OrmResult<()> {
            if column == "id" {
                self.id = decode_value(column, &value)?;
            }
            Ok(())
        }

        fn state(&self) -> &EntityState {
            &self.state
        }

        fn state_mut(&mut self) -> &mut EntityState {
            &mut self.state
        }
    }

    #[test]
    fn key_only_entities_insert_a_default_row() {
        let adapter = adapter();
        adapter
            .execute_batch("CREATE TABLE tickets (id INTEGER PRIMARY KEY);")
            .unwrap();
        let mut persister = Persister::new();

        let mut first = Ticket::default();
        persister.create(&adapter, Dialect::Sqlite, &mut first, false).unwrap();
        assert_eq!(first.id, Some(1));

        let mut second = Ticket::default();
        persister.create(&adapter, Dialect::Sqlite, &mut second, true).unwrap();
        let report = persister.persist(&adapter, Dialect::Sqlite).unwrap();
        assert!(report.apply(&mut second).unwrap());
        assert_eq!(second.id, Some(2));
    }
}
