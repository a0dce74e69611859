//! Schema migration registry and executor.
//!
//! # Responsibility
//! - Apply registered migrations in id order, each exactly once.
//! - Roll back the most recently applied migration.
//!
//! # Invariants
//! - Ids are applied in ascending lexical order.
//! - A migration and its bookkeeping row commit or roll back together.
//! - Applied ids are recorded in `quarry_migrations`.
//!
//! # See also
//! - `crate::schema` for the builders migrations describe changes with.

use crate::db::Adapter;
use crate::error::{OrmError, OrmResult};
use crate::model::now_timestamp;
use crate::query::{Delete, Dialect, Filter, Insert, QueryBuilder, Select, TableTarget};
use crate::schema::{Column, Schema, Table};
use log::{error, info, warn};
use std::collections::BTreeMap;
use std::time::Instant;

/// Bookkeeping table holding applied migration ids.
pub const MIGRATIONS_TABLE: &str = "quarry_migrations";

/// One reversible schema change.
pub trait Migration {
    fn up(&self, schema: &mut Schema<'_>) -> OrmResult<()>;

    fn down(&self, schema: &mut Schema<'_>) -> OrmResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
}

impl Direction {
    fn label(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

/// Applies registered migrations against one adapter.
pub struct Migrator<'a> {
    adapter: &'a dyn Adapter,
    dialect: Dialect,
    migrations: BTreeMap<String, Box<dyn Migration>>,
}

impl<'a> Migrator<'a> {
    pub fn new(adapter: &'a dyn Adapter, dialect: Dialect) -> Self {
        Self {
            adapter,
            dialect,
            migrations: BTreeMap::new(),
        }
    }

    pub fn register(mut self, id: impl Into<String>, migration: Box<dyn Migration>) -> Self {
        self.migrations.insert(id.into(), migration);
        self
    }

    /// Registered ids in application order.
    pub fn registered(&self) -> Vec<&str> {
        self.migrations.keys().map(String::as_str).collect()
    }

    /// Ids recorded as applied, ascending.
    pub fn applied(&self) -> OrmResult<Vec<String>> {
        self.ensure_table()?;
        let records = Select::with_dialect(self.dialect)
            .table(MIGRATIONS_TABLE)
            .columns(["id"])
            .order_by_asc("id")
            .create_query(self.adapter)?
            .get_records()?;
        records
            .iter()
            .map(|record| record.get::<String>("id").map_err(OrmError::from))
            .collect()
    }

    /// Registered ids not applied yet, in application order.
    pub fn pending(&self) -> OrmResult<Vec<String>> {
        let applied = self.applied()?;
        for id in &applied {
            if !self.migrations.contains_key(id) {
                warn!("event=migration_apply module=db status=unknown_applied id={id}");
            }
        }
        Ok(self
            .migrations
            .keys()
            .filter(|id| !applied.contains(id))
            .cloned()
            .collect())
    }

    /// Applies every pending migration; returns the ids applied.
    ///
    /// # Errors
    /// - The first failing migration aborts the run; earlier ones stay
    ///   applied, the failing one leaves no trace.
    pub fn migrate(&self) -> OrmResult<Vec<String>> {
        let pending = self.pending()?;
        let mut applied = Vec::with_capacity(pending.len());
        for id in pending {
            if let Some(migration) = self.migrations.get(&id) {
                self.run(&id, migration.as_ref(), Direction::Up)?;
                applied.push(id);
            }
        }
        Ok(applied)
    }

    /// Reverts the most recently applied migration, if any.
    pub fn rollback_last(&self) -> OrmResult<Option<String>> {
        let Some(id) = self.applied()?.pop() else {
            return Ok(None);
        };
        let migration = self.migrations.get(&id).ok_or_else(|| OrmError::Schema {
            table: MIGRATIONS_TABLE.to_string(),
            message: format!("migration `{id}` is applied but not registered"),
        })?;
        self.run(&id, migration.as_ref(), Direction::Down)?;
        Ok(Some(id))
    }

    fn ensure_table(&self) -> OrmResult<()> {
        let table = Table::create(MIGRATIONS_TABLE)
            .if_not_exists()
            .column(Column::varchar("id", 191).primary_key())
            .column(Column::varchar("applied_at", 19).not_null());
        Schema::new(self.adapter, self.dialect).execute(&table)?;
        Ok(())
    }

    fn run(&self, id: &str, migration: &dyn Migration, direction: Direction) -> OrmResult<()> {
        let started_at = Instant::now();
        info!(
            "event=migration_apply module=db status=start id={} direction={}",
            id,
            direction.label()
        );

        let began = self.adapter.ensure_transaction()?;
        match self.step(id, migration, direction) {
            Ok(()) => {
                if began {
                    self.adapter.commit()?;
                }
                info!(
                    "event=migration_apply module=db status=ok id={} direction={} duration_ms={}",
                    id,
                    direction.label(),
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                if began {
                    if let Err(rollback_err) = self.adapter.rollback() {
                        warn!(
                            "event=migration_apply module=db status=rollback_failed id={} error={}",
                            id, rollback_err
                        );
                    }
                }
                error!(
                    "event=migration_apply module=db status=error id={} direction={} duration_ms={} error={}",
                    id,
                    direction.label(),
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn step(&self, id: &str, migration: &dyn Migration, direction: Direction) -> OrmResult<()> {
        let mut schema = Schema::new(self.adapter, self.dialect);
        match direction {
            Direction::Up => migration.up(&mut schema)?,
            Direction::Down => migration.down(&mut schema)?,
        }
        schema.execute_all()?;

        match direction {
            Direction::Up => Insert::with_dialect(self.dialect)
                .table(MIGRATIONS_TABLE)
                .set("id", id)
                .set("applied_at", now_timestamp())
                .create_query(self.adapter)?
                .execute()?,
            Direction::Down => Delete::with_dialect(self.dialect)
                .table(MIGRATIONS_TABLE)
                .where_eq("id", id)
                .create_query(self.adapter)?
                .execute()?,
        };
        Ok(())
    }
}
