//! Schema (DDL) builders and their executor.
//!
//! # Responsibility
//! - Describe table, column, index and constraint changes as values.
//! - Execute them against one adapter, honoring existence guards.
//!
//! # Invariants
//! - Statements run in the order tables were added and, within a table, in
//!   the order `Table::statements` returns them.
//! - A statement whose precondition does not hold is skipped, not failed.
//! - `execute_all` commits only a transaction it began itself.
//!
//! # See also
//! - `crate::db::migrations` for the main consumer.

pub mod column;
pub mod constraint;
pub mod index;
pub mod table;

pub use column::{Column, ColumnAction, ColumnType};
pub use constraint::{Constraint, ConstraintAction, ConstraintKind, ReferentialAction};
pub use index::{Index, IndexAction};
pub use table::{Table, TableAction};

use crate::db::{Adapter, DbResult, Value};
use crate::error::{OrmError, OrmResult};
use crate::logging::sql_summary;
use crate::query::Dialect;
use log::{debug, error, info, warn};
use std::time::Instant;

/// Existence guard attached to a table, column or index change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Guard {
    #[default]
    None,
    IfExists,
    IfNotExists,
}

/// Catalog condition checked right before a statement runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    TableExists(String),
    ColumnExists(String, String),
    ColumnMissing(String, String),
}

impl Precondition {
    fn holds(&self, adapter: &dyn Adapter) -> DbResult<bool> {
        match self {
            Self::TableExists(table) => adapter.table_exists(table),
            Self::ColumnExists(table, column) => adapter.column_exists(table, column),
            Self::ColumnMissing(table, column) => {
                adapter.column_exists(table, column).map(|exists| !exists)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdlStatement {
    pub sql: String,
    pub precondition: Option<Precondition>,
}

impl DdlStatement {
    pub(crate) fn new(sql: String) -> Self {
        Self {
            sql,
            precondition: None,
        }
    }

    pub(crate) fn when(mut self, precondition: Precondition) -> Self {
        self.precondition = Some(precondition);
        self
    }
}

/// SQL literal for DDL defaults, where parameters cannot be bound.
pub(crate) fn render_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(number) => number.to_string(),
        Value::Real(number) => number.to_string(),
        Value::Text(text) => format!("'{}'", text.replace('\'', "''")),
        Value::Blob(bytes) => {
            let hex: String = bytes.iter().map(|byte| format!("{byte:02X}")).collect();
            format!("X'{hex}'")
        }
    }
}

/// Accumulates table changes and executes them against one adapter.
pub struct Schema<'a> {
    adapter: &'a dyn Adapter,
    dialect: Dialect,
    tables: Vec<Table>,
    last_error: Option<String>,
}

impl<'a> Schema<'a> {
    pub fn new(adapter: &'a dyn Adapter, dialect: Dialect) -> Self {
        Self {
            adapter,
            dialect,
            tables: Vec::new(),
            last_error: None,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Queues a table change for `execute_all`.
    pub fn table(&mut self, table: Table) -> &mut Self {
        self.tables.push(table);
        self
    }

    pub fn pending(&self) -> &[Table] {
        &self.tables
    }

    /// Message of the last failed execution, if any.
    pub fn get_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Executes one table change immediately; returns statements run.
    ///
    /// # Errors
    /// - `OrmError::Builder` when the change cannot be rendered.
    /// - `OrmError::Schema` when a statement or catalog check fails.
    pub fn execute(&mut self, table: &Table) -> OrmResult<usize> {
        match self.run(table) {
            Ok(executed) => {
                self.last_error = None;
                Ok(executed)
            }
            Err(err) => {
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Executes every queued change in one ensured transaction and clears
    /// the queue. On failure the transaction is rolled back if this call
    /// began it and the queue is kept.
    pub fn execute_all(&mut self) -> OrmResult<usize> {
        if self.tables.is_empty() {
            return Ok(0);
        }
        let began = self.adapter.ensure_transaction()?;
        let tables = std::mem::take(&mut self.tables);

        let mut executed = 0;
        for table in &tables {
            match self.execute(table) {
                Ok(count) => executed += count,
                Err(err) => {
                    self.abort(began, tables);
                    return Err(err);
                }
            }
        }

        if began {
            if let Err(err) = self.adapter.commit() {
                self.last_error = Some(err.to_string());
                self.abort(began, tables);
                return Err(err.into());
            }
        }
        Ok(executed)
    }

    /// Rolls back a transaction this schema began and requeues `tables`.
    fn abort(&mut self, began: bool, tables: Vec<Table>) {
        if began && self.adapter.in_transaction() {
            if let Err(rollback_err) = self.adapter.rollback() {
                warn!(
                    "event=schema_execute module=schema status=rollback_failed error={}",
                    rollback_err
                );
            }
        }
        self.tables = tables;
    }

    fn run(&self, table: &Table) -> OrmResult<usize> {
        let started_at = Instant::now();
        let statements = table.statements(self.dialect)?;
        let mut executed = 0;

        for statement in &statements {
            if let Some(precondition) = &statement.precondition {
                let holds = precondition
                    .holds(self.adapter)
                    .map_err(|err| self.schema_error(table, err.to_string()))?;
                if !holds {
                    debug!(
                        "event=schema_execute module=schema status=skipped table={} sql={}",
                        table.name(),
                        sql_summary(&statement.sql)
                    );
                    continue;
                }
            }
            if let Err(err) = self.adapter.execute_batch(&statement.sql) {
                error!(
                    "event=schema_execute module=schema status=error table={} sql={} error={}",
                    table.name(),
                    sql_summary(&statement.sql),
                    err
                );
                return Err(self.schema_error(table, err.to_string()));
            }
            executed += 1;
        }

        info!(
            "event=schema_execute module=schema status=ok table={} statements={} duration_ms={}",
            table.name(),
            executed,
            started_at.elapsed().as_millis()
        );
        Ok(executed)
    }

    fn schema_error(&self, table: &Table, message: String) -> OrmError {
        OrmError::Schema {
            table: table.name().to_string(),
            message,
        }
    }
}
