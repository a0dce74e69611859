//! Prepared command contract and its SQLite implementation.
//!
//! # Responsibility
//! - Hold one prepared command plus its bound named parameters.
//! - Execute it and buffer the produced rows for `fetch*` calls.
//!
//! # Invariants
//! - Parameters are bound by name; binding a name the SQL does not declare
//!   fails immediately with `DbError::UnknownParameter`.
//! - `row_count()` is the affected-row count for writes and the buffered row
//!   count for reads.

use super::{DbError, DbResult, Record};
use crate::logging::sql_summary;
use log::{debug, error};
use rusqlite::types::Value;
use std::collections::VecDeque;
use std::time::Instant;

/// One prepared or executed database command.
pub trait Statement {
    /// SQL text this statement was prepared from.
    fn sql(&self) -> &str;

    /// Binds (or re-binds) one named parameter. A missing `:` prefix is added.
    fn bind_value(&mut self, name: &str, value: Value) -> DbResult<()>;

    /// Executes with the current bindings, replacing any buffered rows.
    fn execute(&mut self) -> DbResult<()>;

    /// Takes the next buffered row.
    fn fetch(&mut self) -> DbResult<Option<Record>>;

    /// Takes the next buffered row and returns one of its columns.
    fn fetch_column(&mut self, index: usize) -> DbResult<Option<Value>>;

    /// Drains every remaining buffered row.
    fn fetch_all(&mut self) -> DbResult<Vec<Record>>;

    fn row_count(&self) -> usize;

    fn column_count(&self) -> usize;

    /// Message of the last failure seen by this statement, if any.
    fn error_info(&self) -> Option<&str>;
}

/// Statement backed by a borrowed `rusqlite::Statement`.
pub struct SqliteStatement<'conn> {
    sql: String,
    inner: rusqlite::Statement<'conn>,
    bound: Vec<(String, Value)>,
    rows: VecDeque<Record>,
    row_count: usize,
    last_error: Option<String>,
}

impl<'conn> SqliteStatement<'conn> {
    pub(crate) fn new(sql: &str, inner: rusqlite::Statement<'conn>) -> Self {
        Self {
            sql: sql.to_string(),
            inner,
            bound: Vec::new(),
            rows: VecDeque::new(),
            row_count: 0,
            last_error: None,
        }
    }

    fn run(&mut self) -> DbResult<()> {
        for (name, value) in &self.bound {
            let index = self
                .inner
                .parameter_index(name)
                .map_err(|source| DbError::Execute {
                    sql: self.sql.clone(),
                    source,
                })?
                .ok_or_else(|| DbError::UnknownParameter {
                    name: name.clone(),
                    sql: self.sql.clone(),
                })?;
            self.inner
                .raw_bind_parameter(index, value)
                .map_err(|source| DbError::Execute {
                    sql: self.sql.clone(),
                    source,
                })?;
        }

        if self.inner.column_count() == 0 {
            self.row_count = self
                .inner
                .raw_execute()
                .map_err(|source| DbError::Execute {
                    sql: self.sql.clone(),
                    source,
                })?;
            return Ok(());
        }

        let columns: Vec<String> = self
            .inner
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let width = columns.len();
        let mut rows = self.inner.raw_query();
        while let Some(row) = rows.next().map_err(|source| DbError::Execute {
            sql: self.sql.clone(),
            source,
        })? {
            let mut values = Vec::with_capacity(width);
            for index in 0..width {
                values.push(row.get::<_, Value>(index)?);
            }
            self.rows.push_back(Record::new(columns.clone(), values));
        }
        self.row_count = self.rows.len();
        Ok(())
    }
}

impl Statement for SqliteStatement<'_> {
    fn sql(&self) -> &str {
        &self.sql
    }

    fn bind_value(&mut self, name: &str, value: Value) -> DbResult<()> {
        let key = normalize_parameter_name(name);
        match self.inner.parameter_index(&key) {
            Ok(Some(_)) => {}
            Ok(None) => {
                let err = DbError::UnknownParameter {
                    name: key,
                    sql: self.sql.clone(),
                };
                self.last_error = Some(err.to_string());
                return Err(err);
            }
            Err(source) => {
                let err = DbError::Execute {
                    sql: self.sql.clone(),
                    source,
                };
                self.last_error = Some(err.to_string());
                return Err(err);
            }
        }

        match self.bound.iter_mut().find(|(bound, _)| *bound == key) {
            Some(slot) => slot.1 = value,
            None => self.bound.push((key, value)),
        }
        Ok(())
    }

    fn execute(&mut self) -> DbResult<()> {
        let started_at = Instant::now();
        self.rows.clear();
        self.row_count = 0;

        match self.run() {
            Ok(()) => {
                self.last_error = None;
                debug!(
                    "event=statement_execute module=db status=ok rows={} duration_ms={} sql={}",
                    self.row_count,
                    started_at.elapsed().as_millis(),
                    sql_summary(&self.sql)
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=statement_execute module=db status=error duration_ms={} sql={} error={}",
                    started_at.elapsed().as_millis(),
                    sql_summary(&self.sql),
                    err
                );
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    fn fetch(&mut self) -> DbResult<Option<Record>> {
        Ok(self.rows.pop_front())
    }

    fn fetch_column(&mut self, index: usize) -> DbResult<Option<Value>> {
        Ok(self
            .rows
            .pop_front()
            .and_then(|record| record.value_at(index).cloned()))
    }

    fn fetch_all(&mut self) -> DbResult<Vec<Record>> {
        Ok(self.rows.drain(..).collect())
    }

    fn row_count(&self) -> usize {
        self.row_count
    }

    fn column_count(&self) -> usize {
        self.inner.column_count()
    }

    fn error_info(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

fn normalize_parameter_name(name: &str) -> String {
    if name.starts_with([':', '@', '$']) {
        name.to_string()
    } else {
        format!(":{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::normalize_parameter_name;
    use crate::db::{Adapter, DbError, SqliteAdapter};
    use rusqlite::types::Value;

    fn adapter() -> SqliteAdapter {
        let adapter = SqliteAdapter::open_in_memory().expect("in-memory adapter");
        adapter
            .execute_batch(
                "CREATE TABLE items (id INTEGER PRIMARY KEY, label TEXT NOT NULL);
                 INSERT INTO items (label) VALUES ('a'), ('b'), ('c');",
            )
            .expect("fixture");
        adapter
    }

    #[test]
    fn parameter_names_get_a_colon_prefix() {
        assert_eq!(normalize_parameter_name("p1"), ":p1");
        assert_eq!(normalize_parameter_name(":p1"), ":p1");
    }

    #[test]
    fn fetch_walks_buffered_rows_in_order() {
        let adapter = adapter();
        let mut stmt = adapter
            .prepare("SELECT id, label FROM items WHERE id >= :min ORDER BY id")
            .unwrap();
        stmt.bind_value("min", Value::Integer(2)).unwrap();
        stmt.execute().unwrap();

        assert_eq!(stmt.row_count(), 2);
        assert_eq!(stmt.column_count(), 2);
        let first = stmt.fetch().unwrap().unwrap();
        assert_eq!(first.get::<String>("label").unwrap(), "b");
        assert_eq!(
            stmt.fetch_column(1).unwrap(),
            Some(Value::Text("c".to_string()))
        );
        assert!(stmt.fetch().unwrap().is_none());
    }

    #[test]
    fn write_statements_report_affected_rows() {
        let adapter = adapter();
        let mut stmt = adapter
            .prepare("UPDATE items SET label = :label WHERE id <= 2")
            .unwrap();
        stmt.bind_value(":label", Value::Text("z".to_string()))
            .unwrap();
        stmt.execute().unwrap();
        assert_eq!(stmt.row_count(), 2);
        assert!(stmt.fetch_all().unwrap().is_empty());
    }

    #[test]
    fn unknown_parameter_is_rejected_and_recorded() {
        let adapter = adapter();
        let mut stmt = adapter.prepare("SELECT * FROM items").unwrap();
        let err = stmt.bind_value("nope", Value::Null).unwrap_err();
        assert!(matches!(err, DbError::UnknownParameter { .. }));
        assert!(stmt.error_info().unwrap().contains(":nope"));
    }

    #[test]
    fn constraint_violation_is_an_execute_error() {
        let adapter = adapter();
        let mut stmt = adapter
            .prepare("INSERT INTO items (label) VALUES (:label)")
            .unwrap();
        stmt.bind_value("label", Value::Null).unwrap();
        let err = stmt.execute().unwrap_err();
        assert!(matches!(err, DbError::Execute { .. }));
        assert!(stmt.error_info().is_some());
    }
}
