//! SQL construction and execution.
//!
//! # Responsibility
//! - Fluent, owned builders for SELECT/INSERT/UPDATE/DELETE.
//! - `Query`: SQL text plus named parameters bound against one adapter, with
//!   entity-mapping terminals.
//!
//! # Invariants
//! - Builders never touch a database; they only render `CompiledSql`.
//! - Values always travel as bound parameters, never inline.
//!
//! # See also
//! - `crate::repo::retriever` for the entity-scoped select wrapper.

pub mod builder;
pub mod delete;
pub mod insert;
pub mod predicate;
pub mod select;
pub mod update;

pub use builder::{CompiledSql, Dialect, Join, JoinClause, JoinOperand, JoinType, TableTarget};
pub use delete::Delete;
pub use insert::Insert;
pub use predicate::{Conjunction, Filter, Operator, WhereClause};
pub use select::{Direction, Select};
pub use update::Update;

use crate::db::{Adapter, IntoValue, Record, Statement, Value};
use crate::error::{OrmError, OrmResult};
use crate::model::entity::{hydrate, Entity};
use thiserror::Error;

pub type BuilderResult<T> = Result<T, BuilderError>;

/// Rendering failures. Raised by `compile()`, never by chaining calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuilderError {
    #[error("{0} builder has no target table")]
    MissingTable(&'static str),
    #[error("`{0}` is not a valid SQL identifier")]
    InvalidIdentifier(String),
    #[error("where group closed without a matching open group")]
    UnbalancedGroup,
    #[error("{open} where group(s) left open")]
    UnclosedGroup { open: usize },
    #[error("{0} builder has no values to set")]
    EmptySet(&'static str),
    #[error("`{0}` is not a supported operator")]
    UnknownOperator(String),
    #[error("{feature} is not supported by the {dialect} dialect")]
    Unsupported {
        feature: String,
        dialect: &'static str,
    },
}

/// Common terminal contract of every builder.
pub trait QueryBuilder {
    /// Renders SQL text and collects bound parameters.
    fn compile(&self) -> BuilderResult<CompiledSql>;

    fn get_query_string(&self) -> BuilderResult<String> {
        self.compile().map(|compiled| compiled.sql)
    }

    /// Compiles and pairs the result with `adapter`.
    fn create_query<'a>(&self, adapter: &'a dyn Adapter) -> BuilderResult<Query<'a>> {
        Ok(Query::from_compiled(adapter, self.compile()?))
    }
}

/// Executable SQL bound to one adapter.
pub struct Query<'a> {
    adapter: &'a dyn Adapter,
    sql: String,
    table: String,
    params: Vec<(String, Value)>,
}

impl<'a> Query<'a> {
    /// Raw SQL against `adapter`; see `for_table` for error context.
    pub fn new(adapter: &'a dyn Adapter, sql: impl Into<String>) -> Self {
        Self {
            adapter,
            sql: sql.into(),
            table: String::new(),
            params: Vec::new(),
        }
    }

    pub(crate) fn from_compiled(adapter: &'a dyn Adapter, compiled: CompiledSql) -> Self {
        Self {
            adapter,
            sql: compiled.sql,
            table: compiled.table,
            params: compiled.params,
        }
    }

    /// Table named in execution errors.
    pub fn for_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn parameters(&self) -> &[(String, Value)] {
        &self.params
    }

    /// Binds (or re-binds) a named parameter. A missing `:` prefix is added.
    pub fn bind(mut self, name: &str, value: impl IntoValue) -> Self {
        let key = if name.starts_with(':') {
            name.to_string()
        } else {
            format!(":{name}")
        };
        let value = value.into_value();
        match self.params.iter_mut().find(|(bound, _)| *bound == key) {
            Some(slot) => slot.1 = value,
            None => self.params.push((key, value)),
        }
        self
    }

    /// Prepares, binds and executes; returns the executed statement.
    pub fn execute(&self) -> OrmResult<Box<dyn Statement + 'a>> {
        let operation = operation_name(&self.sql);
        let wrap = |source| OrmError::statement(operation, self.table.clone(), source);

        let mut statement = self.adapter.prepare(&self.sql).map_err(wrap)?;
        for (name, value) in &self.params {
            statement.bind_value(name, value.clone()).map_err(wrap)?;
        }
        statement.execute().map_err(wrap)?;
        Ok(statement)
    }

    /// Rows affected by a write (or rows returned by a read).
    pub fn affected_rows(&self) -> OrmResult<usize> {
        Ok(self.execute()?.row_count())
    }

    pub fn get_records(&self) -> OrmResult<Vec<Record>> {
        let operation = operation_name(&self.sql);
        self.execute()?
            .fetch_all()
            .map_err(|source| OrmError::statement(operation, self.table.clone(), source))
    }

    /// Maps every row to `E`, capturing each entity's original snapshot.
    pub fn get_result<E: Entity>(&self) -> OrmResult<Vec<E>> {
        self.get_records()?.iter().map(hydrate::<E>).collect()
    }

    pub fn get_one_or_null<E: Entity>(&self) -> OrmResult<Option<E>> {
        let operation = operation_name(&self.sql);
        let record = self
            .execute()?
            .fetch()
            .map_err(|source| OrmError::statement(operation, self.table.clone(), source))?;
        record.as_ref().map(hydrate::<E>).transpose()
    }

    pub fn get_one_or_fail<E: Entity>(&self) -> OrmResult<E> {
        self.get_one_or_null()?.ok_or_else(|| OrmError::EntityNotFound {
            table: E::table().to_string(),
            criteria: format!("query `{}`", crate::logging::sql_summary(&self.sql)),
        })
    }

    /// First column of the first row.
    pub fn get_scalar(&self) -> OrmResult<Option<Value>> {
        let operation = operation_name(&self.sql);
        self.execute()?
            .fetch_column(0)
            .map_err(|source| OrmError::statement(operation, self.table.clone(), source))
    }
}

fn operation_name(sql: &str) -> &'static str {
    let keyword = sql
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    match keyword.as_str() {
        "select" | "with" => "select",
        "insert" => "insert",
        "update" => "update",
        "delete" => "delete",
        "create" | "alter" | "drop" => "ddl",
        _ => "query",
    }
}
