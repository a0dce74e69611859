//! UPDATE builder.

use super::builder::{render_joins, Bindings, CompiledSql, Dialect, Join, JoinClause, TableTarget, Target};
use super::insert::upsert;
use super::predicate::{Filter, WhereClause};
use super::select::Select;
use super::{BuilderError, BuilderResult, QueryBuilder};
use crate::db::{IntoValue, Value};

/// `UPDATE table SET … [WHERE …]`.
///
/// Joined updates render as `UPDATE … JOIN … SET` on MySQL and as a
/// `rowid IN (SELECT …)` scope on SQLite.
#[derive(Debug, Clone, Default)]
pub struct Update {
    dialect: Dialect,
    target: Target,
    values: Vec<(String, Value)>,
    joins: Vec<JoinClause>,
    wheres: WhereClause,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dialect(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Self::default()
        }
    }

    pub fn set(mut self, column: impl Into<String>, value: impl IntoValue) -> Self {
        upsert(&mut self.values, column.into(), value.into_value());
        self
    }

    pub fn set_all<I, K>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        for (column, value) in values {
            upsert(&mut self.values, column.into(), value);
        }
        self
    }
}

impl TableTarget for Update {
    fn target_mut(&mut self) -> &mut Target {
        &mut self.target
    }
}

impl Filter for Update {
    fn where_clause_mut(&mut self) -> &mut WhereClause {
        &mut self.wheres
    }
}

impl Join for Update {
    fn joins_mut(&mut self) -> &mut Vec<JoinClause> {
        &mut self.joins
    }
}

impl QueryBuilder for Update {
    fn compile(&self) -> BuilderResult<CompiledSql> {
        let dialect = self.dialect;
        let table = self.target.table_name("update")?;
        if self.values.is_empty() {
            return Err(BuilderError::EmptySet("update"));
        }

        let mut bindings = Bindings::default();
        let mut assignments = Vec::with_capacity(self.values.len());
        for (column, value) in &self.values {
            let column = dialect.quote_reference(column)?;
            assignments.push(format!("{column} = {}", bindings.push(value.clone())));
        }
        let assignments = assignments.join(", ");

        let sql = if self.joins.is_empty() {
            let mut sql = format!(
                "UPDATE {} SET {assignments}",
                self.target.render(dialect, "update")?
            );
            if let Some(predicates) = self.wheres.render(dialect, &mut bindings)? {
                sql.push_str(" WHERE ");
                sql.push_str(&predicates);
            }
            sql
        } else {
            match dialect {
                Dialect::Sqlite => {
                    let scope = Select::rowid_scope(
                        dialect,
                        self.target.clone(),
                        self.joins.clone(),
                        self.wheres.clone(),
                    );
                    format!(
                        "UPDATE {} SET {assignments} WHERE \"rowid\" IN ({})",
                        dialect.quote_identifier(table)?,
                        scope.render(&mut bindings)?
                    )
                }
                Dialect::MySql => {
                    // Placeholders are named, so bind order may differ from text order.
                    let mut sql = format!(
                        "UPDATE {}{} SET {assignments}",
                        self.target.render(dialect, "update")?,
                        render_joins(&self.joins, dialect, &mut bindings)?
                    );
                    if let Some(predicates) = self.wheres.render(dialect, &mut bindings)? {
                        sql.push_str(" WHERE ");
                        sql.push_str(&predicates);
                    }
                    sql
                }
            }
        };

        Ok(CompiledSql {
            sql,
            params: bindings.into_params(),
            table: table.to_string(),
        })
    }
}
