//! DELETE builder.

use super::builder::{render_joins, Bindings, CompiledSql, Dialect, Join, JoinClause, TableTarget, Target};
use super::predicate::{Filter, WhereClause};
use super::select::Select;
use super::{BuilderResult, QueryBuilder};

/// `DELETE FROM table [WHERE …]`.
#[derive(Debug, Clone, Default)]
pub struct Delete {
    dialect: Dialect,
    target: Target,
    joins: Vec<JoinClause>,
    wheres: WhereClause,
}

impl Delete {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dialect(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Self::default()
        }
    }
}

impl TableTarget for Delete {
    fn target_mut(&mut self) -> &mut Target {
        &mut self.target
    }
}

impl Filter for Delete {
    fn where_clause_mut(&mut self) -> &mut WhereClause {
        &mut self.wheres
    }
}

impl Join for Delete {
    fn joins_mut(&mut self) -> &mut Vec<JoinClause> {
        &mut self.joins
    }
}

impl QueryBuilder for Delete {
    fn compile(&self) -> BuilderResult<CompiledSql> {
        let dialect = self.dialect;
        let table = self.target.table_name("delete")?;
        let mut bindings = Bindings::default();

        let sql = match (dialect, self.joins.is_empty()) {
            (_, true) => {
                let mut sql = format!("DELETE FROM {}", self.target.render(dialect, "delete")?);
                if let Some(predicates) = self.wheres.render(dialect, &mut bindings)? {
                    sql.push_str(" WHERE ");
                    sql.push_str(&predicates);
                }
                sql
            }
            (Dialect::Sqlite, false) => {
                let scope = Select::rowid_scope(
                    dialect,
                    self.target.clone(),
                    self.joins.clone(),
                    self.wheres.clone(),
                );
                format!(
                    "DELETE FROM {} WHERE \"rowid\" IN ({})",
                    dialect.quote_identifier(table)?,
                    scope.render(&mut bindings)?
                )
            }
            (Dialect::MySql, false) => {
                let deleted = self.target.alias.as_deref().unwrap_or(table);
                let mut sql = format!(
                    "DELETE {} FROM {}{}",
                    dialect.quote_identifier(deleted)?,
                    self.target.render(dialect, "delete")?,
                    render_joins(&self.joins, dialect, &mut bindings)?
                );
                if let Some(predicates) = self.wheres.render(dialect, &mut bindings)? {
                    sql.push_str(" WHERE ");
                    sql.push_str(&predicates);
                }
                sql
            }
        };

        Ok(CompiledSql {
            sql,
            params: bindings.into_params(),
            table: table.to_string(),
        })
    }
}
