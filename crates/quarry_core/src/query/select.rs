//! SELECT builder.

use super::builder::{render_joins, Bindings, CompiledSql, Dialect, Join, JoinClause, TableTarget, Target};
use super::predicate::{Filter, WhereClause};
use super::{BuilderResult, QueryBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SelectColumn {
    Reference(String),
    Raw(String),
}

/// `SELECT … FROM … [JOIN …] [WHERE …] [GROUP BY …] [ORDER BY …] [LIMIT …]`.
#[derive(Debug, Clone, Default)]
pub struct Select {
    dialect: Dialect,
    target: Target,
    columns: Vec<SelectColumn>,
    distinct: bool,
    joins: Vec<JoinClause>,
    wheres: WhereClause,
    group_by: Vec<String>,
    order_by: Vec<(String, Direction)>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl Select {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dialect(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Self::default()
        }
    }

    /// Row-identity subselect used by joined UPDATE/DELETE on SQLite:
    /// `SELECT "t"."rowid" FROM "t" JOIN … WHERE …`.
    pub(crate) fn rowid_scope(
        dialect: Dialect,
        target: Target,
        joins: Vec<JoinClause>,
        wheres: WhereClause,
    ) -> Self {
        let reference = target
            .alias
            .clone()
            .or_else(|| target.table.clone())
            .unwrap_or_default();
        Self {
            dialect,
            columns: vec![SelectColumn::Reference(format!("{reference}.rowid"))],
            target,
            joins,
            wheres,
            ..Self::default()
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Adds quoted column references (`id`, `u.name`, `u.*`, `name AS n`).
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns
            .extend(columns.into_iter().map(|c| SelectColumn::Reference(c.into())));
        self
    }

    /// Adds an expression verbatim, e.g. `COUNT(*) AS total`.
    pub fn column_raw(mut self, expression: impl Into<String>) -> Self {
        self.columns.push(SelectColumn::Raw(expression.into()));
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn group_by(mut self, column: impl Into<String>) -> Self {
        self.group_by.push(column.into());
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order_by.push((column.into(), direction));
        self
    }

    pub fn order_by_asc(self, column: impl Into<String>) -> Self {
        self.order_by(column, Direction::Asc)
    }

    pub fn order_by_desc(self, column: impl Into<String>) -> Self {
        self.order_by(column, Direction::Desc)
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn has_limit(&self) -> bool {
        self.limit.is_some()
    }

    /// Table name (not alias) this select reads from.
    pub fn table_name(&self) -> Option<&str> {
        self.target.table.as_deref()
    }

    /// Alias if one was given, else the table name.
    pub(crate) fn table_reference(&self) -> Option<&str> {
        self.target.alias.as_deref().or(self.target.table.as_deref())
    }

    pub(crate) fn where_clause(&self) -> &WhereClause {
        &self.wheres
    }

    /// `SELECT COUNT(*) AS "aggregate"` over the same source and predicates.
    /// Grouped selects are counted through a subquery.
    pub fn count_query(&self) -> BuilderResult<CompiledSql> {
        let mut bindings = Bindings::default();
        let aggregate = self.dialect.quote_identifier("aggregate")?;

        let mut counted = self.clone();
        counted.order_by.clear();
        counted.limit = None;
        counted.offset = None;

        let sql = if self.group_by.is_empty() {
            counted.columns = vec![SelectColumn::Raw(format!("COUNT(*) AS {aggregate}"))];
            counted.distinct = false;
            counted.render(&mut bindings)?
        } else {
            let source = self.dialect.quote_identifier("aggregate_source")?;
            format!(
                "SELECT COUNT(*) AS {aggregate} FROM ({}) AS {source}",
                counted.render(&mut bindings)?
            )
        };

        Ok(CompiledSql {
            sql,
            params: bindings.into_params(),
            table: self.target.table_name("select")?.to_string(),
        })
    }

    pub(crate) fn render(&self, bindings: &mut Bindings) -> BuilderResult<String> {
        let dialect = self.dialect;
        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }

        if self.columns.is_empty() {
            sql.push('*');
        } else {
            let mut rendered = Vec::with_capacity(self.columns.len());
            for column in &self.columns {
                rendered.push(match column {
                    SelectColumn::Reference(reference) => dialect.quote_reference(reference)?,
                    SelectColumn::Raw(expression) => expression.clone(),
                });
            }
            sql.push_str(&rendered.join(", "));
        }

        sql.push_str(" FROM ");
        sql.push_str(&self.target.render(dialect, "select")?);
        sql.push_str(&render_joins(&self.joins, dialect, bindings)?);

        if let Some(predicates) = self.wheres.render(dialect, bindings)? {
            sql.push_str(" WHERE ");
            sql.push_str(&predicates);
        }

        if !self.group_by.is_empty() {
            let columns = self
                .group_by
                .iter()
                .map(|column| dialect.quote_reference(column))
                .collect::<BuilderResult<Vec<_>>>()?;
            sql.push_str(" GROUP BY ");
            sql.push_str(&columns.join(", "));
        }

        if !self.order_by.is_empty() {
            let mut terms = Vec::with_capacity(self.order_by.len());
            for (column, direction) in &self.order_by {
                terms.push(format!(
                    "{} {}",
                    dialect.quote_reference(column)?,
                    direction.keyword()
                ));
            }
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }

        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            (None, Some(offset)) => match dialect {
                Dialect::Sqlite => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
                Dialect::MySql => {
                    sql.push_str(&format!(" LIMIT 18446744073709551615 OFFSET {offset}"))
                }
            },
            (None, None) => {}
        }
        Ok(sql)
    }
}

impl TableTarget for Select {
    fn target_mut(&mut self) -> &mut Target {
        &mut self.target
    }
}

impl Filter for Select {
    fn where_clause_mut(&mut self) -> &mut WhereClause {
        &mut self.wheres
    }
}

impl Join for Select {
    fn joins_mut(&mut self) -> &mut Vec<JoinClause> {
        &mut self.joins
    }
}

impl QueryBuilder for Select {
    fn compile(&self) -> BuilderResult<CompiledSql> {
        let mut bindings = Bindings::default();
        let sql = self.render(&mut bindings)?;
        Ok(CompiledSql {
            sql,
            params: bindings.into_params(),
            table: self.target.table_name("select")?.to_string(),
        })
    }
}
