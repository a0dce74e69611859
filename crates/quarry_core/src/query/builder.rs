//! Shared builder plumbing: dialect quoting, parameter bindings, the table
//! target every builder renders against, and the join mixin.
//!
//! # Invariants
//! - Identifiers are validated before they are quoted; nothing user-supplied
//!   is spliced into SQL unquoted except through explicit `*_raw` calls.
//! - Placeholders are numbered `:p1, :p2, …` in render order.

use super::{BuilderError, BuilderResult};
use crate::db::{IntoValue, Value};
use crate::model::Entity;
use once_cell::sync::Lazy;
use regex::Regex;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));
static ALIAS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(.+?)\s+as\s+(\S+)$").expect("valid alias regex"));

/// SQL flavor used for identifier quoting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    Sqlite,
    MySql,
}

impl Dialect {
    pub fn name(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::MySql => "mysql",
        }
    }

    fn quote_char(self) -> char {
        match self {
            Self::Sqlite => '"',
            Self::MySql => '`',
        }
    }

    /// Quotes one bare identifier (`users` → `"users"`).
    pub fn quote_identifier(self, name: &str) -> BuilderResult<String> {
        let name = name.trim();
        if !IDENTIFIER_RE.is_match(name) {
            return Err(BuilderError::InvalidIdentifier(name.to_string()));
        }
        let quote = self.quote_char();
        Ok(format!("{quote}{name}{quote}"))
    }

    /// Quotes a column reference: `*`, `col`, `tbl.col`, `tbl.*`, optionally
    /// followed by `AS alias`.
    pub fn quote_reference(self, reference: &str) -> BuilderResult<String> {
        let reference = reference.trim();
        if let Some(captures) = ALIAS_RE.captures(reference) {
            let target = self.quote_reference(&captures[1])?;
            let alias = self.quote_identifier(&captures[2])?;
            return Ok(format!("{target} AS {alias}"));
        }
        if reference == "*" {
            return Ok("*".to_string());
        }

        let mut parts = Vec::new();
        let segments: Vec<&str> = reference.split('.').collect();
        if segments.len() > 2 {
            return Err(BuilderError::InvalidIdentifier(reference.to_string()));
        }
        for (index, segment) in segments.iter().enumerate() {
            if *segment == "*" && index == segments.len() - 1 && index > 0 {
                parts.push("*".to_string());
            } else {
                parts.push(self.quote_identifier(segment)?);
            }
        }
        Ok(parts.join("."))
    }
}

/// Rendered SQL text plus its named parameters, ready for a `Query`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSql {
    pub sql: String,
    pub params: Vec<(String, Value)>,
    /// Table the statement targets, used for error context.
    pub table: String,
}

/// Collects bound values while a builder renders.
#[derive(Debug, Default)]
pub(crate) struct Bindings {
    params: Vec<(String, Value)>,
}

impl Bindings {
    /// Registers a value and returns its placeholder.
    pub(crate) fn push(&mut self, value: Value) -> String {
        let name = format!(":p{}", self.params.len() + 1);
        self.params.push((name.clone(), value));
        name
    }

    pub(crate) fn into_params(self) -> Vec<(String, Value)> {
        self.params
    }
}

/// Table a builder renders against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Target {
    pub(crate) table: Option<String>,
    pub(crate) alias: Option<String>,
    pub(crate) primary_key: Option<String>,
}

impl Target {
    pub(crate) fn table_name(&self, builder: &'static str) -> BuilderResult<&str> {
        self.table
            .as_deref()
            .ok_or(BuilderError::MissingTable(builder))
    }

    /// `"table"` or `"table" AS "alias"`.
    pub(crate) fn render(&self, dialect: Dialect, builder: &'static str) -> BuilderResult<String> {
        let table = dialect.quote_identifier(self.table_name(builder)?)?;
        match self.alias.as_deref() {
            Some(alias) => Ok(format!("{table} AS {}", dialect.quote_identifier(alias)?)),
            None => Ok(table),
        }
    }
}

/// Base builder contract: choose the table directly or from an entity type.
pub trait TableTarget: Sized {
    fn target_mut(&mut self) -> &mut Target;

    fn table(mut self, name: impl Into<String>) -> Self {
        let target = self.target_mut();
        target.table = Some(name.into());
        target.alias = None;
        self
    }

    fn table_as(mut self, name: impl Into<String>, alias: impl Into<String>) -> Self {
        let target = self.target_mut();
        target.table = Some(name.into());
        target.alias = Some(alias.into());
        self
    }

    /// Targets `E::table()` and remembers `E::primary_key()`.
    fn entity<E: Entity>(mut self) -> Self {
        let target = self.target_mut();
        target.table = Some(E::table().to_string());
        target.alias = None;
        target.primary_key = Some(E::primary_key().to_string());
        self
    }

    fn entity_as<E: Entity>(mut self, alias: impl Into<String>) -> Self {
        let target = self.target_mut();
        target.table = Some(E::table().to_string());
        target.alias = Some(alias.into());
        target.primary_key = Some(E::primary_key().to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    Right,
    Cross,
}

impl JoinType {
    fn keyword(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN",
            Self::Cross => "CROSS JOIN",
        }
    }
}

/// Right-hand side of a join condition.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinOperand {
    Column(String),
    /// Bound value (the join condition behaves like a `where`).
    Value(Value),
}

/// One `JOIN … ON first <op> second` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub table: String,
    pub alias: Option<String>,
    pub first: String,
    pub operator: String,
    pub second: JoinOperand,
    pub kind: JoinType,
}

impl JoinClause {
    /// `INNER JOIN table ON first = second` with both sides as columns.
    pub fn new(table: impl Into<String>, first: impl Into<String>, second: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            alias: None,
            first: first.into(),
            operator: "=".to_string(),
            second: JoinOperand::Column(second.into()),
            kind: JoinType::Inner,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = operator.into();
        self
    }

    pub fn kind(mut self, kind: JoinType) -> Self {
        self.kind = kind;
        self
    }

    /// Treats the second operand as a bound value instead of a column.
    pub fn second_value(mut self, value: impl IntoValue) -> Self {
        self.second = JoinOperand::Value(value.into_value());
        self
    }

    pub(crate) fn render(&self, dialect: Dialect, bindings: &mut Bindings) -> BuilderResult<String> {
        let mut table = dialect.quote_identifier(&self.table)?;
        if let Some(alias) = self.alias.as_deref() {
            table = format!("{table} AS {}", dialect.quote_identifier(alias)?);
        }
        if self.kind == JoinType::Cross {
            return Ok(format!("{} {table}", self.kind.keyword()));
        }

        let operator = super::predicate::Operator::try_from(self.operator.as_str())?;
        let second = match &self.second {
            JoinOperand::Column(column) => dialect.quote_reference(column)?,
            JoinOperand::Value(value) => bindings.push(value.clone()),
        };
        Ok(format!(
            "{} {table} ON {} {} {second}",
            self.kind.keyword(),
            dialect.quote_reference(&self.first)?,
            operator.as_sql()
        ))
    }
}

/// Join mixin for Select/Update/Delete builders.
pub trait Join: Sized {
    fn joins_mut(&mut self) -> &mut Vec<JoinClause>;

    /// `INNER JOIN table ON first = second`.
    fn join(self, table: impl Into<String>, first: impl Into<String>, second: impl Into<String>) -> Self {
        self.join_with(JoinClause::new(table, first, second))
    }

    /// `LEFT JOIN table ON first = second`.
    fn left_join(
        self,
        table: impl Into<String>,
        first: impl Into<String>,
        second: impl Into<String>,
    ) -> Self {
        self.join_with(JoinClause::new(table, first, second).kind(JoinType::Left))
    }

    /// Full control over operator, join type and whether `second` is a value.
    fn join_with(mut self, clause: JoinClause) -> Self {
        self.joins_mut().push(clause);
        self
    }
}

pub(crate) fn render_joins(
    joins: &[JoinClause],
    dialect: Dialect,
    bindings: &mut Bindings,
) -> BuilderResult<String> {
    let mut sql = String::new();
    for join in joins {
        sql.push(' ');
        sql.push_str(&join.render(dialect, bindings)?);
    }
    Ok(sql)
}
