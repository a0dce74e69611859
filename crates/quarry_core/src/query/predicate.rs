//! Where-clause model and the `Filter` mixin.
//!
//! # Invariants
//! - Group depth never goes negative while rendering and is zero at the end;
//!   otherwise rendering fails with `UnbalancedGroup`/`UnclosedGroup`.
//! - The first predicate of the clause and of every group carries no
//!   conjunction.

use super::builder::{Bindings, Dialect};
use super::{BuilderError, BuilderResult};
use crate::db::{IntoValue, Value};
use std::fmt::{Display, Formatter};

/// Comparison operators accepted by `where_*` and join conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    NotLike,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl Operator {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        }
    }
}

impl AsRef<str> for Operator {
    fn as_ref(&self) -> &str {
        self.as_sql()
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl TryFrom<&str> for Operator {
    type Error = BuilderError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();
        let operator = match normalized.as_str() {
            "=" | "==" => Self::Eq,
            "!=" | "<>" => Self::NotEq,
            "<" => Self::Lt,
            "<=" => Self::Lte,
            ">" => Self::Gt,
            ">=" => Self::Gte,
            "LIKE" => Self::Like,
            "NOT LIKE" => Self::NotLike,
            "IN" => Self::In,
            "NOT IN" => Self::NotIn,
            "IS NULL" | "IS" => Self::IsNull,
            "IS NOT NULL" | "IS NOT" => Self::IsNotNull,
            _ => return Err(BuilderError::UnknownOperator(value.to_string())),
        };
        Ok(operator)
    }
}

/// How a predicate or group attaches to what precedes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Conjunction {
    #[default]
    And,
    Or,
}

impl Conjunction {
    fn keyword(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Single(Value),
    List(Vec<Value>),
}

#[derive(Debug, Clone, PartialEq)]
enum WhereNode {
    Predicate {
        conjunction: Conjunction,
        column: String,
        operator: String,
        operand: Operand,
    },
    GroupStart {
        conjunction: Conjunction,
    },
    GroupEnd,
}

/// Ordered where predicates and group markers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause {
    nodes: Vec<WhereNode>,
    conjunction: Conjunction,
}

impl WhereClause {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Conjunction applied to subsequent predicates and groups.
    pub fn conjunction(&self) -> Conjunction {
        self.conjunction
    }

    pub(crate) fn set_conjunction(&mut self, conjunction: Conjunction) {
        self.conjunction = conjunction;
    }

    /// `set_type = false` always attaches with `AND`.
    pub(crate) fn push(&mut self, column: String, operator: String, value: Value, set_type: bool) {
        self.nodes.push(WhereNode::Predicate {
            conjunction: self.pick(set_type),
            column,
            operator,
            operand: Operand::Single(value),
        });
    }

    pub(crate) fn push_list(&mut self, column: String, negate: bool, values: Vec<Value>) {
        let operator = if negate { Operator::NotIn } else { Operator::In };
        self.nodes.push(WhereNode::Predicate {
            conjunction: self.conjunction,
            column,
            operator: operator.as_sql().to_string(),
            operand: Operand::List(values),
        });
    }

    pub(crate) fn open_group(&mut self) {
        self.nodes.push(WhereNode::GroupStart {
            conjunction: self.conjunction,
        });
    }

    pub(crate) fn close_group(&mut self) {
        self.nodes.push(WhereNode::GroupEnd);
    }

    /// Appends `other` as one `AND`-attached group, keeping its own nesting.
    pub(crate) fn and_group(&mut self, other: WhereClause) {
        if other.is_empty() {
            return;
        }
        self.nodes.push(WhereNode::GroupStart {
            conjunction: Conjunction::And,
        });
        self.nodes.extend(other.nodes);
        self.nodes.push(WhereNode::GroupEnd);
    }

    fn pick(&self, set_type: bool) -> Conjunction {
        if set_type {
            self.conjunction
        } else {
            Conjunction::And
        }
    }

    /// Renders the predicate body (without the `WHERE` keyword). `None` when
    /// no predicates were added.
    pub(crate) fn render(
        &self,
        dialect: Dialect,
        bindings: &mut Bindings,
    ) -> BuilderResult<Option<String>> {
        if self.nodes.is_empty() {
            return Ok(None);
        }

        let mut sql = String::new();
        let mut depth = 0usize;
        let mut fresh = true;
        for node in &self.nodes {
            match node {
                WhereNode::Predicate {
                    conjunction,
                    column,
                    operator,
                    operand,
                } => {
                    if !fresh {
                        sql.push(' ');
                        sql.push_str(conjunction.keyword());
                        sql.push(' ');
                    }
                    sql.push_str(&render_predicate(
                        dialect, bindings, column, operator, operand,
                    )?);
                    fresh = false;
                }
                WhereNode::GroupStart { conjunction } => {
                    if !fresh {
                        sql.push(' ');
                        sql.push_str(conjunction.keyword());
                        sql.push(' ');
                    }
                    sql.push('(');
                    depth += 1;
                    fresh = true;
                }
                WhereNode::GroupEnd => {
                    if depth == 0 {
                        return Err(BuilderError::UnbalancedGroup);
                    }
                    if fresh {
                        sql.push_str("1 = 1");
                    }
                    sql.push(')');
                    depth -= 1;
                    fresh = false;
                }
            }
        }
        if depth != 0 {
            return Err(BuilderError::UnclosedGroup { open: depth });
        }
        Ok(Some(sql))
    }
}

fn render_predicate(
    dialect: Dialect,
    bindings: &mut Bindings,
    column: &str,
    operator: &str,
    operand: &Operand,
) -> BuilderResult<String> {
    let column = dialect.quote_reference(column)?;
    let operator = Operator::try_from(operator)?;

    match (operator, operand) {
        (Operator::IsNull | Operator::IsNotNull, _) => Ok(format!("{column} {operator}")),
        (Operator::Eq, Operand::Single(Value::Null)) => Ok(format!("{column} IS NULL")),
        (Operator::NotEq, Operand::Single(Value::Null)) => Ok(format!("{column} IS NOT NULL")),
        (Operator::In | Operator::NotIn, operand) => {
            let values = match operand {
                Operand::List(values) => values.clone(),
                Operand::Single(value) => vec![value.clone()],
            };
            if values.is_empty() {
                // IN () matches nothing, NOT IN () matches everything.
                return Ok(if operator == Operator::In {
                    "0 = 1".to_string()
                } else {
                    "1 = 1".to_string()
                });
            }
            let placeholders = values
                .into_iter()
                .map(|value| bindings.push(value))
                .collect::<Vec<_>>()
                .join(", ");
            Ok(format!("{column} {operator} ({placeholders})"))
        }
        (_, Operand::Single(value)) => {
            let placeholder = bindings.push(value.clone());
            Ok(format!("{column} {operator} {placeholder}"))
        }
        (_, Operand::List(_)) => Err(BuilderError::UnknownOperator(operator.to_string())),
    }
}

/// Where mixin shared by Select/Update/Delete builders and the retriever.
pub trait Filter: Sized {
    fn where_clause_mut(&mut self) -> &mut WhereClause;

    /// `column <operator> value`, attached with the current `where_type`.
    fn where_(self, column: impl Into<String>, operator: impl AsRef<str>, value: impl IntoValue) -> Self {
        self.where_with(column, operator, value, true)
    }

    /// Like `where_`; with `set_type = false` the predicate is always
    /// attached with `AND` regardless of the current `where_type`.
    fn where_with(
        mut self,
        column: impl Into<String>,
        operator: impl AsRef<str>,
        value: impl IntoValue,
        set_type: bool,
    ) -> Self {
        self.where_clause_mut().push(
            column.into(),
            operator.as_ref().to_string(),
            value.into_value(),
            set_type,
        );
        self
    }

    fn where_eq(self, column: impl Into<String>, value: impl IntoValue) -> Self {
        self.where_(column, Operator::Eq, value)
    }

    fn where_in<I>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: IntoValue,
    {
        let values = values.into_iter().map(IntoValue::into_value).collect();
        self.where_clause_mut().push_list(column.into(), false, values);
        self
    }

    fn where_not_in<I>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: IntoValue,
    {
        let values = values.into_iter().map(IntoValue::into_value).collect();
        self.where_clause_mut().push_list(column.into(), true, values);
        self
    }

    fn where_null(self, column: impl Into<String>) -> Self {
        self.where_(column, Operator::IsNull, Value::Null)
    }

    fn where_not_null(self, column: impl Into<String>) -> Self {
        self.where_(column, Operator::IsNotNull, Value::Null)
    }

    /// Opens a parenthesised group attached with the current `where_type`.
    fn start_where_group(mut self) -> Self {
        self.where_clause_mut().open_group();
        self
    }

    fn end_where_group(mut self) -> Self {
        self.where_clause_mut().close_group();
        self
    }

    /// Sets the conjunction used by subsequent predicates and groups.
    fn where_type(mut self, conjunction: Conjunction) -> Self {
        self.where_clause_mut().set_conjunction(conjunction);
        self
    }
}

impl Filter for WhereClause {
    fn where_clause_mut(&mut self) -> &mut WhereClause {
        self
    }
}
