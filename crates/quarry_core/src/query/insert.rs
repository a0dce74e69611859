//! INSERT builder.

use super::builder::{Bindings, CompiledSql, Dialect, TableTarget, Target};
use super::{BuilderError, BuilderResult, QueryBuilder};
use crate::db::{IntoValue, Value};

/// `INSERT INTO table (columns…) VALUES (…)`.
#[derive(Debug, Clone, Default)]
pub struct Insert {
    dialect: Dialect,
    target: Target,
    values: Vec<(String, Value)>,
    default_row: bool,
}

impl Insert {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dialect(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Self::default()
        }
    }

    /// Sets one column; a repeated column keeps its first position.
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

    /// Inserts a row of column defaults when nothing is set, instead of
    /// failing with `EmptySet`.
    pub fn or_default_values(mut self) -> Self {
        self.default_row = true;
        self
    }
}

pub(crate) fn upsert(values: &mut Vec<(String, Value)>, column: String, value: Value) {
    match values.iter_mut().find(|(existing, _)| *existing == column) {
        Some(slot) => slot.1 = value,
        None => values.push((column, value)),
    }
}

impl TableTarget for Insert {
    fn target_mut(&mut self) -> &mut Target {
        &mut self.target
    }
}

impl QueryBuilder for Insert {
    fn compile(&self) -> BuilderResult<CompiledSql> {
        let table = self.target.table_name("insert")?;
        if self.values.is_empty() {
            if !self.default_row {
                return Err(BuilderError::EmptySet("insert"));
            }
            let table_sql = self.dialect.quote_identifier(table)?;
            let sql = match self.dialect {
                Dialect::Sqlite => format!("INSERT INTO {table_sql} DEFAULT VALUES"),
                Dialect::MySql => format!("INSERT INTO {table_sql} () VALUES ()"),
            };
            return Ok(CompiledSql {
                sql,
                params: Vec::new(),
                table: table.to_string(),
            });
        }

        let mut bindings = Bindings::default();
        let mut columns = Vec::with_capacity(self.values.len());
        let mut placeholders = Vec::with_capacity(self.values.len());
        for (column, value) in &self.values {
            columns.push(self.dialect.quote_identifier(column)?);
            placeholders.push(bindings.push(value.clone()));
        }

        Ok(CompiledSql {
            sql: format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.dialect.quote_identifier(table)?,
                columns.join(", "),
                placeholders.join(", ")
            ),
            params: bindings.into_params(),
            table: table.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Insert;
    use crate::query::{BuilderError, Dialect, QueryBuilder, TableTarget};
    use rusqlite::types::Value;

    #[test]
    fn renders_columns_in_set_order() {
        let compiled = Insert::new()
            .table("users")
            .set("name", "ada")
            .set("age", 36)
            .set("name", "grace")
            .compile()
            .unwrap();
        assert_eq!(
            compiled.sql,
            "INSERT INTO \"users\" (\"name\", \"age\") VALUES (:p1, :p2)"
        );
        assert_eq!(compiled.params[0].1, Value::Text("grace".to_string()));
    }

    #[test]
    fn empty_set_is_rejected() {
        assert_eq!(
            Insert::new().table("users").compile().unwrap_err(),
            BuilderError::EmptySet("insert")
        );
        assert_eq!(
            Insert::new().set("a", 1).compile().unwrap_err(),
            BuilderError::MissingTable("insert")
        );
    }

    #[test]
    fn default_row_when_nothing_is_set() {
        let sqlite = Insert::new()
            .table("counters")
            .or_default_values()
            .compile()
            .unwrap();
        assert_eq!(sqlite.sql, "INSERT INTO \"counters\" DEFAULT VALUES");
        assert!(sqlite.params.is_empty());

        let mysql = Insert::with_dialect(Dialect::MySql)
            .table("counters")
            .or_default_values()
            .compile()
            .unwrap();
        assert_eq!(mysql.sql, "INSERT INTO `counters` () VALUES ()");

        let with_values = Insert::new()
            .table("counters")
            .set("n", 1)
            .or_default_values()
            .compile()
            .unwrap();
        assert_eq!(with_values.sql, "INSERT INTO \"counters\" (\"n\") VALUES (:p1)");
    }
}
