//! Index DDL.

use super::{DdlStatement, Guard};
use crate::query::{BuilderError, BuilderResult, Dialect};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexAction {
    Create,
    Rename(String),
    Drop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    name: String,
    columns: Vec<String>,
    unique: bool,
    action: IndexAction,
    guard: Guard,
}

impl Index {
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
            action: IndexAction::Create,
            guard: Guard::None,
        }
    }

    /// Renaming on SQLite recreates the index, so keep `columns` populated.
    pub fn rename(mut self, to: impl Into<String>) -> Self {
        self.action = IndexAction::Rename(to.into());
        self
    }

    pub fn drop(name: impl Into<String>) -> Self {
        let mut index = Self::new(name, Vec::<String>::new());
        index.action = IndexAction::Drop;
        index
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn if_exists(mut self) -> Self {
        self.guard = Guard::IfExists;
        self
    }

    pub fn if_not_exists(mut self) -> Self {
        self.guard = Guard::IfNotExists;
        self
    }

    pub(crate) fn statements(&self, table: &str, dialect: Dialect) -> BuilderResult<Vec<DdlStatement>> {
        match &self.action {
            IndexAction::Create => Ok(vec![DdlStatement::new(self.create_sql(
                &self.name,
                table,
                dialect,
                self.guard == Guard::IfNotExists,
            )?)]),
            IndexAction::Drop => Ok(vec![DdlStatement::new(self.drop_sql(
                table,
                dialect,
                self.guard == Guard::IfExists,
            )?)]),
            IndexAction::Rename(to) => match dialect {
                Dialect::MySql => Ok(vec![DdlStatement::new(format!(
                    "ALTER TABLE {} RENAME INDEX {} TO {}",
                    dialect.quote_identifier(table)?,
                    dialect.quote_identifier(&self.name)?,
                    dialect.quote_identifier(to)?
                ))]),
                Dialect::Sqlite => {
                    if self.columns.is_empty() {
                        return Err(BuilderError::Unsupported {
                            feature: format!("renaming index `{}` without its columns", self.name),
                            dialect: dialect.name(),
                        });
                    }
                    Ok(vec![
                        DdlStatement::new(self.drop_sql(table, dialect, self.guard == Guard::IfExists)?),
                        DdlStatement::new(self.create_sql(to, table, dialect, false)?),
                    ])
                }
            },
        }
    }

    fn create_sql(&self, name: &str, table: &str, dialect: Dialect, guarded: bool) -> BuilderResult<String> {
        let columns = self
            .columns
            .iter()
            .map(|column| dialect.quote_identifier(column))
            .collect::<BuilderResult<Vec<_>>>()?;
        if columns.is_empty() {
            return Err(BuilderError::EmptySet("index"));
        }
        let unique = if self.unique { "UNIQUE " } else { "" };
        let guard = if guarded && dialect == Dialect::Sqlite {
            "IF NOT EXISTS "
        } else {
            ""
        };
        Ok(format!(
            "CREATE {unique}INDEX {guard}{} ON {} ({})",
            dialect.quote_identifier(name)?,
            dialect.quote_identifier(table)?,
            columns.join(", ")
        ))
    }

    fn drop_sql(&self, table: &str, dialect: Dialect, guarded: bool) -> BuilderResult<String> {
        let name = dialect.quote_identifier(&self.name)?;
        Ok(match dialect {
            Dialect::Sqlite if guarded => format!("DROP INDEX IF EXISTS {name}"),
            Dialect::Sqlite => format!("DROP INDEX {name}"),
            Dialect::MySql => format!("DROP INDEX {name} ON {}", dialect.quote_identifier(table)?),
        })
    }
}
