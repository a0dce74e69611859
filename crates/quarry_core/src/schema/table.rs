//! Table-level DDL: create, alter, rename and drop.

use super::column::{Column, ColumnAction};
use super::constraint::{Constraint, ConstraintAction};
use super::index::Index;
use super::{DdlStatement, Guard, Precondition};
use crate::query::{BuilderError, BuilderResult, Dialect};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableAction {
    Create,
    Alter,
    Rename(String),
    Drop,
}

/// One table definition or change, rendered by `statements`.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    action: TableAction,
    guard: Guard,
    columns: Vec<Column>,
    indexes: Vec<Index>,
    constraints: Vec<Constraint>,
}

impl Table {
    fn with_action(name: impl Into<String>, action: TableAction) -> Self {
        Self {
            name: name.into(),
            action,
            guard: Guard::None,
            columns: Vec::new(),
            indexes: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn create(name: impl Into<String>) -> Self {
        Self::with_action(name, TableAction::Create)
    }

    pub fn alter(name: impl Into<String>) -> Self {
        Self::with_action(name, TableAction::Alter)
    }

    pub fn rename(name: impl Into<String>, to: impl Into<String>) -> Self {
        Self::with_action(name, TableAction::Rename(to.into()))
    }

    pub fn drop(name: impl Into<String>) -> Self {
        Self::with_action(name, TableAction::Drop)
    }

    pub fn if_exists(mut self) -> Self {
        self.guard = Guard::IfExists;
        self
    }

    pub fn if_not_exists(mut self) -> Self {
        self.guard = Guard::IfNotExists;
        self
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn action(&self) -> &TableAction {
        &self.action
    }

    /// Renders the DDL statements for this table in execution order.
    ///
    /// Guards the dialect cannot express inline become `precondition`s that
    /// the schema checks against the catalog before running the statement.
    pub fn statements(&self, dialect: Dialect) -> BuilderResult<Vec<DdlStatement>> {
        let table = dialect.quote_identifier(&self.name)?;
        let mut statements = Vec::new();

        match &self.action {
            TableAction::Create => {
                let mut definitions = Vec::new();
                for column in &self.columns {
                    if column.action != ColumnAction::Create {
                        return Err(BuilderError::Unsupported {
                            feature: format!(
                                "column `{}` rename/drop inside CREATE TABLE",
                                column.name
                            ),
                            dialect: dialect.name(),
                        });
                    }
                    definitions.push(column.definition(dialect)?);
                }
                for constraint in &self.constraints {
                    definitions.push(constraint.definition(dialect)?);
                }
                if definitions.is_empty() {
                    return Err(BuilderError::EmptySet("create table"));
                }
                let guard = if self.guard == Guard::IfNotExists {
                    "IF NOT EXISTS "
                } else {
                    ""
                };
                statements.push(DdlStatement::new(format!(
                    "CREATE TABLE {guard}{table} ({})",
                    definitions.join(", ")
                )));
            }
            TableAction::Alter => {
                for column in &self.columns {
                    statements.push(self.column_statement(column, &table, dialect)?);
                }
                for constraint in &self.constraints {
                    statements.push(self.constraint_statement(constraint, &table, dialect)?);
                }
            }
            TableAction::Rename(to) => {
                let mut statement = DdlStatement::new(format!(
                    "ALTER TABLE {table} RENAME TO {}",
                    dialect.quote_identifier(to)?
                ));
                if self.guard == Guard::IfExists {
                    statement = statement.when(Precondition::TableExists(self.name.clone()));
                }
                statements.push(statement);
            }
            TableAction::Drop => {
                let guard = if self.guard == Guard::IfExists {
                    "IF EXISTS "
                } else {
                    ""
                };
                statements.push(DdlStatement::new(format!("DROP TABLE {guard}{table}")));
            }
        }

        if !matches!(self.action, TableAction::Drop | TableAction::Rename(_)) {
            for index in &self.indexes {
                statements.extend(index.statements(&self.name, dialect)?);
            }
        }
        Ok(statements)
    }

    fn column_statement(
        &self,
        column: &Column,
        table: &str,
        dialect: Dialect,
    ) -> BuilderResult<DdlStatement> {
        let name = dialect.quote_identifier(&column.name)?;
        let (sql, precondition) = match &column.action {
            ColumnAction::Create => (
                format!("ALTER TABLE {table} ADD COLUMN {}", column.definition(dialect)?),
                (column.guard == Guard::IfNotExists)
                    .then(|| Precondition::ColumnMissing(self.name.clone(), column.name.clone())),
            ),
            ColumnAction::Rename(to) => (
                format!(
                    "ALTER TABLE {table} RENAME COLUMN {name} TO {}",
                    dialect.quote_identifier(to)?
                ),
                (column.guard == Guard::IfExists)
                    .then(|| Precondition::ColumnExists(self.name.clone(), column.name.clone())),
            ),
            ColumnAction::Drop => (
                format!("ALTER TABLE {table} DROP COLUMN {name}"),
                (column.guard == Guard::IfExists)
                    .then(|| Precondition::ColumnExists(self.name.clone(), column.name.clone())),
            ),
        };
        Ok(DdlStatement { sql, precondition })
    }

    fn constraint_statement(
        &self,
        constraint: &Constraint,
        table: &str,
        dialect: Dialect,
    ) -> BuilderResult<DdlStatement> {
        let unsupported = |feature: &str| BuilderError::Unsupported {
            feature: feature.to_string(),
            dialect: dialect.name(),
        };
        if dialect == Dialect::Sqlite {
            return Err(unsupported("altering constraints of an existing table"));
        }
        match &constraint.action {
            ConstraintAction::Create => Ok(DdlStatement::new(format!(
                "ALTER TABLE {table} ADD {}",
                constraint.definition(dialect)?
            ))),
            ConstraintAction::Drop => {
                let name = constraint
                    .name
                    .as_deref()
                    .ok_or_else(|| unsupported("dropping an unnamed constraint"))?;
                Ok(DdlStatement::new(format!(
                    "ALTER TABLE {table} DROP CONSTRAINT {}",
                    dialect.quote_identifier(name)?
                )))
            }
            ConstraintAction::Rename(_) => Err(unsupported("renaming constraints")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Table;
    use crate::query::{BuilderError, Dialect};
    use crate::schema::{Column, Constraint, Index, Precondition, ReferentialAction};

    #[test]
    fn create_table_inlines_constraints_and_appends_indexes() {
        let statements = Table::create("posts")
            .if_not_exists()
            .column(Column::integer("id").auto_increment())
            .column(Column::integer("user_id").not_null())
            .column(Column::text("title").not_null())
            .constraint(
                Constraint::foreign_key("user_id", "users", "id")
                    .on_delete(ReferentialAction::Cascade),
            )
            .index(Index::new("posts_user", ["user_id"]))
            .statements(Dialect::Sqlite)
            .unwrap();

        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[0].sql,
            "CREATE TABLE IF NOT EXISTS \"posts\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
             \"user_id\" INTEGER NOT NULL, \"title\" TEXT NOT NULL, \
             FOREIGN KEY (\"user_id\") REFERENCES \"users\" (\"id\") ON DELETE CASCADE)"
        );
        assert_eq!(
            statements[1].sql,
            "CREATE INDEX \"posts_user\" ON \"posts\" (\"user_id\")"
        );
    }

    #[test]
    fn alter_guards_become_preconditions() {
        let statements = Table::alter("users")
            .column(Column::text("nickname").if_not_exists())
            .column(Column::rename("name", "full_name").if_exists())
            .column(Column::drop("legacy"))
            .statements(Dialect::Sqlite)
            .unwrap();

        assert_eq!(
            statements[0].sql,
            "ALTER TABLE \"users\" ADD COLUMN \"nickname\" TEXT"
        );
        assert_eq!(
            statements[0].precondition,
            Some(Precondition::ColumnMissing("users".into(), "nickname".into()))
        );
        assert_eq!(
            statements[1].sql,
            "ALTER TABLE \"users\" RENAME COLUMN \"name\" TO \"full_name\""
        );
        assert_eq!(
            statements[1].precondition,
            Some(Precondition::ColumnExists("users".into(), "name".into()))
        );
        assert_eq!(statements[2].precondition, None);
    }

    #[test]
    fn sqlite_cannot_alter_constraints() {
        let err = Table::alter("users")
            .constraint(Constraint::unique(["email"]))
            .statements(Dialect::Sqlite)
            .unwrap_err();
        assert!(matches!(err, BuilderError::Unsupported { dialect: "sqlite", .. }));

        let mysql = Table::alter("users")
            .constraint(Constraint::unique(["email"]).named("users_email"))
            .constraint(Constraint::drop("users_old"))
            .statements(Dialect::MySql)
            .unwrap();
        assert_eq!(
            mysql[0].sql,
            "ALTER TABLE `users` ADD CONSTRAINT `users_email` UNIQUE (`email`)"
        );
        assert_eq!(mysql[1].sql, "ALTER TABLE `users` DROP CONSTRAINT `users_old`");
    }

    #[test]
    fn rename_and_drop_tables() {
        let rename = Table::rename("users", "members")
            .if_exists()
            .statements(Dialect::Sqlite)
            .unwrap();
        assert_eq!(rename[0].sql, "ALTER TABLE \"users\" RENAME TO \"members\"");
        assert_eq!(
            rename[0].precondition,
            Some(Precondition::TableExists("users".into()))
        );

        let drop = Table::drop("users").if_exists().statements(Dialect::Sqlite).unwrap();
        assert_eq!(drop[0].sql, "DROP TABLE IF EXISTS \"users\"");
    }
}
