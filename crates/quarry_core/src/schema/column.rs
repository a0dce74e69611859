//! Column definitions and column-level DDL actions.

use super::{render_literal, Guard};
use crate::db::{IntoValue, Value};
use crate::query::{BuilderResult, Dialect};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    BigInteger,
    Text,
    Varchar(u32),
    Real,
    Numeric { precision: u8, scale: u8 },
    Boolean,
    Blob,
    DateTime,
}

impl ColumnType {
    pub fn sql(self, dialect: Dialect) -> String {
        match (self, dialect) {
            (Self::Integer, Dialect::Sqlite) | (Self::BigInteger, Dialect::Sqlite) => {
                "INTEGER".to_string()
            }
            (Self::Integer, Dialect::MySql) => "INT".to_string(),
            (Self::BigInteger, Dialect::MySql) => "BIGINT".to_string(),
            (Self::Text, _) => "TEXT".to_string(),
            (Self::Varchar(length), _) => format!("VARCHAR({length})"),
            (Self::Real, Dialect::Sqlite) => "REAL".to_string(),
            (Self::Real, Dialect::MySql) => "DOUBLE".to_string(),
            (Self::Numeric { precision, scale }, Dialect::Sqlite) => {
                format!("NUMERIC({precision}, {scale})")
            }
            (Self::Numeric { precision, scale }, Dialect::MySql) => {
                format!("DECIMAL({precision}, {scale})")
            }
            (Self::Boolean, Dialect::Sqlite) => "BOOLEAN".to_string(),
            (Self::Boolean, Dialect::MySql) => "TINYINT(1)".to_string(),
            (Self::Blob, _) => "BLOB".to_string(),
            (Self::DateTime, _) => "DATETIME".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnAction {
    /// Part of CREATE TABLE, or `ADD COLUMN` when altering.
    Create,
    Rename(String),
    Drop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub(crate) name: String,
    pub(crate) column_type: ColumnType,
    nullable: bool,
    default: Option<Value>,
    primary_key: bool,
    auto_increment: bool,
    unique: bool,
    pub(crate) action: ColumnAction,
    pub(crate) guard: Guard,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            default: None,
            primary_key: false,
            auto_increment: false,
            unique: false,
            action: ColumnAction::Create,
            guard: Guard::None,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Integer)
    }

    pub fn big_integer(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::BigInteger)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Text)
    }

    pub fn varchar(name: impl Into<String>, length: u32) -> Self {
        Self::new(name, ColumnType::Varchar(length))
    }

    pub fn real(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Real)
    }

    pub fn numeric(name: impl Into<String>, precision: u8, scale: u8) -> Self {
        Self::new(name, ColumnType::Numeric { precision, scale })
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Boolean)
    }

    pub fn blob(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Blob)
    }

    pub fn date_time(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::DateTime)
    }

    /// Column to rename when altering a table.
    pub fn rename(name: impl Into<String>, to: impl Into<String>) -> Self {
        let mut column = Self::new(name, ColumnType::Text);
        column.action = ColumnAction::Rename(to.into());
        column
    }

    /// Column to drop when altering a table.
    pub fn drop(name: impl Into<String>) -> Self {
        let mut column = Self::new(name, ColumnType::Text);
        column.action = ColumnAction::Drop;
        column
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default_value(mut self, value: impl IntoValue) -> Self {
        self.default = Some(value.into_value());
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Implies `primary_key`.
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self.primary_key()
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

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `"name" TYPE [PRIMARY KEY …] [NOT NULL] [UNIQUE] [DEFAULT …]`.
    pub(crate) fn definition(&self, dialect: Dialect) -> BuilderResult<String> {
        let mut sql = format!(
            "{} {}",
            dialect.quote_identifier(&self.name)?,
            self.column_type.sql(dialect)
        );
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
            if self.auto_increment {
                sql.push_str(match dialect {
                    Dialect::Sqlite => " AUTOINCREMENT",
                    Dialect::MySql => " AUTO_INCREMENT",
                });
            }
        }
        if !self.nullable && !self.primary_key {
            sql.push_str(" NOT NULL");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(default) = &self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&render_literal(default));
        }
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::Column;
    use crate::query::Dialect;

    #[test]
    fn definitions_render_modifiers_in_order() {
        let column = Column::varchar("email", 120).not_null().unique();
        assert_eq!(
            column.definition(Dialect::Sqlite).unwrap(),
            "\"email\" VARCHAR(120) NOT NULL UNIQUE"
        );

        let state = Column::text("state").not_null().default_value("new");
        assert_eq!(
            state.definition(Dialect::Sqlite).unwrap(),
            "\"state\" TEXT NOT NULL DEFAULT 'new'"
        );
    }

    #[test]
    fn auto_increment_is_dialect_specific() {
        let id = Column::big_integer("id").auto_increment();
        assert_eq!(
            id.definition(Dialect::Sqlite).unwrap(),
            "\"id\" INTEGER PRIMARY KEY AUTOINCREMENT"
        );
        assert_eq!(
            id.definition(Dialect::MySql).unwrap(),
            "`id` BIGINT PRIMARY KEY AUTO_INCREMENT"
        );
    }
}
