//! Database handle, statement and migration layer.
//!
//! # Responsibility
//! - Own physical SQLite handles behind the [`Adapter`] contract.
//! - Execute prepared commands through the [`Statement`] contract.
//! - Apply registered schema migrations in deterministic order.
//!
//! # Invariants
//! - Handle errors are wrapped with the SQL text that produced them and are
//!   never swallowed or retried.
//! - Preparation failures (`DbError::Prepare`) are reported separately from
//!   execution failures (`DbError::Execute`).
//!
//! # See also
//! - `crate::driver` for the transaction boundary built on top of adapters.

use thiserror::Error;

pub mod adapter;
pub mod migrations;
pub mod statement;
mod value;

pub use adapter::{Adapter, SqliteAdapter};
pub use rusqlite::types::Value;
pub use statement::{SqliteStatement, Statement};
pub use value::{decode_value, IntoValue, Record};

pub type DbResult<T> = Result<T, DbError>;

/// Adapter and statement level failures.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("failed to open database `{target}`: {source}")]
    Open {
        target: String,
        source: rusqlite::Error,
    },
    #[error("failed to prepare statement `{sql}`: {source}")]
    Prepare {
        sql: String,
        source: rusqlite::Error,
    },
    #[error("failed to execute statement `{sql}`: {source}")]
    Execute {
        sql: String,
        source: rusqlite::Error,
    },
    #[error("transaction {action} failed: {source}")]
    Transaction {
        action: &'static str,
        source: rusqlite::Error,
    },
    #[error("database reported no usable last insert id (table hint: {table:?}, field hint: {field:?})")]
    LastInsertId {
        table: Option<String>,
        field: Option<String>,
    },
    #[error("statement `{sql}` has no parameter named `{name}`")]
    UnknownParameter { name: String, sql: String },
    #[error("column `{column}` is not present in the result row")]
    MissingColumn { column: String },
    #[error("column `{column}` cannot be decoded: {message}")]
    Decode { column: String, message: String },
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}
