//! Top-level error taxonomy for the persistence core.
//!
//! Handle errors are wrapped with the operation and table they belong to;
//! nothing here retries.

use crate::config::ConfigError;
use crate::db::DbError;
use crate::query::BuilderError;
use crate::repo::persister::OperationKind;
use thiserror::Error;
use uuid::Uuid;

pub type OrmResult<T> = Result<T, OrmError>;

#[derive(Debug, Error)]
pub enum OrmError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Builder(#[from] BuilderError),
    #[error("{operation} on `{table}` failed: {source}")]
    Statement {
        operation: &'static str,
        table: String,
        source: DbError,
    },
    #[error("no `{table}` row matches {criteria}")]
    EntityNotFound { table: String, criteria: String },
    #[error("`{table}` entity has no primary key value for {operation}")]
    MissingPrimaryKey {
        table: String,
        operation: &'static str,
    },
    #[error("`{table}` entities do not declare soft-delete columns")]
    NotSoftDeletable { table: String },
    #[error("`{table}` entities declare no relationship named `{name}`")]
    UnknownRelationship { table: String, name: String },
    #[error("persist batch {batch_id} rolled back: operation #{index} ({kind} on `{table}`) failed: {source}")]
    PersistFailed {
        batch_id: Uuid,
        index: usize,
        kind: OperationKind,
        table: String,
        source: Box<OrmError>,
    },
    #[error("persist batch {batch_id} failed ({cause}) and rollback failed too: {source}")]
    RollbackFailed {
        batch_id: Uuid,
        cause: Box<OrmError>,
        source: DbError,
    },
    #[error("schema operation on `{table}` failed: {message}")]
    Schema { table: String, message: String },
}

impl OrmError {
    /// Wraps a handle error with the operation/table it happened in.
    pub fn statement(operation: &'static str, table: impl Into<String>, source: DbError) -> Self {
        Self::Statement {
            operation,
            table: table.into(),
            source,
        }
    }

    /// Whether this is the recoverable "no such row" outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::EntityNotFound { .. })
    }
}
