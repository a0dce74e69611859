//! Persistence core for Quarry.
//! Connection management, query and schema builders, and the entity
//! read/write pipeline built on top of them.

pub mod config;
pub mod db;
pub mod driver;
pub mod error;
pub mod factory;
pub mod logging;
pub mod model;
pub mod orm;
pub mod query;
pub mod repo;
pub mod schema;

pub use config::{ConfigError, ConnectionConfig, OrmConfig};
pub use db::migrations::{Migration, Migrator, MIGRATIONS_TABLE};
pub use db::{Adapter, DbError, DbResult, IntoValue, Record, SqliteAdapter, Statement, Value};
pub use driver::Driver;
pub use error::{OrmError, OrmResult};
pub use factory::{Factory, Registration};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::{Entity, EntityHandle, EntityState, Relationship};
pub use orm::Orm;
pub use query::{BuilderError, Filter, Join, Query, QueryBuilder, TableTarget};
pub use repo::{PersistReport, Repository, Retriever, WriteOutcome};
pub use schema::{Column, Constraint, Index, Schema, Table};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
