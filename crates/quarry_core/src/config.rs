//! Connection and manager configuration.
//!
//! # Responsibility
//! - Describe named connections (driver/adapter class ids plus handle
//!   parameters) and the migration table consumed by the manager.
//! - Load that description from JSON.
//!
//! # Invariants
//! - `default_connection` must name an entry of `connections`.
//! - Passwords never appear in `Debug` output.

use crate::factory::{SQLITE_ADAPTER, SQLITE_DRIVER};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::path::Path;
use thiserror::Error;

const DEFAULT_CHARSET: &str = "utf8";

/// Resolution-time configuration failures. Not recoverable by the core.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("connection `{0}` is not configured")]
    UnknownConnection(String),
    #[error("default connection `{0}` is not configured")]
    MissingDefaultConnection(String),
    #[error("class `{id}` is not registered (expected {expected})")]
    UnknownClass { id: String, expected: &'static str },
    #[error("class `{id}` is registered as {found}, not as {expected}")]
    ContractMismatch {
        id: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read configuration `{path}`: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// One named connection.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_driver")]
    pub driver: String,
    #[serde(default = "default_adapter")]
    pub adapter: String,
    #[serde(default)]
    pub host: Option<String>,
    /// Database name; for SQLite a file path or `:memory:`.
    pub db: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    #[serde(default = "default_charset")]
    pub charset: String,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl ConnectionConfig {
    /// SQLite connection using the default driver and adapter classes.
    pub fn sqlite(db: impl Into<String>) -> Self {
        Self {
            driver: default_driver(),
            adapter: default_adapter(),
            host: None,
            db: db.into(),
            user: None,
            password: None,
            charset: default_charset(),
            options: BTreeMap::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn with_driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = driver.into();
        self
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }
}

impl Debug for ConnectionConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("driver", &self.driver)
            .field("adapter", &self.adapter)
            .field("host", &self.host)
            .field("db", &self.db)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("charset", &self.charset)
            .field("options", &self.options)
            .finish()
    }
}

/// Manager configuration: connections, default connection and migrations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrmConfig {
    pub default_connection: String,
    pub connections: BTreeMap<String, ConnectionConfig>,
    /// Migration id → migration class id. Ids are applied in sorted order.
    #[serde(default)]
    pub migrations: BTreeMap<String, String>,
}

impl OrmConfig {
    /// Single in-memory SQLite connection registered under `name`.
    pub fn sqlite_memory(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut connections = BTreeMap::new();
        connections.insert(name.clone(), ConnectionConfig::sqlite(":memory:"));
        Self {
            default_connection: name,
            connections,
            migrations: BTreeMap::new(),
        }
    }

    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&source)
    }

    pub fn with_connection(mut self, name: impl Into<String>, config: ConnectionConfig) -> Self {
        self.connections.insert(name.into(), config);
        self
    }

    pub fn with_migration(mut self, id: impl Into<String>, class: impl Into<String>) -> Self {
        self.migrations.insert(id.into(), class.into());
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.connections.contains_key(&self.default_connection) {
            return Err(ConfigError::MissingDefaultConnection(
                self.default_connection.clone(),
            ));
        }
        Ok(())
    }

    pub fn connection(&self, name: &str) -> Result<&ConnectionConfig, ConfigError> {
        self.connections
            .get(name)
            .ok_or_else(|| ConfigError::UnknownConnection(name.to_string()))
    }
}

fn default_driver() -> String {
    SQLITE_DRIVER.to_string()
}

fn default_adapter() -> String {
    SQLITE_ADAPTER.to_string()
}

fn default_charset() -> String {
    DEFAULT_CHARSET.to_string()
}
