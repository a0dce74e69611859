//! Physical database handle contract and the SQLite adapter.
//!
//! # Responsibility
//! - Open and configure one SQLite connection per adapter.
//! - Produce statements and expose native transaction primitives.
//! - Answer the catalog questions used by DDL guard clauses.
//!
//! # Invariants
//! - Returned file/memory handles honor the configured `foreign_keys` and
//!   `busy_timeout_ms` options (defaults: on, 5000ms).
//! - Transaction calls map 1:1 onto `BEGIN`/`COMMIT`/`ROLLBACK`.

use super::statement::{SqliteStatement, Statement};
use super::{DbError, DbResult};
use crate::config::ConnectionConfig;
use crate::logging::sql_summary;
use log::{debug, error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const MEMORY_TARGET: &str = ":memory:";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Owner of one physical database handle.
pub trait Adapter {
    /// Human-readable handle description used in logs (`sqlite:<target>`).
    fn name(&self) -> &str;

    /// Prepares `sql` without executing it.
    fn prepare<'a>(&'a self, sql: &str) -> DbResult<Box<dyn Statement + 'a>>;

    /// Prepares and executes `sql` with no bound parameters.
    fn query<'a>(&'a self, sql: &str) -> DbResult<Box<dyn Statement + 'a>> {
        let mut statement = self.prepare(sql)?;
        statement.execute()?;
        Ok(statement)
    }

    /// Runs a semicolon-separated script, typically DDL.
    fn execute_batch(&self, sql: &str) -> DbResult<()>;

    fn begin_transaction(&self) -> DbResult<()>;

    fn commit(&self) -> DbResult<()>;

    fn rollback(&self) -> DbResult<()>;

    fn in_transaction(&self) -> bool;

    /// Begins a transaction unless one is already open. Returns whether this
    /// call began it; only that caller should commit or roll back.
    fn ensure_transaction(&self) -> DbResult<bool> {
        if self.in_transaction() {
            return Ok(false);
        }
        self.begin_transaction()?;
        Ok(true)
    }

    /// Identity of the last inserted row.
    ///
    /// `table`/`field` are hints for handles that cannot report the identity
    /// directly; they are used only as a fallback.
    fn last_insert_id(&self, table: Option<&str>, field: Option<&str>) -> DbResult<i64>;

    fn table_exists(&self, table: &str) -> DbResult<bool>;

    fn column_exists(&self, table: &str, column: &str) -> DbResult<bool>;
}

/// SQLite adapter owning one `rusqlite::Connection`.
pub struct SqliteAdapter {
    conn: Connection,
    name: String,
}

impl SqliteAdapter {
    /// Opens the database named by `config.db` (`:memory:` or empty means an
    /// in-memory database) and applies connection options.
    ///
    /// # Side effects
    /// - Emits `db_open` logging events with duration and status.
    pub fn open(config: &ConnectionConfig) -> DbResult<Self> {
        let target = config.db.trim();
        let started_at = Instant::now();
        let mode = if target.is_empty() || target == MEMORY_TARGET {
            "memory"
        } else {
            "file"
        };
        info!("event=db_open module=db status=start mode={mode}");

        let opened = if mode == "memory" {
            Connection::open_in_memory()
        } else {
            Connection::open(Path::new(target))
        };
        let conn = match opened {
            Ok(conn) => conn,
            Err(source) => {
                error!(
                    "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                    mode,
                    started_at.elapsed().as_millis(),
                    source
                );
                return Err(DbError::Open {
                    target: target.to_string(),
                    source,
                });
            }
        };

        if let Err(err) = configure_connection(&conn, config) {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_configure_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err);
        }

        info!(
            "event=db_open module=db status=ok mode={} duration_ms={}",
            mode,
            started_at.elapsed().as_millis()
        );
        let label = if mode == "memory" { MEMORY_TARGET } else { target };
        Ok(Self {
            conn,
            name: format!("sqlite:{label}"),
        })
    }

    /// Opens an in-memory database with default options.
    pub fn open_in_memory() -> DbResult<Self> {
        Self::open(&ConnectionConfig::sqlite(MEMORY_TARGET))
    }

    /// Opens a database file with default options.
    pub fn open_path(path: impl AsRef<Path>) -> DbResult<Self> {
        let target = path.as_ref().to_string_lossy().into_owned();
        Self::open(&ConnectionConfig::sqlite(target))
    }

    fn transaction_command(&self, action: &'static str, sql: &str) -> DbResult<()> {
        match self.conn.execute_batch(sql) {
            Ok(()) => {
                debug!(
                    "event=transaction module=db status=ok action={} adapter={}",
                    action, self.name
                );
                Ok(())
            }
            Err(source) => {
                error!(
                    "event=transaction module=db status=error action={} adapter={} error={}",
                    action, self.name, source
                );
                Err(DbError::Transaction { action, source })
            }
        }
    }
}

impl Adapter for SqliteAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn prepare<'a>(&'a self, sql: &str) -> DbResult<Box<dyn Statement + 'a>> {
        match self.conn.prepare(sql) {
            Ok(inner) => Ok(Box::new(SqliteStatement::new(sql, inner))),
            Err(source) => {
                error!(
                    "event=statement_prepare module=db status=error sql={} error={}",
                    sql_summary(sql),
                    source
                );
                Err(DbError::Prepare {
                    sql: sql.to_string(),
                    source,
                })
            }
        }
    }

    fn execute_batch(&self, sql: &str) -> DbResult<()> {
        self.conn
            .execute_batch(sql)
            .map_err(|source| DbError::Execute {
                sql: sql.to_string(),
                source,
            })
    }

    fn begin_transaction(&self) -> DbResult<()> {
        self.transaction_command("begin", "BEGIN;")
    }

    fn commit(&self) -> DbResult<()> {
        self.transaction_command("commit", "COMMIT;")
    }

    fn rollback(&self) -> DbResult<()> {
        self.transaction_command("rollback", "ROLLBACK;")
    }

    fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    fn last_insert_id(&self, table: Option<&str>, field: Option<&str>) -> DbResult<i64> {
        let rowid = self.conn.last_insert_rowid();
        if rowid > 0 {
            return Ok(rowid);
        }

        let missing = || DbError::LastInsertId {
            table: table.map(str::to_string),
            field: field.map(str::to_string),
        };
        let Some(table) = table else {
            return Err(missing());
        };

        let column = field.map_or_else(|| "rowid".to_string(), quote_identifier);
        let sql = format!("SELECT MAX({column}) FROM {};", quote_identifier(table));
        let max: Option<i64> = self
            .conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(|source| DbError::Execute { sql, source })?;
        max.filter(|value| *value > 0).ok_or_else(missing)
    }

    fn table_exists(&self, table: &str) -> DbResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn column_exists(&self, table: &str, column: &str) -> DbResult<bool> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({});", quote_identifier(table)))?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let current: String = row.get(1)?;
            if current == column {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

fn configure_connection(conn: &Connection, config: &ConnectionConfig) -> DbResult<()> {
    let foreign_keys = config
        .option("foreign_keys")
        .map_or(true, |value| !matches!(value, "off" | "false" | "0"));
    let pragma = if foreign_keys {
        "PRAGMA foreign_keys = ON;"
    } else {
        "PRAGMA foreign_keys = OFF;"
    };
    conn.execute_batch(pragma)?;

    let timeout_ms = config
        .option("busy_timeout_ms")
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(DEFAULT_BUSY_TIMEOUT_MS);
    conn.busy_timeout(Duration::from_millis(timeout_ms))?;
    Ok(())
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::{Adapter, SqliteAdapter};
    use crate::db::DbError;

    #[test]
    fn in_memory_adapter_enables_foreign_keys() {
        let adapter = SqliteAdapter::open_in_memory().unwrap();
        let mut stmt = adapter.query("PRAGMA foreign_keys;").unwrap();
        let enabled = stmt.fetch().unwrap().unwrap().get::<i64>("foreign_keys").unwrap();
        assert_eq!(enabled, 1);
        assert_eq!(adapter.name(), "sqlite::memory:");
    }

    #[test]
    fn prepare_failure_is_distinct_from_execute_failure() {
        let adapter = SqliteAdapter::open_in_memory().unwrap();
        let err = adapter.prepare("SELEC nothing").err().unwrap();
        assert!(matches!(err, DbError::Prepare { .. }));
    }

    #[test]
    fn transaction_primitives_track_state() {
        let adapter = SqliteAdapter::open_in_memory().unwrap();
        adapter
            .execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY);")
            .unwrap();
        assert!(!adapter.in_transaction());

        adapter.begin_transaction().unwrap();
        assert!(adapter.in_transaction());
        adapter.query("INSERT INTO t DEFAULT VALUES;").unwrap();
        adapter.rollback().unwrap();
        assert!(!adapter.in_transaction());

        let mut stmt = adapter.query("SELECT COUNT(*) AS n FROM t;").unwrap();
        assert_eq!(stmt.fetch().unwrap().unwrap().get::<i64>("n").unwrap(), 0);
    }

    #[test]
    fn ensure_transaction_begins_only_once() {
        let adapter = SqliteAdapter::open_in_memory().unwrap();
        assert!(adapter.ensure_transaction().unwrap());
        assert!(!adapter.ensure_transaction().unwrap());
        adapter.commit().unwrap();
        assert!(!adapter.in_transaction());
    }

    #[test]
    fn commit_without_transaction_fails() {
        let adapter = SqliteAdapter::open_in_memory().unwrap();
        let err = adapter.commit().unwrap_err();
        assert!(matches!(err, DbError::Transaction { action: "commit", .. }));
    }

    #[test]
    fn last_insert_id_requires_a_prior_insert() {
        let adapter = SqliteAdapter::open_in_memory().unwrap();
        let err = adapter.last_insert_id(None, None).unwrap_err();
        assert!(matches!(err, DbError::LastInsertId { .. }));

        adapter
            .execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT);")
            .unwrap();
        adapter.query("INSERT INTO t (v) VALUES ('x');").unwrap();
        assert_eq!(adapter.last_insert_id(None, None).unwrap(), 1);
    }

    #[test]
    fn catalog_introspection_sees_tables_and_columns() {
        let adapter = SqliteAdapter::open_in_memory().unwrap();
        adapter
            .execute_batch("CREATE TABLE people (id INTEGER PRIMARY KEY, name TEXT);")
            .unwrap();
        assert!(adapter.table_exists("people").unwrap());
        assert!(!adapter.table_exists("ghosts").unwrap());
        assert!(adapter.column_exists("people", "name").unwrap());
        assert!(!adapter.column_exists("people", "age").unwrap());
    }
}
