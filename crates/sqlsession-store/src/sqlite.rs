//! SQLite execution capability.
//!
//! One connection behind a reentrant lock. A transaction holds the lock for
//! its whole body, so statements from other threads cannot land inside it,
//! while statements issued by the body itself (same thread) re-enter freely.
//! A `run` inside an open transaction joins it.

use std::path::Path;
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use rusqlite::{Connection, params_from_iter};
use tracing::{debug, warn};

use crate::error::{ConfigError, StoreError, StoreResult};
use crate::sql::{SqlExecutor, SqlRow, SqlValue, TransactionScope};

const SCHEMA_TEMPLATE: &str = r#"
CREATE TABLE IF NOT EXISTS %TABLE_NAME% (
    PRIMARY_ID TEXT NOT NULL PRIMARY KEY,
    SESSION_ID TEXT NOT NULL,
    CREATION_TIME INTEGER NOT NULL,
    LAST_ACCESS_TIME INTEGER NOT NULL,
    MAX_INACTIVE_INTERVAL INTEGER NOT NULL,
    EXPIRY_TIME INTEGER NOT NULL,
    PRINCIPAL_NAME TEXT
);
CREATE UNIQUE INDEX IF NOT EXISTS %TABLE_NAME%_IX1 ON %TABLE_NAME% (SESSION_ID);
CREATE INDEX IF NOT EXISTS %TABLE_NAME%_IX2 ON %TABLE_NAME% (EXPIRY_TIME);
CREATE INDEX IF NOT EXISTS %TABLE_NAME%_IX3 ON %TABLE_NAME% (PRINCIPAL_NAME);

CREATE TABLE IF NOT EXISTS %TABLE_NAME%_ATTRIBUTES (
    SESSION_PRIMARY_ID TEXT NOT NULL,
    ATTRIBUTE_NAME TEXT NOT NULL,
    ATTRIBUTE_BYTES BLOB NOT NULL,
    PRIMARY KEY (SESSION_PRIMARY_ID, ATTRIBUTE_NAME),
    FOREIGN KEY (SESSION_PRIMARY_ID) REFERENCES %TABLE_NAME% (PRIMARY_ID) ON DELETE CASCADE
);
"#;

/// Schema DDL for a session table and its attribute table.
pub fn schema_sql(table_name: &str) -> StoreResult<String> {
    let table_name = table_name.trim();
    if table_name.is_empty() {
        return Err(ConfigError::EmptyTableName.into());
    }
    if !table_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(StoreError::storage(format!(
            "table name {table_name:?} is not a plain identifier"
        )));
    }
    Ok(SCHEMA_TEMPLATE.replace("%TABLE_NAME%", table_name))
}

/// Shared SQLite connection implementing both [`SqlExecutor`] and
/// [`TransactionScope`].
#[derive(Clone)]
pub struct SqliteDatabase {
    conn: Arc<ReentrantMutex<Connection>>,
}

impl SqliteDatabase {
    /// Open or create a database file.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// In-memory database (for tests and tooling).
    pub fn in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn: Arc::new(ReentrantMutex::new(conn)),
        })
    }

    /// Create the session tables if they do not exist.
    pub fn init_schema(&self, table_name: &str) -> StoreResult<()> {
        let ddl = schema_sql(table_name)?;
        self.conn.lock().execute_batch(&ddl)?;
        debug!("Schema ready for {}", table_name.trim());
        Ok(())
    }
}

impl SqlExecutor for SqliteDatabase {
    fn execute(&self, sql: &str, params: &[SqlValue]) -> StoreResult<usize> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(sql)?;
        Ok(stmt.execute(params_from_iter(params.iter()))?)
    }

    fn execute_batch(&self, sql: &str, batch: &[Vec<SqlValue>]) -> StoreResult<Vec<usize>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(sql)?;
        let mut counts = Vec::with_capacity(batch.len());
        for params in batch {
            counts.push(stmt.execute(params_from_iter(params.iter()))?);
        }
        Ok(counts)
    }

    fn query(&self, sql: &str, params: &[SqlValue]) -> StoreResult<Vec<SqlRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(sql)?;
        let columns = stmt.column_count();
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
            (0..columns)
                .map(|i| row.get_ref(i).map(sql_value))
                .collect::<rusqlite::Result<Vec<_>>>()
                .map(SqlRow::new)
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

impl TransactionScope for SqliteDatabase {
    fn run(&self, body: &mut dyn FnMut() -> StoreResult<()>) -> StoreResult<()> {
        let conn = self.conn.lock();
        if !conn.is_autocommit() {
            return body();
        }

        // Drop rolls back an unfinished transaction, including after a failed COMMIT
        let tx = conn.unchecked_transaction()?;
        match body() {
            Ok(()) => {
                tx.commit()?;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback() {
                    warn!("Rollback failed after {}: {}", e, rollback);
                }
                Err(e)
            }
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(Value::Null),
            SqlValue::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            SqlValue::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

fn sql_value(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) => SqlValue::Integer(i),
        // No column in the session schema is REAL
        ValueRef::Real(f) => SqlValue::Text(f.to_string()),
        ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
    }
}
