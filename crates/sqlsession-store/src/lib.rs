//! # sqlsession-store
//!
//! Relational storage for [`sqlsession_types::Session`].
//!
//! [`SessionRepository`] turns a session's recorded changes into the minimal
//! set of SQL statements and runs them through two capabilities:
//! [`SqlExecutor`] (statements and queries) and [`TransactionScope`]
//! (commit or roll back a unit of work). [`SqliteDatabase`] provides both.
//!
//! ```no_run
//! use std::sync::Arc;
//! use sqlsession_store::{SessionRepository, SqliteDatabase};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Arc::new(SqliteDatabase::open("sessions.db")?);
//! db.init_schema("HTTP_SESSION")?;
//! let repo = SessionRepository::builder().database(db).build()?;
//!
//! let mut session = repo.create_session()?;
//! session.set_attribute("cart", serde_json::json!(["book"]));
//! repo.save(&mut session)?;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod convert;
pub mod error;
pub mod extract;
pub mod lob;
pub mod repository;
pub mod sql;
pub mod sqlite;
pub mod statements;

#[cfg(test)]
mod mock;

pub use batch::{StatementBatchBuilder, StatementPlan};
pub use config::{LargeObjectStrategy, QueryOverrides, SessionStoreConfig};
pub use convert::{JsonValueConverter, ValueConverter};
pub use error::{ConfigError, StoreError, StoreResult};
pub use extract::SessionRowExtractor;
pub use lob::{Base64LobHandler, BlobLobHandler, LobHandler};
pub use repository::{SessionEditor, SessionRepository, SessionRepositoryBuilder};
pub use sql::{NoTransaction, SqlExecutor, SqlRow, SqlValue, TransactionScope, in_transaction};
pub use sqlite::{SqliteDatabase, schema_sql};
pub use statements::{DEFAULT_TABLE_NAME, StatementTemplates, Statements};
