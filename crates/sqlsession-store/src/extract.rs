//! Row extraction for the session lookup queries.
//!
//! Lookups LEFT JOIN the attribute table, so a session with N attributes
//! comes back as N rows (or one row with a NULL attribute name when it has
//! none). Column order:
//!
//! | # | Column                |
//! |---|-----------------------|
//! | 0 | PRIMARY_ID            |
//! | 1 | SESSION_ID            |
//! | 2 | CREATION_TIME         |
//! | 3 | LAST_ACCESS_TIME      |
//! | 4 | MAX_INACTIVE_INTERVAL |
//! | 5 | ATTRIBUTE_NAME        |
//! | 6 | ATTRIBUTE_BYTES       |

use std::collections::HashMap;
use std::time::Duration;

use sqlsession_types::{PrimaryKey, SessionId, SessionState};

use crate::convert::ValueConverter;
use crate::error::{StoreError, StoreResult};
use crate::lob::LobHandler;
use crate::sql::SqlRow;

const COL_PRIMARY_ID: usize = 0;
const COL_SESSION_ID: usize = 1;
const COL_CREATION_TIME: usize = 2;
const COL_LAST_ACCESS_TIME: usize = 3;
const COL_MAX_INACTIVE_INTERVAL: usize = 4;
const COL_ATTRIBUTE_NAME: usize = 5;
const COL_ATTRIBUTE_BYTES: usize = 6;

/// Folds joined rows into one [`SessionState`] per primary key.
pub struct SessionRowExtractor<'a> {
    converter: &'a dyn ValueConverter,
    lob_handler: &'a dyn LobHandler,
}

impl<'a> SessionRowExtractor<'a> {
    pub fn new(converter: &'a dyn ValueConverter, lob_handler: &'a dyn LobHandler) -> Self {
        Self {
            converter,
            lob_handler,
        }
    }

    /// Sessions in the order their first row appeared.
    pub fn extract(&self, rows: &[SqlRow]) -> StoreResult<Vec<SessionState>> {
        let mut sessions: Vec<SessionState> = Vec::new();
        let mut by_key: HashMap<PrimaryKey, usize> = HashMap::new();

        for row in rows {
            let primary_key = PrimaryKey::parse(row.text(COL_PRIMARY_ID)?)
                .map_err(|e| StoreError::invalid_row(format!("bad primary key: {e}")))?;

            let idx = match by_key.get(&primary_key) {
                Some(&idx) => idx,
                None => {
                    sessions.push(self.session_columns(primary_key, row)?);
                    by_key.insert(primary_key, sessions.len() - 1);
                    sessions.len() - 1
                }
            };

            if let Some(name) = row.opt_text(COL_ATTRIBUTE_NAME)? {
                let bytes = self.lob_handler.from_sql(row.value(COL_ATTRIBUTE_BYTES)?)?;
                let value = self.converter.deserialize(&bytes)?;
                sessions[idx].attributes.insert(name.to_string(), value);
            }
        }

        Ok(sessions)
    }

    fn session_columns(&self, primary_key: PrimaryKey, row: &SqlRow) -> StoreResult<SessionState> {
        let id = SessionId::parse(row.text(COL_SESSION_ID)?)
            .map_err(|e| StoreError::invalid_row(e.to_string()))?;
        Ok(SessionState {
            primary_key,
            id,
            creation_time: non_negative(row.i64(COL_CREATION_TIME)?, "CREATION_TIME")?,
            last_accessed_time: non_negative(row.i64(COL_LAST_ACCESS_TIME)?, "LAST_ACCESS_TIME")?,
            max_inactive_interval: Duration::from_secs(non_negative(
                row.i64(COL_MAX_INACTIVE_INTERVAL)?,
                "MAX_INACTIVE_INTERVAL",
            )?),
            attributes: HashMap::new(),
        })
    }
}

fn non_negative(v: i64, column: &str) -> StoreResult<u64> {
    u64::try_from(v).map_err(|_| StoreError::invalid_row(format!("{column} is negative: {v}")))
}
