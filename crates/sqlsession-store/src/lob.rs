//! Large-object handling for attribute payloads.
//!
//! The converter produces bytes; a `LobHandler` decides how those bytes are
//! bound to the `ATTRIBUTE_BYTES` column and read back from it.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::error::{StoreError, StoreResult};
use crate::sql::SqlValue;

pub trait LobHandler: Send + Sync {
    /// Bind a payload for writing.
    fn to_sql(&self, bytes: Vec<u8>) -> StoreResult<SqlValue>;

    /// Read a payload back from a result column.
    fn from_sql(&self, value: &SqlValue) -> StoreResult<Vec<u8>>;
}

/// Binds payloads as BLOBs.
#[derive(Clone, Copy, Debug, Default)]
pub struct BlobLobHandler;

impl LobHandler for BlobLobHandler {
    fn to_sql(&self, bytes: Vec<u8>) -> StoreResult<SqlValue> {
        Ok(SqlValue::Blob(bytes))
    }

    fn from_sql(&self, value: &SqlValue) -> StoreResult<Vec<u8>> {
        match value {
            SqlValue::Blob(b) => Ok(b.clone()),
            // Some drivers hand BLOB columns back as text when the payload is valid UTF-8
            SqlValue::Text(s) => Ok(s.as_bytes().to_vec()),
            other => Err(StoreError::large_object(format!(
                "expected blob, got {other:?}"
            ))),
        }
    }
}

/// Binds payloads as base64 text, for schemas without a binary column type.
#[derive(Clone, Copy, Debug, Default)]
pub struct Base64LobHandler;

impl LobHandler for Base64LobHandler {
    fn to_sql(&self, bytes: Vec<u8>) -> StoreResult<SqlValue> {
        Ok(SqlValue::Text(STANDARD.encode(bytes)))
    }

    fn from_sql(&self, value: &SqlValue) -> StoreResult<Vec<u8>> {
        let text = value
            .as_str()
            .ok_or_else(|| StoreError::large_object(format!("expected text, got {value:?}")))?;
        STANDARD
            .decode(text)
            .map_err(|e| StoreError::large_object(e.to_string()))
    }
}
