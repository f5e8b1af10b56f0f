//! Session identifiers.
//!
//! A session has two identities:
//!
//! - [`SessionId`] is the external id handed to clients (cookie value). It is
//!   an opaque string and may be regenerated during the session's lifetime
//!   (e.g. after login, to defeat fixation).
//! - [`PrimaryKey`] is the storage identity of the session row. It is assigned
//!   once when the session is built and never changes, so attribute rows keep
//!   pointing at the right parent even when the external id rotates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// External session identifier (random UUIDv4 text by default).
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

/// Error for session ids that cannot be used as lookup keys.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionIdError {
    #[error("session id must not be empty")]
    Empty,
}

impl SessionId {
    /// Generate a fresh random session id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Wrap an existing id (as read from a cookie or a database row).
    pub fn parse(s: impl Into<String>) -> Result<Self, SessionIdError> {
        let s = s.into();
        if s.trim().is_empty() {
            return Err(SessionIdError::Empty);
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// First 8 characters, for log lines only.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.short())
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Storage identity of a session row (UUIDv7, time-ordered).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrimaryKey(uuid::Uuid);

impl PrimaryKey {
    /// Create a new time-ordered key.
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    /// First 8 hex characters, for display only.
    pub fn short(&self) -> String {
        self.0.as_simple().to_string()[..8].to_string()
    }

    /// Parse from a hex string (32 chars, no hyphens) or standard UUID format.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        uuid::Uuid::parse_str(s).map(Self)
    }
}

impl Default for PrimaryKey {
    fn default() -> Self {
        Self::new()
    }
}

impl From<uuid::Uuid> for PrimaryKey {
    fn from(u: uuid::Uuid) -> Self {
        Self(u)
    }
}

impl From<PrimaryKey> for uuid::Uuid {
    fn from(key: PrimaryKey) -> uuid::Uuid {
        key.0
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Stored as hyphenated text in the PRIMARY_ID column
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrimaryKey({})", self.short())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_session_ids_are_unique() {
        assert_ne!(SessionId::generate(), SessionId::generate());
    }

    #[test]
    fn test_session_id_rejects_blank() {
        assert_eq!(SessionId::parse(""), Err(SessionIdError::Empty));
        assert_eq!(SessionId::parse("  "), Err(SessionIdError::Empty));
        assert_eq!(SessionId::parse("abc").unwrap().as_str(), "abc");
    }

    #[test]
    fn test_session_id_short() {
        let id = SessionId::parse("0123456789abcdef").unwrap();
        assert_eq!(id.short(), "01234567");
        let tiny = SessionId::parse("ab").unwrap();
        assert_eq!(tiny.short(), "ab");
        assert_eq!(format!("{:?}", id), "SessionId(01234567)");
    }

    #[test]
    fn test_primary_key_roundtrip_text() {
        let key = PrimaryKey::new();
        let parsed = PrimaryKey::parse(&key.to_string()).unwrap();
        assert_eq!(key, parsed);
    }

    #[test]
    fn test_primary_keys_are_time_ordered() {
        let keys: Vec<PrimaryKey> = (0..10).map(|_| PrimaryKey::new()).collect();
        for i in 1..keys.len() {
            assert!(keys[i] >= keys[i - 1]);
        }
    }

    #[test]
    fn test_serde_is_transparent() {
        let id = SessionId::parse("abc").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");

        let key = PrimaryKey::new();
        let json = serde_json::to_string(&key).unwrap();
        let parsed: PrimaryKey = serde_json::from_str(&json).unwrap();
        assert_eq!(key, parsed);
    }
}
