//! Session entity and change tracking for sqlsession.
//!
//! This crate has no storage dependencies. It models what a session *is*
//! and what changed since it was last written; `sqlsession-store` decides
//! which SQL that turns into.
//!
//! # Key Types
//!
//! |--------------------------|-------------------------------------------------|
//! | Type                     | Purpose                                         |
//! |--------------------------|-------------------------------------------------|
//! | [`Session`]              | Mutable session state + new/changed flags       |
//! | [`AttributeDiffTracker`] | Coalesced per-attribute change since last flush |
//! | [`AttributeChange`]      | Added / Updated / Removed with value            |
//! | [`SaveMode`]             | Which accesses count as changes                 |
//! | [`FlushMode`]            | Persist on save, or on every mutation           |
//! | [`SessionId`]            | External id (rotatable)                         |
//! | [`PrimaryKey`]           | Storage identity (stable)                       |
//! |--------------------------|-------------------------------------------------|

pub mod delta;
pub mod ids;
pub mod policy;
pub mod session;

pub use delta::{AttributeChange, AttributeDiffTracker, ChangeKind};
pub use ids::{PrimaryKey, SessionId, SessionIdError};
pub use policy::{AttributeAccess, FlushMode, SaveMode};
pub use session::{
    DEFAULT_MAX_INACTIVE_INTERVAL, PRINCIPAL_NAME_INDEX_NAME, SECURITY_CONTEXT_ATTRIBUTE, Session,
    SessionState,
};

/// Attribute values are arbitrary JSON.
pub type AttributeValue = serde_json::Value;

/// Current time as Unix milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
