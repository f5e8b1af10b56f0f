//! Error types for the session store.
//!
//! Configuration problems are reported while the repository is being built
//! and name the offending setting. Everything that comes back from the
//! execution capability is passed through untouched.

use thiserror::Error;

/// Invalid or incomplete repository configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The table name is blank.
    #[error("table name must not be empty")]
    EmptyTableName,

    /// A statement template is blank.
    #[error("query `{setting}` must not be empty")]
    EmptyQuery {
        /// Name of the setting, e.g. `create_session_query`.
        setting: &'static str,
    },

    /// A required capability was never supplied to the builder.
    #[error("{0} must be provided")]
    MissingDependency(&'static str),

    /// The config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`crate::SessionStoreConfig`].
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    pub fn empty_query(setting: &'static str) -> Self {
        Self::EmptyQuery { setting }
    }
}

/// Errors surfaced by repository operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Error from the SQLite execution capability.
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// Error from any other execution capability.
    #[error("storage error: {0}")]
    Storage(String),

    /// An attribute value could not be converted to or from its stored form.
    #[error("attribute conversion failed: {0}")]
    Conversion(#[from] serde_json::Error),

    /// A large-object payload could not be bound or read.
    #[error("large object error: {0}")]
    LargeObject(String),

    /// A result row did not have the expected shape.
    #[error("invalid row: {0}")]
    InvalidRow(String),

    /// Configuration error surfaced at runtime (e.g. building from a file).
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl StoreError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn invalid_row(msg: impl Into<String>) -> Self {
        Self::InvalidRow(msg.into())
    }

    pub fn large_object(msg: impl Into<String>) -> Self {
        Self::LargeObject(msg.into())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
