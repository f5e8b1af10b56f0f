//! Repository configuration.
//!
//! Loaded from TOML or built in code with the `with_*` setters. Nothing is
//! validated here; [`crate::SessionRepositoryBuilder::build`] validates the
//! whole thing at once and names the first bad setting.
//!
//! ```toml
//! table_name = "HTTP_SESSION"
//! flush_mode = "on_save"            # or "immediate"
//! save_mode = "on_set_attribute"    # or "on_get_attribute", "always"
//! default_max_inactive_interval_secs = 1800
//! cleanup_interval_secs = 60
//! large_objects = "blob"            # or "base64"
//!
//! [queries]
//! delete_session = "DELETE FROM %TABLE_NAME% WHERE SESSION_ID = ?"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlsession_types::{DEFAULT_MAX_INACTIVE_INTERVAL, FlushMode, SaveMode};

use crate::error::ConfigError;
use crate::lob::{Base64LobHandler, BlobLobHandler, LobHandler};
use crate::statements::{DEFAULT_TABLE_NAME, StatementTemplates};

/// Default period between expiry sweeps when run as a loop.
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60;

/// How attribute payloads are bound to the attribute column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LargeObjectStrategy {
    #[default]
    Blob,
    Base64,
}

impl LargeObjectStrategy {
    pub fn handler(self) -> Box<dyn LobHandler> {
        match self {
            LargeObjectStrategy::Blob => Box::new(BlobLobHandler),
            LargeObjectStrategy::Base64 => Box::new(Base64LobHandler),
        }
    }
}

/// Per-statement template overrides. Unset entries use the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_session: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_session_attribute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get_session: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_session: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_session_attribute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_session_attribute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_session: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_sessions_by_principal_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_sessions_by_expiry_time: Option<String>,
}

/// Configuration for a [`crate::SessionRepository`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionStoreConfig {
    pub table_name: String,
    pub flush_mode: FlushMode,
    pub save_mode: SaveMode,
    pub default_max_inactive_interval_secs: u64,
    pub cleanup_interval_secs: u64,
    pub large_objects: LargeObjectStrategy,
    pub queries: QueryOverrides,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            flush_mode: FlushMode::default(),
            save_mode: SaveMode::default(),
            default_max_inactive_interval_secs: DEFAULT_MAX_INACTIVE_INTERVAL.as_secs(),
            cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
            large_objects: LargeObjectStrategy::default(),
            queries: QueryOverrides::default(),
        }
    }
}

impl SessionStoreConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Read and parse a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = name.into();
        self
    }

    pub fn with_flush_mode(mut self, mode: FlushMode) -> Self {
        self.flush_mode = mode;
        self
    }

    pub fn with_save_mode(mut self, mode: SaveMode) -> Self {
        self.save_mode = mode;
        self
    }

    pub fn with_default_max_inactive_interval(mut self, interval: Duration) -> Self {
        self.default_max_inactive_interval_secs = interval.as_secs();
        self
    }

    pub fn with_large_objects(mut self, strategy: LargeObjectStrategy) -> Self {
        self.large_objects = strategy;
        self
    }

    pub fn default_max_inactive_interval(&self) -> Duration {
        Duration::from_secs(self.default_max_inactive_interval_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    /// Defaults with any configured overrides applied.
    pub fn templates(&self) -> StatementTemplates {
        let q = &self.queries;
        let pick = |over: &Option<String>, default: String| over.clone().unwrap_or(default);
        let d = StatementTemplates::default();
        StatementTemplates {
            create_session: pick(&q.create_session, d.create_session),
            create_session_attribute: pick(&q.create_session_attribute, d.create_session_attribute),
            get_session: pick(&q.get_session, d.get_session),
            update_session: pick(&q.update_session, d.update_session),
            update_session_attribute: pick(&q.update_session_attribute, d.update_session_attribute),
            delete_session_attribute: pick(&q.delete_session_attribute, d.delete_session_attribute),
            delete_session: pick(&q.delete_session, d.delete_session),
            list_sessions_by_principal_name: pick(
                &q.list_sessions_by_principal_name,
                d.list_sessions_by_principal_name,
            ),
            delete_sessions_by_expiry_time: pick(
                &q.delete_sessions_by_expiry_time,
                d.delete_sessions_by_expiry_time,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionStoreConfig::default();
        assert_eq!(config.table_name, DEFAULT_TABLE_NAME);
        assert_eq!(config.flush_mode, FlushMode::OnSave);
        assert_eq!(config.save_mode, SaveMode::OnSetAttribute);
        assert_eq!(config.default_max_inactive_interval(), Duration::from_secs(1800));
        assert_eq!(config.templates(), StatementTemplates::default());
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = SessionStoreConfig::from_toml_str("").unwrap();
        assert_eq!(config, SessionStoreConfig::default());
    }

    #[test]
    fn test_parse_toml() {
        let config = SessionStoreConfig::from_toml_str(
            r#"
            table_name = "APP_SESSION"
            flush_mode = "immediate"
            save_mode = "always"
            default_max_inactive_interval_secs = 60
            large_objects = "base64"

            [queries]
            delete_session = "DELETE FROM %TABLE_NAME% WHERE SESSION_ID = ? AND 1 = 1"
            "#,
        )
        .unwrap();

        assert_eq!(config.table_name, "APP_SESSION");
        assert_eq!(config.flush_mode, FlushMode::Immediate);
        assert_eq!(config.save_mode, SaveMode::Always);
        assert_eq!(config.default_max_inactive_interval(), Duration::from_secs(60));
        assert_eq!(config.large_objects, LargeObjectStrategy::Base64);

        let templates = config.templates();
        assert!(templates.delete_session.ends_with("AND 1 = 1"));
        assert_eq!(
            templates.get_session,
            StatementTemplates::default().get_session
        );
    }

    #[test]
    fn test_bad_toml() {
        let err = SessionStoreConfig::from_toml_str("flush_mode = \"sometimes\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.toml");
        std::fs::write(&path, "cleanup_interval_secs = 5\n").unwrap();

        let config = SessionStoreConfig::load(&path).unwrap();
        assert_eq!(config.cleanup_interval(), Duration::from_secs(5));

        let missing = SessionStoreConfig::load(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }
}
