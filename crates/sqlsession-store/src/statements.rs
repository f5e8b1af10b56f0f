//! SQL statement templates.
//!
//! Templates use positional `?` parameters and may contain `%TABLE_NAME%`,
//! which is replaced with the configured session table name when the
//! repository is built. The attribute table is `<table>_ATTRIBUTES`.

use crate::error::ConfigError;

pub const DEFAULT_TABLE_NAME: &str = "HTTP_SESSION";

const TABLE_NAME_PLACEHOLDER: &str = "%TABLE_NAME%";

pub const CREATE_SESSION_QUERY: &str = "INSERT INTO %TABLE_NAME%(PRIMARY_ID, SESSION_ID, CREATION_TIME, LAST_ACCESS_TIME, MAX_INACTIVE_INTERVAL, EXPIRY_TIME, PRINCIPAL_NAME) \
     VALUES (?, ?, ?, ?, ?, ?, ?)";

pub const CREATE_SESSION_ATTRIBUTE_QUERY: &str = "INSERT INTO %TABLE_NAME%_ATTRIBUTES(SESSION_PRIMARY_ID, ATTRIBUTE_NAME, ATTRIBUTE_BYTES) \
     VALUES (?, ?, ?)";

pub const GET_SESSION_QUERY: &str = "SELECT S.PRIMARY_ID, S.SESSION_ID, S.CREATION_TIME, S.LAST_ACCESS_TIME, S.MAX_INACTIVE_INTERVAL, SA.ATTRIBUTE_NAME, SA.ATTRIBUTE_BYTES \
     FROM %TABLE_NAME% S \
     LEFT OUTER JOIN %TABLE_NAME%_ATTRIBUTES SA ON S.PRIMARY_ID = SA.SESSION_PRIMARY_ID \
     WHERE S.SESSION_ID = ?";

pub const UPDATE_SESSION_QUERY: &str = "UPDATE %TABLE_NAME% SET SESSION_ID = ?, LAST_ACCESS_TIME = ?, MAX_INACTIVE_INTERVAL = ?, EXPIRY_TIME = ?, PRINCIPAL_NAME = ? \
     WHERE PRIMARY_ID = ?";

pub const UPDATE_SESSION_ATTRIBUTE_QUERY: &str = "UPDATE %TABLE_NAME%_ATTRIBUTES SET ATTRIBUTE_BYTES = ? \
     WHERE SESSION_PRIMARY_ID = ? AND ATTRIBUTE_NAME = ?";

pub const DELETE_SESSION_ATTRIBUTE_QUERY: &str = "DELETE FROM %TABLE_NAME%_ATTRIBUTES \
     WHERE SESSION_PRIMARY_ID = ? AND ATTRIBUTE_NAME = ?";

pub const DELETE_SESSION_QUERY: &str = "DELETE FROM %TABLE_NAME% WHERE SESSION_ID = ?";

pub const LIST_SESSIONS_BY_PRINCIPAL_NAME_QUERY: &str = "SELECT S.PRIMARY_ID, S.SESSION_ID, S.CREATION_TIME, S.LAST_ACCESS_TIME, S.MAX_INACTIVE_INTERVAL, SA.ATTRIBUTE_NAME, SA.ATTRIBUTE_BYTES \
     FROM %TABLE_NAME% S \
     LEFT OUTER JOIN %TABLE_NAME%_ATTRIBUTES SA ON S.PRIMARY_ID = SA.SESSION_PRIMARY_ID \
     WHERE S.PRINCIPAL_NAME = ?";

pub const DELETE_SESSIONS_BY_EXPIRY_TIME_QUERY: &str = "DELETE FROM %TABLE_NAME% WHERE EXPIRY_TIME < ?";

/// Raw (unsubstituted) templates, one per statement the repository issues.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatementTemplates {
    pub create_session: String,
    pub create_session_attribute: String,
    pub get_session: String,
    pub update_session: String,
    pub update_session_attribute: String,
    pub delete_session_attribute: String,
    pub delete_session: String,
    pub list_sessions_by_principal_name: String,
    pub delete_sessions_by_expiry_time: String,
}

impl Default for StatementTemplates {
    fn default() -> Self {
        Self {
            create_session: CREATE_SESSION_QUERY.to_string(),
            create_session_attribute: CREATE_SESSION_ATTRIBUTE_QUERY.to_string(),
            get_session: GET_SESSION_QUERY.to_string(),
            update_session: UPDATE_SESSION_QUERY.to_string(),
            update_session_attribute: UPDATE_SESSION_ATTRIBUTE_QUERY.to_string(),
            delete_session_attribute: DELETE_SESSION_ATTRIBUTE_QUERY.to_string(),
            delete_session: DELETE_SESSION_QUERY.to_string(),
            list_sessions_by_principal_name: LIST_SESSIONS_BY_PRINCIPAL_NAME_QUERY.to_string(),
            delete_sessions_by_expiry_time: DELETE_SESSIONS_BY_EXPIRY_TIME_QUERY.to_string(),
        }
    }
}

impl StatementTemplates {
    /// Each template paired with the name of the setting it came from.
    fn named(&self) -> [(&'static str, &str); 9] {
        [
            ("create_session_query", self.create_session.as_str()),
            ("create_session_attribute_query", self.create_session_attribute.as_str()),
            ("get_session_query", self.get_session.as_str()),
            ("update_session_query", self.update_session.as_str()),
            ("update_session_attribute_query", self.update_session_attribute.as_str()),
            ("delete_session_attribute_query", self.delete_session_attribute.as_str()),
            ("delete_session_query", self.delete_session.as_str()),
            (
                "list_sessions_by_principal_name_query",
                self.list_sessions_by_principal_name.as_str(),
            ),
            (
                "delete_sessions_by_expiry_time_query",
                self.delete_sessions_by_expiry_time.as_str(),
            ),
        ]
    }

    /// Validate every template and substitute the table name.
    pub fn resolve(&self, table_name: &str) -> Result<Statements, ConfigError> {
        let table_name = table_name.trim();
        if table_name.is_empty() {
            return Err(ConfigError::EmptyTableName);
        }
        for (setting, sql) in self.named() {
            if sql.trim().is_empty() {
                return Err(ConfigError::empty_query(setting));
            }
        }

        let sub = |sql: &str| sql.replace(TABLE_NAME_PLACEHOLDER, table_name);
        Ok(Statements {
            table_name: table_name.to_string(),
            create_session: sub(&self.create_session),
            create_session_attribute: sub(&self.create_session_attribute),
            get_session: sub(&self.get_session),
            update_session: sub(&self.update_session),
            update_session_attribute: sub(&self.update_session_attribute),
            delete_session_attribute: sub(&self.delete_session_attribute),
            delete_session: sub(&self.delete_session),
            list_sessions_by_principal_name: sub(&self.list_sessions_by_principal_name),
            delete_sessions_by_expiry_time: sub(&self.delete_sessions_by_expiry_time),
        })
    }
}

/// Validated statements with the table name substituted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Statements {
    pub table_name: String,
    pub create_session: String,
    pub create_session_attribute: String,
    pub get_session: String,
    pub update_session: String,
    pub update_session_attribute: String,
    pub delete_session_attribute: String,
    pub delete_session: String,
    pub list_sessions_by_principal_name: String,
    pub delete_sessions_by_expiry_time: String,
}
