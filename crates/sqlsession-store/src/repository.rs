//! The session repository.
//!
//! Translates a session's recorded changes into the smallest set of SQL
//! statements that brings storage in line with memory:
//!
//! - a new session is one session INSERT plus its attributes (one statement,
//!   or one batch for two or more);
//! - an existing session gets a session UPDATE only when its row fields
//!   changed, then one statement or batch per change kind;
//! - a session with nothing recorded costs nothing.
//!
//! Every write runs inside the configured [`TransactionScope`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sqlsession_types::{
    AttributeChange, AttributeValue, ChangeKind, DEFAULT_MAX_INACTIVE_INTERVAL, FlushMode,
    PRINCIPAL_NAME_INDEX_NAME, SaveMode, Session, SessionId,
};
use tracing::{debug, info, trace, warn};

use crate::batch::StatementBatchBuilder;
use crate::config::SessionStoreConfig;
use crate::convert::{JsonValueConverter, ValueConverter};
use crate::error::{ConfigError, StoreResult};
use crate::extract::SessionRowExtractor;
use crate::lob::{BlobLobHandler, LobHandler};
use crate::sql::{SqlExecutor, SqlValue, TransactionScope, in_transaction};
use crate::statements::{DEFAULT_TABLE_NAME, StatementTemplates, Statements};

/// Session store over an abstract SQL execution capability.
pub struct SessionRepository {
    executor: Arc<dyn SqlExecutor>,
    transactions: Arc<dyn TransactionScope>,
    converter: Box<dyn ValueConverter>,
    lob_handler: Box<dyn LobHandler>,
    statements: Statements,
    flush_mode: FlushMode,
    save_mode: SaveMode,
    default_max_inactive_interval: Duration,
}

impl std::fmt::Debug for SessionRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRepository")
            .field("table_name", &self.statements.table_name)
            .field("flush_mode", &self.flush_mode)
            .field("save_mode", &self.save_mode)
            .field(
                "default_max_inactive_interval",
                &self.default_max_inactive_interval,
            )
            .finish_non_exhaustive()
    }
}

impl SessionRepository {
    pub fn builder() -> SessionRepositoryBuilder {
        SessionRepositoryBuilder::new()
    }

    pub fn statements(&self) -> &Statements {
        &self.statements
    }

    pub fn flush_mode(&self) -> FlushMode {
        self.flush_mode
    }

    pub fn save_mode(&self) -> SaveMode {
        self.save_mode
    }

    pub fn default_max_inactive_interval(&self) -> Duration {
        self.default_max_inactive_interval
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// New session with a fresh id and the default interval. Under
    /// [`FlushMode::Immediate`] it is inserted before being returned.
    pub fn create_session(&self) -> StoreResult<Session> {
        let mut session = Session::new(self.default_max_inactive_interval, self.save_mode);
        if self.flush_mode.is_immediate() {
            self.save(&mut session)?;
        }
        Ok(session)
    }

    /// Persist whatever changed since the last save.
    pub fn save(&self, session: &mut Session) -> StoreResult<()> {
        let current: &Session = session;
        if current.is_new() {
            in_transaction(self.transactions.as_ref(), || self.insert_session(current))?;
        } else if current.has_pending_writes() {
            in_transaction(self.transactions.as_ref(), || self.update_session(current))?;
        } else {
            trace!("Session {} unchanged, nothing to save", session.id().short());
            return Ok(());
        }
        session.mark_persisted();
        Ok(())
    }

    /// Load a session. An expired session is deleted and reported absent.
    pub fn find_by_id(&self, id: &str) -> StoreResult<Option<Session>> {
        in_transaction(self.transactions.as_ref(), || {
            let rows = self
                .executor
                .query(&self.statements.get_session, &[SqlValue::from(id)])?;
            let Some(state) = self.extractor().extract(&rows)?.into_iter().next() else {
                return Ok(None);
            };

            let session = Session::from_state(state, self.save_mode);
            if session.is_expired() {
                warn!("Session {} expired, deleting on load", session.id().short());
                self.executor
                    .execute(&self.statements.delete_session, &[SqlValue::from(id)])?;
                return Ok(None);
            }
            Ok(Some(session))
        })
    }

    /// Delete a session and its attributes. Deleting an unknown id is not an error.
    pub fn delete_by_id(&self, id: &str) -> StoreResult<()> {
        let deleted = in_transaction(self.transactions.as_ref(), || {
            self.executor
                .execute(&self.statements.delete_session, &[SqlValue::from(id)])
        })?;
        debug!("Deleted session {} ({} rows)", id, deleted);
        Ok(())
    }

    /// Sessions keyed by id. Only [`PRINCIPAL_NAME_INDEX_NAME`] is indexed;
    /// any other name matches nothing.
    pub fn find_by_index_name_and_index_value(
        &self,
        index_name: &str,
        index_value: &str,
    ) -> StoreResult<HashMap<String, Session>> {
        if index_name != PRINCIPAL_NAME_INDEX_NAME {
            return Ok(HashMap::new());
        }

        let states = in_transaction(self.transactions.as_ref(), || {
            let rows = self.executor.query(
                &self.statements.list_sessions_by_principal_name,
                &[SqlValue::from(index_value)],
            )?;
            self.extractor().extract(&rows)
        })?;

        Ok(states
            .into_iter()
            .map(|state| {
                let session = Session::from_state(state, self.save_mode);
                (session.id().to_string(), session)
            })
            .collect())
    }

    pub fn find_by_principal_name(&self, principal: &str) -> StoreResult<HashMap<String, Session>> {
        self.find_by_index_name_and_index_value(PRINCIPAL_NAME_INDEX_NAME, principal)
    }

    /// Delete every session whose expiry time has passed. One statement.
    pub fn clean_up_expired_sessions(&self) -> StoreResult<usize> {
        let now = sqlsession_types::now_millis();
        let deleted = in_transaction(self.transactions.as_ref(), || {
            self.executor.execute(
                &self.statements.delete_sessions_by_expiry_time,
                &[SqlValue::from(now)],
            )
        })?;
        info!("Cleaned up {} expired sessions", deleted);
        Ok(deleted)
    }

    /// Mutate `session` through the repository so that
    /// [`FlushMode::Immediate`] can persist each change as it happens.
    pub fn edit<'a>(&'a self, session: &'a mut Session) -> SessionEditor<'a> {
        SessionEditor {
            repository: self,
            session,
        }
    }

    // ========================================================================
    // Statement issue
    // ========================================================================

    fn extractor(&self) -> SessionRowExtractor<'_> {
        SessionRowExtractor::new(self.converter.as_ref(), self.lob_handler.as_ref())
    }

    fn batch_builder(&self) -> StatementBatchBuilder<'_> {
        StatementBatchBuilder::new(self.converter.as_ref(), self.lob_handler.as_ref())
    }

    fn insert_session(&self, session: &Session) -> StoreResult<()> {
        debug!(
            "Inserting session {} ({} attributes)",
            session.id().short(),
            session.attribute_count()
        );
        self.executor.execute(
            &self.statements.create_session,
            &[
                SqlValue::from(session.primary_key().to_string()),
                SqlValue::from(session.id().as_str()),
                SqlValue::from(session.creation_time()),
                SqlValue::from(session.last_accessed_time()),
                SqlValue::from(session.max_inactive_interval().as_secs()),
                SqlValue::from(session.expiry_time()),
                SqlValue::from(session.principal_name()),
            ],
        )?;

        self.write_attributes(
            session,
            ChangeKind::Added,
            &self.statements.create_session_attribute,
            &session.all_attributes_as_added(),
        )
    }

    fn update_session(&self, session: &Session) -> StoreResult<()> {
        if session.is_changed() {
            debug!("Updating session row {}", session.id().short());
            self.executor.execute(
                &self.statements.update_session,
                &[
                    SqlValue::from(session.id().as_str()),
                    SqlValue::from(session.last_accessed_time()),
                    SqlValue::from(session.max_inactive_interval().as_secs()),
                    SqlValue::from(session.expiry_time()),
                    SqlValue::from(session.principal_name()),
                    SqlValue::from(session.primary_key().to_string()),
                ],
            )?;
        }

        let groups = [
            (ChangeKind::Added, &self.statements.create_session_attribute),
            (ChangeKind::Updated, &self.statements.update_session_attribute),
            (ChangeKind::Removed, &self.statements.delete_session_attribute),
        ];
        for (kind, sql) in groups {
            self.write_attributes(session, kind, sql, &session.pending_changes(kind))?;
        }
        Ok(())
    }

    fn write_attributes(
        &self,
        session: &Session,
        kind: ChangeKind,
        sql: &str,
        changes: &[AttributeChange],
    ) -> StoreResult<()> {
        let Some(plan) = self
            .batch_builder()
            .build(sql, kind, session.primary_key(), changes)?
        else {
            return Ok(());
        };
        debug!(
            "Session {}: {:?} x{} ({})",
            session.id().short(),
            kind,
            plan.batch_size(),
            if plan.is_batch() { "batch" } else { "single" }
        );
        plan.execute(self.executor.as_ref())?;
        Ok(())
    }
}

// ============================================================================
// Editor
// ============================================================================

/// Borrowed view of a session bound to its repository.
///
/// Under [`FlushMode::Immediate`] every mutating call saves before it
/// returns; under [`FlushMode::OnSave`] it only mutates.
pub struct SessionEditor<'a> {
    repository: &'a SessionRepository,
    session: &'a mut Session,
}

impl SessionEditor<'_> {
    pub fn session(&self) -> &Session {
        &*self.session
    }

    pub fn id(&self) -> &SessionId {
        self.session.id()
    }

    pub fn attribute(&mut self, name: &str) -> Option<&AttributeValue> {
        self.session.attribute(name)
    }

    pub fn attribute_names(&self) -> Vec<String> {
        self.session.attribute_names()
    }

    pub fn set_attribute(
        &mut self,
        name: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> StoreResult<()> {
        self.session.set_attribute(name, value);
        self.flush_if_required()
    }

    pub fn remove_attribute(&mut self, name: &str) -> StoreResult<Option<AttributeValue>> {
        let removed = self.session.remove_attribute(name);
        self.flush_if_required()?;
        Ok(removed)
    }

    pub fn set_last_accessed_time(&mut self, millis: u64) -> StoreResult<()> {
        self.session.set_last_accessed_time(millis);
        self.flush_if_required()
    }

    pub fn set_max_inactive_interval(&mut self, interval: Duration) -> StoreResult<()> {
        self.session.set_max_inactive_interval(interval);
        self.flush_if_required()
    }

    pub fn change_session_id(&mut self) -> StoreResult<SessionId> {
        let id = self.session.change_session_id().clone();
        self.flush_if_required()?;
        Ok(id)
    }

    /// Save regardless of flush mode.
    pub fn save(&mut self) -> StoreResult<()> {
        self.repository.save(self.session)
    }

    fn flush_if_required(&mut self) -> StoreResult<()> {
        if self.repository.flush_mode.is_immediate() {
            self.repository.save(self.session)?;
        }
        Ok(())
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Collects capabilities and settings; [`SessionRepositoryBuilder::build`]
/// validates them all.
pub struct SessionRepositoryBuilder {
    executor: Option<Arc<dyn SqlExecutor>>,
    transactions: Option<Arc<dyn TransactionScope>>,
    converter: Box<dyn ValueConverter>,
    lob_handler: Box<dyn LobHandler>,
    table_name: String,
    templates: StatementTemplates,
    flush_mode: FlushMode,
    save_mode: SaveMode,
    default_max_inactive_interval: Duration,
}

impl Default for SessionRepositoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRepositoryBuilder {
    pub fn new() -> Self {
        Self {
            executor: None,
            transactions: None,
            converter: Box::new(JsonValueConverter),
            lob_handler: Box::new(BlobLobHandler),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            templates: StatementTemplates::default(),
            flush_mode: FlushMode::default(),
            save_mode: SaveMode::default(),
            default_max_inactive_interval: DEFAULT_MAX_INACTIVE_INTERVAL,
        }
    }

    /// Apply every setting from a loaded config. Capabilities still have to
    /// be supplied separately.
    pub fn config(mut self, config: &SessionStoreConfig) -> Self {
        self.table_name = config.table_name.clone();
        self.templates = config.templates();
        self.flush_mode = config.flush_mode;
        self.save_mode = config.save_mode;
        self.default_max_inactive_interval = config.default_max_inactive_interval();
        self.lob_handler = config.large_objects.handler();
        self
    }

    pub fn executor(mut self, executor: Arc<dyn SqlExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn transactions(mut self, transactions: Arc<dyn TransactionScope>) -> Self {
        self.transactions = Some(transactions);
        self
    }

    /// Use one object as both the executor and the transaction scope.
    pub fn database<D>(self, db: Arc<D>) -> Self
    where
        D: SqlExecutor + TransactionScope + 'static,
    {
        let executor: Arc<dyn SqlExecutor> = db.clone();
        let transactions: Arc<dyn TransactionScope> = db;
        self.executor(executor).transactions(transactions)
    }

    pub fn value_converter(mut self, converter: Box<dyn ValueConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn lob_handler(mut self, lob_handler: Box<dyn LobHandler>) -> Self {
        self.lob_handler = lob_handler;
        self
    }

    pub fn table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    pub fn templates(mut self, templates: StatementTemplates) -> Self {
        self.templates = templates;
        self
    }

    pub fn flush_mode(mut self, mode: FlushMode) -> Self {
        self.flush_mode = mode;
        self
    }

    pub fn save_mode(mut self, mode: SaveMode) -> Self {
        self.save_mode = mode;
        self
    }

    pub fn default_max_inactive_interval(mut self, interval: Duration) -> Self {
        self.default_max_inactive_interval = interval;
        self
    }

    pub fn build(self) -> Result<SessionRepository, ConfigError> {
        let executor = self
            .executor
            .ok_or(ConfigError::MissingDependency("executor"))?;
        let transactions = self
            .transactions
            .ok_or(ConfigError::MissingDependency("transactions"))?;
        let statements = self.templates.resolve(&self.table_name)?;

        debug!(
            "Session repository on {} (flush={}, save={})",
            statements.table_name, self.flush_mode, self.save_mode
        );
        Ok(SessionRepository {
            executor,
            transactions,
            converter: self.converter,
            lob_handler: self.lob_handler,
            statements,
            flush_mode: self.flush_mode,
            save_mode: self.save_mode,
            default_max_inactive_interval: self.default_max_inactive_interval,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
