//! Statement batching for attribute changes.
//!
//! All changes handed to the builder share one kind and therefore one SQL
//! template. One change becomes a single statement; two or more become one
//! batch with a parameter set per change.
//!
//! Bindings follow the default templates:
//!
//! | Kind    | Parameters                                    |
//! |---------|-----------------------------------------------|
//! | Added   | primary key, attribute name, payload          |
//! | Updated | payload, primary key, attribute name          |
//! | Removed | primary key, attribute name                   |

use sqlsession_types::{AttributeChange, ChangeKind, PrimaryKey};

use crate::convert::ValueConverter;
use crate::error::{StoreError, StoreResult};
use crate::lob::LobHandler;
use crate::sql::{SqlExecutor, SqlValue};

/// A ready-to-run statement or batch.
#[derive(Clone, Debug, PartialEq)]
pub enum StatementPlan {
    Single {
        sql: String,
        params: Vec<SqlValue>,
    },
    Batch {
        sql: String,
        params: Vec<Vec<SqlValue>>,
    },
}

impl StatementPlan {
    pub fn sql(&self) -> &str {
        match self {
            StatementPlan::Single { sql, .. } | StatementPlan::Batch { sql, .. } => sql,
        }
    }

    /// Number of parameter sets: 1 for a single statement.
    pub fn batch_size(&self) -> usize {
        match self {
            StatementPlan::Single { .. } => 1,
            StatementPlan::Batch { params, .. } => params.len(),
        }
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, StatementPlan::Batch { .. })
    }

    /// Run the plan, returning total rows affected.
    pub fn execute(&self, executor: &dyn SqlExecutor) -> StoreResult<usize> {
        match self {
            StatementPlan::Single { sql, params } => executor.execute(sql, params),
            StatementPlan::Batch { sql, params } => {
                Ok(executor.execute_batch(sql, params)?.into_iter().sum())
            }
        }
    }
}

/// Builds attribute statements with the repository's converter and LOB handler.
pub struct StatementBatchBuilder<'a> {
    converter: &'a dyn ValueConverter,
    lob_handler: &'a dyn LobHandler,
}

impl<'a> StatementBatchBuilder<'a> {
    pub fn new(converter: &'a dyn ValueConverter, lob_handler: &'a dyn LobHandler) -> Self {
        Self {
            converter,
            lob_handler,
        }
    }

    /// Plan the statements for `changes`, all of which must be of `kind`.
    ///
    /// Returns `None` when there is nothing to write.
    pub fn build(
        &self,
        sql: &str,
        kind: ChangeKind,
        primary_key: PrimaryKey,
        changes: &[AttributeChange],
    ) -> StoreResult<Option<StatementPlan>> {
        let mut rows = changes
            .iter()
            .map(|change| self.bind(kind, primary_key, change))
            .collect::<StoreResult<Vec<_>>>()?;

        let plan = match rows.len() {
            0 => None,
            1 => rows.pop().map(|params| StatementPlan::Single {
                sql: sql.to_string(),
                params,
            }),
            _ => Some(StatementPlan::Batch {
                sql: sql.to_string(),
                params: rows,
            }),
        };
        Ok(plan)
    }

    fn bind(
        &self,
        kind: ChangeKind,
        primary_key: PrimaryKey,
        change: &AttributeChange,
    ) -> StoreResult<Vec<SqlValue>> {
        if change.kind() != kind {
            return Err(StoreError::storage(format!(
                "attribute '{}' is {:?}, expected {:?}",
                change.name(),
                change.kind(),
                kind
            )));
        }

        let pk = SqlValue::Text(primary_key.to_string());
        let name = SqlValue::Text(change.name().to_string());

        let params = match change {
            AttributeChange::Added(_, value) => vec![pk, name, self.payload(value)?],
            AttributeChange::Updated(_, value) => vec![self.payload(value)?, pk, name],
            AttributeChange::Removed(_) => vec![pk, name],
        };
        Ok(params)
    }

    fn payload(&self, value: &serde_json::Value) -> StoreResult<SqlValue> {
        let bytes = self.converter.serialize(value)?;
        self.lob_handler.to_sql(bytes)
    }
}
