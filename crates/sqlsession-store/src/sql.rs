//! SQL execution and transaction capabilities.
//!
//! The repository only ever talks to storage through these two traits, so
//! it can run against SQLite, another driver, or a recording mock in tests.

use crate::error::{StoreError, StoreResult};

/// A bound parameter or a result column.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<u64> for SqlValue {
    fn from(v: u64) -> Self {
        // Clamp; a saturated expiry time still sorts after every real timestamp
        SqlValue::Integer(v.min(i64::MAX as u64) as i64)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Blob(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// One result row, columns in select order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SqlRow(pub Vec<SqlValue>);

impl SqlRow {
    pub fn new(values: Vec<SqlValue>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn value(&self, idx: usize) -> StoreResult<&SqlValue> {
        self.0
            .get(idx)
            .ok_or_else(|| StoreError::invalid_row(format!("missing column {idx}")))
    }

    pub fn i64(&self, idx: usize) -> StoreResult<i64> {
        self.value(idx)?
            .as_i64()
            .ok_or_else(|| StoreError::invalid_row(format!("column {idx} is not an integer")))
    }

    pub fn text(&self, idx: usize) -> StoreResult<&str> {
        self.value(idx)?
            .as_str()
            .ok_or_else(|| StoreError::invalid_row(format!("column {idx} is not text")))
    }

    pub fn opt_text(&self, idx: usize) -> StoreResult<Option<&str>> {
        match self.value(idx)? {
            SqlValue::Null => Ok(None),
            SqlValue::Text(s) => Ok(Some(s)),
            _ => Err(StoreError::invalid_row(format!("column {idx} is not text"))),
        }
    }
}

/// Runs SQL against a store. Implementations must not translate errors.
pub trait SqlExecutor: Send + Sync {
    /// Execute one statement, returning the number of rows affected.
    fn execute(&self, sql: &str, params: &[SqlValue]) -> StoreResult<usize>;

    /// Execute one statement once per parameter set.
    fn execute_batch(&self, sql: &str, batch: &[Vec<SqlValue>]) -> StoreResult<Vec<usize>>;

    /// Run a query and return every row.
    fn query(&self, sql: &str, params: &[SqlValue]) -> StoreResult<Vec<SqlRow>>;
}

/// Runs a body inside a transaction: commit on `Ok`, roll back on `Err`.
pub trait TransactionScope: Send + Sync {
    fn run(&self, body: &mut dyn FnMut() -> StoreResult<()>) -> StoreResult<()>;
}

/// Runs the body directly; each statement commits on its own.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoTransaction;

impl TransactionScope for NoTransaction {
    fn run(&self, body: &mut dyn FnMut() -> StoreResult<()>) -> StoreResult<()> {
        body()
    }
}

/// Run `f` inside `scope` and hand back its value.
pub fn in_transaction<T>(
    scope: &dyn TransactionScope,
    mut f: impl FnMut() -> StoreResult<T>,
) -> StoreResult<T> {
    let mut out = None;
    scope.run(&mut || {
        out = Some(f()?);
        Ok(())
    })?;
    out.ok_or_else(|| StoreError::storage("transaction body did not run"))
}
