//! Recording executor for repository unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::error::{StoreError, StoreResult};
use crate::sql::{SqlExecutor, SqlRow, SqlValue, TransactionScope};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallKind {
    Execute,
    Batch,
    Query,
}

#[derive(Clone, Debug)]
pub struct Call {
    pub kind: CallKind,
    pub sql: String,
    pub params: Vec<Vec<SqlValue>>,
}

impl Call {
    pub fn batch_size(&self) -> usize {
        self.params.len()
    }
}

/// Records every statement and answers queries with canned rows.
#[derive(Default)]
pub struct RecordingExecutor {
    calls: Mutex<Vec<Call>>,
    rows: Mutex<Vec<SqlRow>>,
    rows_affected: AtomicUsize,
    fail: Mutex<Option<String>>,
}

impl RecordingExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_rows(&self, rows: Vec<SqlRow>) {
        *self.rows.lock() = rows;
    }

    pub fn set_rows_affected(&self, n: usize) {
        self.rows_affected.store(n, Ordering::SeqCst);
    }

    pub fn fail_with(&self, msg: &str) {
        *self.fail.lock() = Some(msg.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Calls whose SQL is exactly `sql`.
    pub fn calls_for(&self, sql: &str) -> Vec<Call> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.sql == sql)
            .cloned()
            .collect()
    }

    pub fn reset(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, kind: CallKind, sql: &str, params: Vec<Vec<SqlValue>>) -> StoreResult<()> {
        self.calls.lock().push(Call {
            kind,
            sql: sql.to_string(),
            params,
        });
        match self.fail.lock().as_ref() {
            Some(msg) => Err(StoreError::storage(msg.clone())),
            None => Ok(()),
        }
    }
}

impl SqlExecutor for RecordingExecutor {
    fn execute(&self, sql: &str, params: &[SqlValue]) -> StoreResult<usize> {
        self.record(CallKind::Execute, sql, vec![params.to_vec()])?;
        Ok(self.rows_affected.load(Ordering::SeqCst))
    }

    fn execute_batch(&self, sql: &str, batch: &[Vec<SqlValue>]) -> StoreResult<Vec<usize>> {
        self.record(CallKind::Batch, sql, batch.to_vec())?;
        Ok(vec![1; batch.len()])
    }

    fn query(&self, sql: &str, params: &[SqlValue]) -> StoreResult<Vec<SqlRow>> {
        self.record(CallKind::Query, sql, vec![params.to_vec()])?;
        Ok(self.rows.lock().clone())
    }
}

/// Counts transaction boundaries and runs the body directly.
#[derive(Default)]
pub struct CountingTransactions {
    runs: AtomicUsize,
}

impl CountingTransactions {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl TransactionScope for CountingTransactions {
    fn run(&self, body: &mut dyn FnMut() -> StoreResult<()>) -> StoreResult<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        body()
    }
}
