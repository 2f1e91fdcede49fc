//! Scripted executor for tests
//!
//! `MockExecutor` records every statement it receives and answers from a
//! queue of scripted responses, so `Query` behaviour can be exercised
//! without a database. Enabled in this crate's tests and by the `mock`
//! feature.

use crate::executor::{CountGuard, QueryError, QueryExecutor};
use crate::table::TabularResult;
use may_postgres::types::ToSql;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One scripted answer, consumed in order.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Count(u64),
    Table(TabularResult),
    Error(String),
}

/// What happened to a guarded statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    Committed,
    RolledBack,
}

#[derive(Debug, Default, Clone)]
pub struct MockExecutor {
    captured_sql: Arc<Mutex<Vec<String>>>,
    captured_param_counts: Arc<Mutex<Vec<usize>>>,
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    outcomes: Arc<Mutex<Vec<GuardOutcome>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an affected-row count.
    pub fn with_count(self, count: u64) -> Self {
        self.push(MockResponse::Count(count));
        self
    }

    /// Queue a query result.
    pub fn with_table(self, table: TabularResult) -> Self {
        self.push(MockResponse::Table(table));
        self
    }

    /// Queue a data-source failure.
    pub fn with_error(self, message: impl Into<String>) -> Self {
        self.push(MockResponse::Error(message.into()));
        self
    }

    pub fn push(&self, response: MockResponse) {
        lock(&self.responses).push_back(response);
    }

    pub fn captured_sql(&self) -> Vec<String> {
        lock(&self.captured_sql).clone()
    }

    pub fn captured_param_counts(&self) -> Vec<usize> {
        lock(&self.captured_param_counts).clone()
    }

    pub fn outcomes(&self) -> Vec<GuardOutcome> {
        lock(&self.outcomes).clone()
    }

    /// Scripted responses not yet consumed.
    pub fn pending(&self) -> usize {
        lock(&self.responses).len()
    }

    pub fn clear(&self) {
        lock(&self.captured_sql).clear();
        lock(&self.captured_param_counts).clear();
        lock(&self.responses).clear();
        lock(&self.outcomes).clear();
    }

    fn next_response(&self, sql: &str, params: &[&dyn ToSql]) -> Result<MockResponse, QueryError> {
        lock(&self.captured_sql).push(sql.to_string());
        lock(&self.captured_param_counts).push(params.len());
        lock(&self.responses)
            .pop_front()
            .ok_or_else(|| QueryError::DataSource(format!("MockExecutor: no response scripted for {sql}")))
    }
}

impl QueryExecutor for MockExecutor {
    fn execute_for_count(&self, sql: &str, params: &[&dyn ToSql]) -> Result<u64, QueryError> {
        match self.next_response(sql, params)? {
            MockResponse::Count(count) => Ok(count),
            MockResponse::Table(_) => Err(QueryError::DataSource(
                "MockExecutor: expected a count, a table was scripted".to_string(),
            )),
            MockResponse::Error(message) => Err(QueryError::DataSource(message)),
        }
    }

    fn execute_for_table(
        &self,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> Result<TabularResult, QueryError> {
        match self.next_response(sql, params)? {
            MockResponse::Table(table) => Ok(table),
            MockResponse::Count(_) => Err(QueryError::DataSource(
                "MockExecutor: expected a table, a count was scripted".to_string(),
            )),
            MockResponse::Error(message) => Err(QueryError::DataSource(message)),
        }
    }

    fn execute_guarded(
        &self,
        sql: &str,
        params: &[&dyn ToSql],
        accept: CountGuard<'_>,
    ) -> Result<u64, QueryError> {
        let count = self.execute_for_count(sql, params)?;
        match accept(count) {
            Ok(()) => {
                lock(&self.outcomes).push(GuardOutcome::Committed);
                Ok(count)
            }
            Err(violation) => {
                lock(&self.outcomes).push(GuardOutcome::RolledBack);
                Err(violation.into())
            }
        }
    }
}
