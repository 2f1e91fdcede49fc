//! Transaction Module
//!
//! Transactions back guarded statements: a counted change runs inside one
//! and is rolled back when its affected-row count breaks the contract.

use may_postgres::{Client, Error as PostgresError};
use std::fmt;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Transaction isolation level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    /// Read uncommitted (PostgreSQL treats it as ReadCommitted)
    ReadUncommitted,
    /// Read committed (default)
    #[default]
    ReadCommitted,
    /// Repeatable read
    RepeatableRead,
    /// Serializable
    Serializable,
}

impl IsolationLevel {
    /// Convert to PostgreSQL SQL syntax
    fn to_sql(self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }

    fn begin_sql(self) -> String {
        format!("BEGIN ISOLATION LEVEL {}", self.to_sql())
    }
}

/// Transaction error type
#[derive(Debug)]
pub enum TransactionError {
    /// PostgreSQL error from may_postgres
    PostgresError(PostgresError),
    /// Transaction already committed or rolled back
    TransactionClosed,
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionError::PostgresError(e) => {
                write!(f, "PostgreSQL error: {}", e)
            }
            TransactionError::TransactionClosed => {
                write!(f, "Transaction has already been committed or rolled back")
            }
        }
    }
}

impl std::error::Error for TransactionError {}

impl From<PostgresError> for TransactionError {
    fn from(err: PostgresError) -> Self {
        TransactionError::PostgresError(err)
    }
}

/// A database transaction
///
/// Dropping an open transaction rolls it back.
pub struct Transaction {
    client: Client,
    closed: bool,
}

impl Transaction {
    /// Begin a transaction on `client`
    pub(crate) fn begin(client: Client, isolation_level: IsolationLevel) -> Result<Self, TransactionError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::begin_transaction_span().entered();

        client
            .execute(isolation_level.begin_sql().as_str(), &[])
            .map_err(TransactionError::from)?;

        Ok(Self {
            client,
            closed: false,
        })
    }

    /// Commit the transaction
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction has already been committed or rolled back.
    pub fn commit(mut self) -> Result<(), TransactionError> {
        self.finish("COMMIT")
    }

    /// Rollback the transaction
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction has already been committed or rolled back.
    pub fn rollback(mut self) -> Result<(), TransactionError> {
        self.finish("ROLLBACK")
    }

    fn finish(&mut self, sql: &str) -> Result<(), TransactionError> {
        if self.closed {
            return Err(TransactionError::TransactionClosed);
        }

        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::finish_transaction_span(sql).entered();

        self.closed = true;
        self.client
            .execute(sql, &[])
            .map_err(TransactionError::from)?;
        Ok(())
    }

    /// Get a reference to the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Check if the transaction is closed
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.finish("ROLLBACK") {
                log::warn!("rollback of abandoned transaction failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolation_level_to_sql() {
        assert_eq!(IsolationLevel::ReadUncommitted.to_sql(), "READ UNCOMMITTED");
        assert_eq!(IsolationLevel::ReadCommitted.to_sql(), "READ COMMITTED");
        assert_eq!(IsolationLevel::RepeatableRead.to_sql(), "REPEATABLE READ");
        assert_eq!(IsolationLevel::Serializable.to_sql(), "SERIALIZABLE");
    }

    #[test]
    fn test_begin_sql_carries_isolation() {
        assert_eq!(
            IsolationLevel::Serializable.begin_sql(),
            "BEGIN ISOLATION LEVEL SERIALIZABLE"
        );
        assert_eq!(IsolationLevel::default(), IsolationLevel::ReadCommitted);
    }

    #[test]
    fn test_transaction_error_display() {
        let err = TransactionError::TransactionClosed;
        assert!(err
            .to_string()
            .contains("Transaction has already been committed"));
    }
}
