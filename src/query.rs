//! The `Query` entry point.
//!
//! `Query` owns an executor and exposes every way of running a statement:
//! without a result (`no_return`, `change_*`), with a raw result
//! (`select*`, `fetch`) and bound into a type (`select*_as`, `fetch_as`).
//! Each comes in a fixed-cardinality flavour and a general one taking a
//! [`CardinalityPolicy`].
//!
//! A disposed `Query` refuses every call with [`QueryError::Disposed`]
//! before the executor is touched.

use crate::binding::BindOptions;
use crate::cardinality::{ensure_cardinality, CardinalityPolicy};
use crate::executor::{QueryError, QueryExecutor};
use crate::materialize::{materialize, materialize_table, Materialized};
use crate::schema::Bindable;
use crate::table::TabularResult;
use may_postgres::types::ToSql;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;

/// Lifecycle of a [`Query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Open,
    Disposed,
}

/// Runs statements through an executor and enforces row-count contracts.
///
/// # Examples
///
/// ```no_run
/// use quickquery::{connect, Bindable, PostgresExecutor, Query, QueryError};
///
/// #[derive(Debug, Default, Bindable)]
/// struct User {
///     id: i64,
///     name: String,
/// }
///
/// # fn main() -> Result<(), QueryError> {
/// let query = Query::new(PostgresExecutor::new(connect("host=localhost user=postgres")?));
///
/// let user = query
///     .select_exactly_as::<User>(1, "SELECT id, name FROM users WHERE id = $1", &[&7i64])?
///     .next();
/// query.change_exactly(1, "DELETE FROM users WHERE id = $1", &[&7i64])?;
/// # let _ = user;
/// # Ok(())
/// # }
/// ```
pub struct Query<E> {
    executor: E,
    options: BindOptions,
    disposed: AtomicBool,
}

impl<E: QueryExecutor> Query<E> {
    /// Create a query using the process-wide binding defaults.
    pub fn new(executor: E) -> Self {
        Self::with_options(executor, BindOptions::default())
    }

    pub fn with_options(executor: E, options: BindOptions) -> Self {
        Self {
            executor,
            options,
            disposed: AtomicBool::new(false),
        }
    }

    /// Binding options used by the typed calls other than [`Query::fetch_as`].
    pub fn options(&self) -> BindOptions {
        self.options
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn state(&self) -> LifecycleState {
        if self.disposed.load(Ordering::Acquire) {
            LifecycleState::Disposed
        } else {
            LifecycleState::Open
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.state() == LifecycleState::Disposed
    }

    /// Refuse all further calls. Calling it again has no effect.
    pub fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::AcqRel) {
            log::debug!("query disposed");
        }
    }

    fn ensure_open(&self) -> Result<(), QueryError> {
        match self.state() {
            LifecycleState::Open => Ok(()),
            LifecycleState::Disposed => Err(QueryError::Disposed),
        }
    }

    // Statements without a result

    /// Execute a statement and return the affected-row count, unchecked.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Disposed` or the executor's error.
    pub fn no_return(&self, sql: &str, params: &[&dyn ToSql]) -> Result<u64, QueryError> {
        self.change(CardinalityPolicy::Unbounded, sql, params)
    }

    /// Execute a statement that must affect exactly `n` rows.
    ///
    /// # Errors
    ///
    /// See [`Query::change`].
    pub fn change_exactly(&self, n: u64, sql: &str, params: &[&dyn ToSql]) -> Result<u64, QueryError> {
        self.change(CardinalityPolicy::Exactly(n), sql, params)
    }

    /// Execute a statement that may affect at most `n` rows.
    ///
    /// # Errors
    ///
    /// See [`Query::change`].
    pub fn change_no_more_than(
        &self,
        n: u64,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> Result<u64, QueryError> {
        self.change(CardinalityPolicy::AtMost(n), sql, params)
    }

    /// Execute a statement that must affect at least `n` rows.
    ///
    /// # Errors
    ///
    /// See [`Query::change`].
    pub fn change_no_less_than(
        &self,
        n: u64,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> Result<u64, QueryError> {
        self.change(CardinalityPolicy::AtLeast(n), sql, params)
    }

    /// Execute a statement whose affected-row count must satisfy `policy`.
    ///
    /// A bounded policy runs through [`QueryExecutor::execute_guarded`], so a
    /// violating change is not kept by executors that can undo it.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Disposed`, `QueryError::Cardinality` on a
    /// violation, or the executor's error unchanged.
    pub fn change(
        &self,
        policy: CardinalityPolicy,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> Result<u64, QueryError> {
        self.ensure_open()?;
        if policy == CardinalityPolicy::Unbounded {
            return self.executor.execute_for_count(sql, params);
        }

        let accept = move |count: u64| {
            ensure_cardinality(policy, count).map_err(|e| {
                #[cfg(feature = "metrics")]
                METRICS.record_cardinality_violation();
                log::debug!("{e} for: {sql}");
                e
            })
        };
        self.executor.execute_guarded(sql, params, &accept)
    }

    // Raw results

    /// Run a query and return every row.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Disposed` or the executor's error.
    pub fn select(&self, sql: &str, params: &[&dyn ToSql]) -> Result<TabularResult, QueryError> {
        self.fetch(CardinalityPolicy::Unbounded, sql, params)
    }

    /// Run a query that must return exactly `n` rows.
    ///
    /// # Errors
    ///
    /// See [`Query::fetch`].
    pub fn select_exactly(
        &self,
        n: u64,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> Result<TabularResult, QueryError> {
        self.fetch(CardinalityPolicy::Exactly(n), sql, params)
    }

    /// Run a query that may return at most `n` rows.
    ///
    /// # Errors
    ///
    /// See [`Query::fetch`].
    pub fn select_no_more_than(
        &self,
        n: u64,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> Result<TabularResult, QueryError> {
        self.fetch(CardinalityPolicy::AtMost(n), sql, params)
    }

    /// Run a query that must return at least `n` rows.
    ///
    /// # Errors
    ///
    /// See [`Query::fetch`].
    pub fn select_no_less_than(
        &self,
        n: u64,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> Result<TabularResult, QueryError> {
        self.fetch(CardinalityPolicy::AtLeast(n), sql, params)
    }

    /// Run a query and check its row count against `policy`.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Disposed`, `QueryError::Cardinality` on a
    /// violation, or the executor's error unchanged.
    pub fn fetch(
        &self,
        policy: CardinalityPolicy,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> Result<TabularResult, QueryError> {
        self.ensure_open()?;
        let table = self.executor.execute_for_table(sql, params)?;
        Ok(materialize_table(table, policy)?)
    }

    // Typed results

    /// Run a query and bind every row into `T`.
    ///
    /// # Errors
    ///
    /// See [`Query::fetch_as`].
    pub fn select_as<T: Bindable>(
        &self,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> Result<Materialized<T>, QueryError> {
        self.fetch_as(CardinalityPolicy::Unbounded, self.options, sql, params)
    }

    /// Run a query that must return exactly `n` rows and bind them into `T`.
    ///
    /// # Errors
    ///
    /// See [`Query::fetch_as`].
    pub fn select_exactly_as<T: Bindable>(
        &self,
        n: u64,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> Result<Materialized<T>, QueryError> {
        self.fetch_as(CardinalityPolicy::Exactly(n), self.options, sql, params)
    }

    /// Run a query that may return at most `n` rows and bind them into `T`.
    ///
    /// # Errors
    ///
    /// See [`Query::fetch_as`].
    pub fn select_no_more_than_as<T: Bindable>(
        &self,
        n: u64,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> Result<Materialized<T>, QueryError> {
        self.fetch_as(CardinalityPolicy::AtMost(n), self.options, sql, params)
    }

    /// Run a query that must return at least `n` rows and bind them into `T`.
    ///
    /// # Errors
    ///
    /// See [`Query::fetch_as`].
    pub fn select_no_less_than_as<T: Bindable>(
        &self,
        n: u64,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> Result<Materialized<T>, QueryError> {
        self.fetch_as(CardinalityPolicy::AtLeast(n), self.options, sql, params)
    }

    /// Run a query, check its row count against `policy` and bind the rows
    /// into `T` lazily with `options`.
    ///
    /// The row count is checked before this returns; binding errors come
    /// out of the returned sequence.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Disposed`, `QueryError::Cardinality`,
    /// `QueryError::Binding` when `T` has no bindable members, or the
    /// executor's error unchanged.
    pub fn fetch_as<T: Bindable>(
        &self,
        policy: CardinalityPolicy,
        options: BindOptions,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> Result<Materialized<T>, QueryError> {
        self.ensure_open()?;
        let table = self.executor.execute_for_table(sql, params)?;
        materialize(table, policy, options)
    }
}

impl<E> std::fmt::Debug for Query<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("options", &self.options)
            .field("disposed", &self.disposed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::BindingError;
    use crate::cardinality::{CardinalityError, CardinalityKind};
    use crate::mock::{GuardOutcome, MockExecutor};
    use crate::schema::MemberDescriptor;
    use crate::table::Column;
    use crate::value::{Value, ValueKind};

    #[derive(Debug, Default, PartialEq)]
    struct Account {
        id: i64,
        owner: String,
        balance: i32,
    }

    impl Bindable for Account {
        fn type_name() -> &'static str {
            "Account"
        }

        fn members() -> Vec<MemberDescriptor> {
            vec![
                MemberDescriptor::new("id", ValueKind::BigInt, false),
                MemberDescriptor::new("owner", ValueKind::Text, false),
                MemberDescriptor::new("balance", ValueKind::Int, false),
            ]
        }

        fn assign(&mut self, member: usize, value: Value) -> Result<(), Value> {
            match (member, value) {
                (0, Value::BigInt(v)) => self.id = v,
                (1, Value::Text(v)) => self.owner = v,
                (2, Value::Int(v)) => self.balance = v,
                (_, other) => return Err(other),
            }
            Ok(())
        }

        fn member_values(&self) -> Vec<Value> {
            vec![
                Value::BigInt(self.id),
                Value::Text(self.owner.clone()),
                Value::Int(self.balance),
            ]
        }
    }

    fn accounts(count: i64) -> TabularResult {
        let rows: Vec<Account> = (1..=count)
            .map(|id| Account {
                id,
                owner: format!("owner-{id}"),
                balance: (id * 10) as i32,
            })
            .collect();
        TabularResult::from_instances(&rows).unwrap()
    }

    fn strict(mock: MockExecutor) -> Query<MockExecutor> {
        Query::with_options(mock, BindOptions::STRICT)
    }

    fn cardinality(err: QueryError) -> CardinalityError {
        match err {
            QueryError::Cardinality(e) => e,
            other => panic!("expected a cardinality error, got {other}"),
        }
    }

    #[test]
    fn test_no_return_passes_count_through() {
        let query = strict(MockExecutor::new().with_count(7));
        assert_eq!(query.no_return("UPDATE accounts SET balance = 0", &[]).unwrap(), 7);
        assert!(query.executor().outcomes().is_empty());
    }

    #[test]
    fn test_change_exactly_commits_on_match() {
        let query = strict(MockExecutor::new().with_count(1));
        let affected = query
            .change_exactly(1, "DELETE FROM accounts WHERE id = $1", &[&1i64])
            .unwrap();
        assert_eq!(affected, 1);
        assert_eq!(query.executor().outcomes(), vec![GuardOutcome::Committed]);
        assert_eq!(query.executor().captured_param_counts(), vec![1]);
    }

    #[test]
    fn test_change_no_more_than_rolls_back_on_violation() {
        let query = strict(MockExecutor::new().with_count(4));
        let err = cardinality(
            query
                .change_no_more_than(3, "UPDATE accounts SET owner = ''", &[])
                .unwrap_err(),
        );
        assert_eq!(err.expected, 3);
        assert_eq!(err.actual, 4);
        assert_eq!(err.kind, CardinalityKind::AtMost);
        assert_eq!(query.executor().outcomes(), vec![GuardOutcome::RolledBack]);
    }

    #[test]
    fn test_change_no_less_than() {
        let query = strict(MockExecutor::new().with_count(0).with_count(2));
        let err = cardinality(query.change_no_less_than(1, "DELETE", &[]).unwrap_err());
        assert_eq!(err.kind, CardinalityKind::AtLeast);
        assert_eq!(query.change_no_less_than(1, "DELETE", &[]).unwrap(), 2);
    }

    #[test]
    fn test_select_exactly_one_with_no_rows() {
        let query = strict(MockExecutor::new().with_table(accounts(0)));
        let err = cardinality(query.select_exactly(1, "SELECT * FROM accounts", &[]).unwrap_err());
        assert_eq!((err.expected, err.actual, err.kind), (1, 0, CardinalityKind::Exact));
    }

    #[test]
    fn test_select_returns_raw_table() {
        let table = accounts(3);
        let query = strict(MockExecutor::new().with_table(table.clone()).with_table(table.clone()));
        assert_eq!(query.select("SELECT * FROM accounts", &[]).unwrap(), table);
        assert_eq!(
            query
                .select_no_less_than(3, "SELECT * FROM accounts", &[])
                .unwrap()
                .row_count(),
            3
        );
    }

    #[test]
    fn test_select_no_more_than_as_binds_all_rows() {
        let query = strict(MockExecutor::new().with_table(accounts(3)));
        let bound: Vec<Account> = query
            .select_no_more_than_as::<Account>(5, "SELECT * FROM accounts", &[])
            .unwrap()
            .into_vec()
            .unwrap();
        assert_eq!(bound.len(), 3);
        assert_eq!(bound[0].owner, "owner-1");
        assert_eq!(bound[2].balance, 30);
    }

    #[test]
    fn test_select_exactly_as_checks_count_before_binding() {
        // The extra column would fail strict binding; the count check wins.
        let table = TabularResult::new(vec![Column::new("unknown", ValueKind::Text)]).unwrap();
        let query = strict(MockExecutor::new().with_table(table));
        let err = query
            .select_exactly_as::<Account>(1, "SELECT 'x' AS unknown WHERE false", &[])
            .unwrap_err();
        assert!(matches!(err, QueryError::Cardinality(_)));
    }

    #[test]
    fn test_fetch_as_uses_explicit_options() {
        let table = TabularResult::new(vec![
            Column::new("id", ValueKind::BigInt),
            Column::new("nickname", ValueKind::Text),
        ])
        .unwrap()
        .with_row(vec![Value::BigInt(9), Value::Text("nine".into())])
        .unwrap();
        let query = strict(MockExecutor::new().with_table(table.clone()).with_table(table));

        let mut strict_rows = query.select_as::<Account>("SELECT", &[]).unwrap();
        assert!(matches!(
            strict_rows.next(),
            Some(Err(BindingError::PropertyNotFound { .. }))
        ));

        let safe: Vec<Account> = query
            .fetch_as::<Account>(CardinalityPolicy::Unbounded, BindOptions::SAFE, "SELECT", &[])
            .unwrap()
            .into_vec()
            .unwrap();
        assert_eq!(
            safe,
            vec![Account {
                id: 9,
                ..Account::default()
            }]
        );
    }

    #[test]
    fn test_select_no_less_than_as() {
        let query = strict(MockExecutor::new().with_table(accounts(1)));
        let err = query
            .select_no_less_than_as::<Account>(2, "SELECT", &[])
            .unwrap_err();
        assert_eq!(cardinality(err).kind, CardinalityKind::AtLeast);
    }

    #[test]
    fn test_data_source_errors_pass_through() {
        let query = strict(MockExecutor::new().with_error("relation does not exist"));
        let err = query.select("SELECT * FROM missing", &[]).unwrap_err();
        assert!(matches!(err, QueryError::DataSource(ref m) if m == "relation does not exist"));
    }

    #[test]
    fn test_disposed_refuses_everything() {
        let query = strict(MockExecutor::new().with_count(1).with_table(accounts(1)));
        assert_eq!(query.state(), LifecycleState::Open);
        query.dispose();
        query.dispose();
        assert!(query.is_disposed());

        assert!(matches!(query.no_return("DELETE", &[]), Err(QueryError::Disposed)));
        assert!(matches!(query.change_exactly(1, "DELETE", &[]), Err(QueryError::Disposed)));
        assert!(matches!(query.select("SELECT", &[]), Err(QueryError::Disposed)));
        assert!(matches!(
            query.fetch(CardinalityPolicy::Exactly(0), "SELECT", &[]),
            Err(QueryError::Disposed)
        ));
        assert!(matches!(
            query.select_exactly_as::<Account>(1, "SELECT", &[]),
            Err(QueryError::Disposed)
        ));
        // Nothing reached the executor.
        assert!(query.executor().captured_sql().is_empty());
        assert_eq!(query.executor().pending(), 2);
    }
}
