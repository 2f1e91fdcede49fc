//! Turning a checked [`TabularResult`] into a lazy sequence of instances.
//!
//! The cardinality check runs eagerly over the whole result; binding then
//! happens one row per [`Iterator::next`] call. The first strict-mode
//! failure is yielded once and ends the sequence. Instances already
//! handed out stay valid.

use crate::binding::{bind_row, BindOptions, BindingError, BindingMode, BindingPlan};
use crate::cardinality::{CardinalityError, CardinalityPolicy};
use crate::executor::QueryError;
use crate::schema::Bindable;
use crate::table::{Row, TabularResult};
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::sync::Arc;

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Single-pass, forward-only sequence of bound instances.
///
/// Yields `Ok(T)` per row; after an `Err` it yields nothing more.
#[derive(Debug)]
pub struct Materialized<T> {
    rows: std::vec::IntoIter<Row>,
    plan: Arc<BindingPlan>,
    mode: BindingMode,
    failed: bool,
    _target: PhantomData<fn() -> T>,
}

impl<T: Bindable> Materialized<T> {
    fn new(table: TabularResult, plan: Arc<BindingPlan>, mode: BindingMode) -> Self {
        Self {
            rows: table.into_rows().into_iter(),
            plan,
            mode,
            failed: false,
            _target: PhantomData,
        }
    }

    /// Rows not yet bound.
    pub fn remaining(&self) -> usize {
        if self.failed {
            0
        } else {
            self.rows.len()
        }
    }

    pub fn mode(&self) -> BindingMode {
        self.mode
    }

    /// Bind every remaining row.
    ///
    /// # Errors
    ///
    /// Returns the first `BindingError` met.
    pub fn into_vec(self) -> Result<Vec<T>, BindingError> {
        self.collect()
    }
}

impl<T: Bindable> Iterator for Materialized<T> {
    type Item = Result<T, BindingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let row = self.rows.next()?;
        match bind_row(row, &self.plan, self.mode) {
            Ok(instance) => {
                #[cfg(feature = "metrics")]
                METRICS.record_rows_bound(1);
                Some(Ok(instance))
            }
            Err(e) => {
                #[cfg(feature = "metrics")]
                METRICS.record_binding_failure();
                log::debug!("binding into {} stopped: {e}", self.plan.type_name());
                self.failed = true;
                Some(Err(e))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            (0, Some(0))
        } else {
            let remaining = self.rows.len();
            // A strict failure may cut the sequence short.
            let lower = if self.mode == BindingMode::Safe { remaining } else { 0 };
            (lower.min(remaining), Some(remaining))
        }
    }
}

impl<T: Bindable> FusedIterator for Materialized<T> {}

/// Prepare `table` for binding into `T` without a row-count check.
///
/// The descriptor and plan are resolved here, so a type with no members
/// fails before any row is touched.
///
/// # Errors
///
/// Returns [`BindingError::NoBindableMembers`] if `T` has no members.
pub fn bind_all<T: Bindable>(
    table: TabularResult,
    options: BindOptions,
) -> Result<Materialized<T>, BindingError> {
    let plan = BindingPlan::for_type::<T>(table.columns(), options.matching)?;
    Ok(Materialized::new(table, plan, options.mode))
}

/// Check the row count of `table`, then prepare it for binding into `T`.
///
/// # Errors
///
/// Returns `QueryError::Cardinality` when the row count violates `policy`
/// (no row is bound), or `QueryError::Binding` if `T` has no members.
pub fn materialize<T: Bindable>(
    table: TabularResult,
    policy: CardinalityPolicy,
    options: BindOptions,
) -> Result<Materialized<T>, QueryError> {
    #[cfg(feature = "tracing")]
    let _span = tracing_helpers::materialize_span(T::type_name(), table.row_count()).entered();

    let table = materialize_table(table, policy)?;
    Ok(bind_all(table, options)?)
}

/// Check the row count of `table` and hand it back unchanged.
///
/// # Errors
///
/// Returns `CardinalityError` when the row count violates `policy`.
pub fn materialize_table(
    table: TabularResult,
    policy: CardinalityPolicy,
) -> Result<TabularResult, CardinalityError> {
    policy.check(table.row_count() as u64).map_err(|e| {
        #[cfg(feature = "metrics")]
        METRICS.record_cardinality_violation();
        e
    })?;
    Ok(table)
}
