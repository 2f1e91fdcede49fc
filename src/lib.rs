//! # QuickQuery
//!
//! Row-count contracts and typed result binding for PostgreSQL on the `may`
//! coroutine runtime.
//!
//! A [`Query`] runs statements through a [`QueryExecutor`], rejects results
//! whose row count breaks the requested [`CardinalityPolicy`], and binds
//! rows into any `#[derive(Bindable)]` type in strict or safe
//! [`BindingMode`].

// Lets derive output (`::quickquery::...`) resolve inside this crate.
extern crate self as quickquery;

pub mod binding;
pub mod cardinality;
pub mod config;
pub mod connection;
pub mod executor;
pub mod materialize;
pub mod metrics;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod query;
pub mod schema;
pub mod table;
pub mod transaction;
pub mod type_mapping;
pub mod value;

pub use binding::{bind_row, build_plan, BindOptions, BindingError, BindingMode, BindingPlan, NameMatching};
pub use cardinality::{ensure_cardinality, CardinalityError, CardinalityKind, CardinalityPolicy};
pub use config::{binding_defaults, install_binding_defaults, Settings};
pub use connection::{connect, connect_with_settings, ConnectionError};
pub use executor::{PostgresExecutor, QueryError, QueryExecutor};
pub use materialize::{bind_all, materialize, materialize_table, Materialized};
pub use query::{LifecycleState, Query};
pub use schema::{Bindable, MemberDescriptor, TypeDescriptor};
pub use table::{Column, Row, TableError, TabularResult};
pub use transaction::{IsolationLevel, Transaction, TransactionError};
pub use value::{convert, Conversion, FieldValue, Value, ValueKind};

pub use quickquery_derive::{BindEnum, Bindable};

