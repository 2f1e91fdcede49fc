//! Tabular results: ordered rows of named, typed columns.
//!
//! A [`TabularResult`] owns its column list once and shares it with every
//! [`Row`], so every row has the same columns in the same order.

use crate::schema::Bindable;
use crate::value::{Value, ValueKind};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Errors raised while assembling a [`TabularResult`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    /// Two columns share a name (compared case-insensitively)
    DuplicateColumn(String),
    /// A row carries a different number of values than there are columns
    ArityMismatch { expected: usize, actual: usize },
    /// A value does not match its column's declared kind
    KindMismatch {
        column: String,
        declared: ValueKind,
        actual: &'static str,
    },
    /// The column declares a member-only kind
    InvalidColumnKind { column: String, kind: ValueKind },
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableError::DuplicateColumn(name) => write!(f, "Duplicate column: {name}"),
            TableError::ArityMismatch { expected, actual } => {
                write!(f, "Row has {actual} values, expected {expected}")
            }
            TableError::KindMismatch {
                column,
                declared,
                actual,
            } => write!(
                f,
                "Value for column {column} is {actual}, column is declared {declared}"
            ),
            TableError::InvalidColumnKind { column, kind } => {
                write!(f, "Column {column} cannot declare kind {kind}")
            }
        }
    }
}

impl std::error::Error for TableError {}

/// Name and declared kind of one result column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Column {
    name: String,
    kind: ValueKind,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }
}

/// One row of a [`TabularResult`].
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[Column]>,
    values: Vec<Value>,
}

impl Row {
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Value of the column named `name` (exact match).
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .map(|i| &self.values[i])
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// An ordered sequence of rows sharing one column list.
#[derive(Debug, Clone, PartialEq)]
pub struct TabularResult {
    columns: Arc<[Column]>,
    rows: Vec<Row>,
}

impl TabularResult {
    /// Create an empty result with the given columns.
    ///
    /// # Errors
    ///
    /// Returns `TableError` if two columns share a name or a column declares
    /// [`ValueKind::Enum`].
    pub fn new(columns: Vec<Column>) -> Result<Self, TableError> {
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !column.kind.is_column_kind() {
                return Err(TableError::InvalidColumnKind {
                    column: column.name.clone(),
                    kind: column.kind,
                });
            }
            if !seen.insert(column.name.to_lowercase()) {
                return Err(TableError::DuplicateColumn(column.name.clone()));
            }
        }
        Ok(Self {
            columns: columns.into(),
            rows: Vec::new(),
        })
    }

    /// Append a row. Each value must be `NULL` or of its column's kind.
    ///
    /// # Errors
    ///
    /// Returns `TableError` on a wrong value count or a kind mismatch.
    pub fn push_row(&mut self, values: Vec<Value>) -> Result<(), TableError> {
        if values.len() != self.columns.len() {
            return Err(TableError::ArityMismatch {
                expected: self.columns.len(),
                actual: values.len(),
            });
        }
        for (column, value) in self.columns.iter().zip(&values) {
            if let Some(kind) = value.kind() {
                if kind != column.kind {
                    return Err(TableError::KindMismatch {
                        column: column.name.clone(),
                        declared: column.kind,
                        actual: value.type_name(),
                    });
                }
            }
        }
        self.rows.push(Row {
            columns: Arc::clone(&self.columns),
            values,
        });
        Ok(())
    }

    /// Builder-style [`push_row`](Self::push_row).
    ///
    /// # Errors
    ///
    /// Same as [`push_row`](Self::push_row).
    pub fn with_row(mut self, values: Vec<Value>) -> Result<Self, TableError> {
        self.push_row(values)?;
        Ok(self)
    }

    /// Write instances out as rows, one column per bindable member.
    ///
    /// # Errors
    ///
    /// Returns `TableError` if two members share a name case-insensitively.
    pub fn from_instances<T: Bindable>(instances: &[T]) -> Result<Self, TableError> {
        let columns = T::members()
            .into_iter()
            .map(|m| Column::new(m.name(), m.kind().column_kind()))
            .collect();
        let mut table = Self::new(columns)?;
        for instance in instances {
            table.push_row(instance.member_values())?;
        }
        Ok(table)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> TabularResult {
        TabularResult::new(vec![
            Column::new("id", ValueKind::BigInt),
            Column::new("name", ValueKind::Text),
        ])
        .unwrap()
    }

    #[test]
    fn test_push_and_read_rows() {
        let table = people()
            .with_row(vec![Value::BigInt(1), Value::Text("Ada".into())])
            .unwrap()
            .with_row(vec![Value::BigInt(2), Value::Null])
            .unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows()[0].get("name"), Some(&Value::Text("Ada".into())));
        assert_eq!(table.rows()[1].get("name"), Some(&Value::Null));
        assert_eq!(table.rows()[1].get("missing"), None);
        assert_eq!(table.rows()[1].columns(), table.columns());
    }

    #[test]
    fn test_duplicate_column_names_rejected() {
        let err = TabularResult::new(vec![
            Column::new("Id", ValueKind::Int),
            Column::new("id", ValueKind::Int),
        ])
        .unwrap_err();
        assert_eq!(err, TableError::DuplicateColumn("id".into()));
    }

    #[test]
    fn test_enum_column_rejected() {
        let err = TabularResult::new(vec![Column::new("state", ValueKind::Enum)]).unwrap_err();
        assert!(matches!(err, TableError::InvalidColumnKind { .. }));
    }

    #[test]
    fn test_arity_checked() {
        let err = people().with_row(vec![Value::BigInt(1)]).unwrap_err();
        assert_eq!(
            err,
            TableError::ArityMismatch {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_value_kind_checked() {
        let err = people()
            .with_row(vec![Value::Int(1), Value::Text("x".into())])
            .unwrap_err();
        assert_eq!(
            err,
            TableError::KindMismatch {
                column: "id".into(),
                declared: ValueKind::BigInt,
                actual: "int",
            }
        );
        assert!(err.to_string().contains("declared bigint"));
    }

    #[test]
    fn test_empty_table() {
        let table = people();
        assert!(table.is_empty());
        assert_eq!(table.columns().len(), 2);
        assert!(table.into_rows().is_empty());
    }
}
