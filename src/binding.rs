//! Binding rows into typed instances.
//!
//! A [`BindingPlan`] pairs a result's columns with a type's members once;
//! [`bind_row`] then applies it to each row. In [`BindingMode::Strict`] an
//! unmapped column or an unconvertible value is an error. In
//! [`BindingMode::Safe`] unmapped columns are ignored and unconvertible
//! values leave the member at its default, so every row yields an instance.

use crate::schema::{Bindable, TypeDescriptor};
use crate::table::{Column, Row};
use crate::value::{Conversion, Value, ValueKind};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// How mismatches between a result and a target type are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingMode {
    /// Unmapped columns and type mismatches are errors
    #[default]
    Strict,
    /// Unmapped columns are skipped, mismatches leave the default value
    Safe,
}

/// How column names are compared with member names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameMatching {
    #[default]
    CaseInsensitive,
    CaseSensitive,
}

/// Per-call binding configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub struct BindOptions {
    #[serde(default)]
    pub mode: BindingMode,
    #[serde(default)]
    pub matching: NameMatching,
}

impl BindOptions {
    pub const STRICT: Self = Self {
        mode: BindingMode::Strict,
        matching: NameMatching::CaseInsensitive,
    };

    pub const SAFE: Self = Self {
        mode: BindingMode::Safe,
        matching: NameMatching::CaseInsensitive,
    };

    pub fn with_mode(self, mode: BindingMode) -> Self {
        Self { mode, ..self }
    }

    pub fn with_matching(self, matching: NameMatching) -> Self {
        Self { matching, ..self }
    }
}

/// The process-wide configured options, see [`crate::config::binding_defaults`].
impl Default for BindOptions {
    fn default() -> Self {
        crate::config::binding_defaults()
    }
}

/// Errors raised while binding rows to a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    /// Strict mode: a column has no corresponding member
    PropertyNotFound { column: String },
    /// Strict mode: a column's value cannot become the member's type
    MismatchedType {
        column: String,
        expected: &'static str,
        actual: &'static str,
    },
    /// The target type has no members to bind
    NoBindableMembers { type_name: String },
    /// A row whose columns differ from the ones the plan was built over
    PlanMismatch { type_name: String },
}

impl fmt::Display for BindingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingError::PropertyNotFound { column } => {
                write!(f, "Property not found for column {column}")
            }
            BindingError::MismatchedType {
                column,
                expected,
                actual,
            } => write!(
                f,
                "Mismatched type for column {column}: expected {expected}, got {actual}"
            ),
            BindingError::NoBindableMembers { type_name } => {
                write!(f, "Type {type_name} has no bindable members")
            }
            BindingError::PlanMismatch { type_name } => {
                write!(f, "Row columns do not match the binding plan for {type_name}")
            }
        }
    }
}

impl std::error::Error for BindingError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MemberTarget {
    member: usize,
    kind: ValueKind,
    nullable: bool,
    conversion: Conversion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ColumnBinding {
    name: String,
    kind: ValueKind,
    target: Option<MemberTarget>,
}

/// Column-to-member mapping for one (type, column list) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingPlan {
    type_name: &'static str,
    columns: Vec<ColumnBinding>,
    member_to_column: Vec<Option<usize>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PlanKey {
    type_id: TypeId,
    matching: NameMatching,
    columns: Vec<Column>,
}

static PLANS: Lazy<RwLock<HashMap<PlanKey, Arc<BindingPlan>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

impl BindingPlan {
    /// Pair `columns` with the members of `descriptor`.
    pub fn build(descriptor: &TypeDescriptor, columns: &[Column], matching: NameMatching) -> Self {
        let mut member_to_column = vec![None; descriptor.members().len()];
        let columns = columns
            .iter()
            .enumerate()
            .map(|(index, column)| {
                let target = descriptor
                    .member_index(column.name(), matching)
                    .and_then(|member| descriptor.member(member).map(|m| (member, m)))
                    .map(|(member, m)| {
                        member_to_column[member].get_or_insert(index);
                        MemberTarget {
                            member,
                            kind: m.kind(),
                            nullable: m.is_nullable(),
                            conversion: Conversion::between(column.kind(), m.kind()),
                        }
                    });
                ColumnBinding {
                    name: column.name().to_string(),
                    kind: column.kind(),
                    target,
                }
            })
            .collect();
        Self {
            type_name: descriptor.type_name(),
            columns,
            member_to_column,
        }
    }

    /// Cached plan for `T` over `columns`.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::NoBindableMembers`] if `T` has no members.
    pub fn for_type<T: Bindable>(
        columns: &[Column],
        matching: NameMatching,
    ) -> Result<Arc<Self>, BindingError> {
        let key = PlanKey {
            type_id: TypeId::of::<T>(),
            matching,
            columns: columns.to_vec(),
        };
        if let Some(found) = PLANS
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(Arc::clone(found));
        }

        let descriptor = TypeDescriptor::for_type::<T>()?;
        log::debug!(
            "building binding plan for {} over {} column(s)",
            descriptor.type_name(),
            columns.len()
        );
        let built = Arc::new(Self::build(&descriptor, columns, matching));
        let mut cache = PLANS.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(cache.entry(key).or_insert(built)))
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Member bound to column `column`, if any.
    pub fn member_for_column(&self, column: usize) -> Option<usize> {
        self.columns
            .get(column)
            .and_then(|c| c.target)
            .map(|t| t.member)
    }

    /// Column bound to member `member`, if any.
    pub fn column_for_member(&self, member: usize) -> Option<usize> {
        self.member_to_column.get(member).copied().flatten()
    }

    /// Whether `columns` are exactly the columns this plan was built over.
    pub fn matches(&self, columns: &[Column]) -> bool {
        self.columns.len() == columns.len()
            && self
                .columns
                .iter()
                .zip(columns)
                .all(|(planned, column)| planned.name == column.name() && planned.kind == column.kind())
    }

    /// Names of columns without a member.
    pub fn unmapped_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|c| c.target.is_none())
            .map(|c| c.name.as_str())
    }
}

/// Cached plan for `T` over `columns`. See [`BindingPlan::for_type`].
///
/// # Errors
///
/// Returns [`BindingError::NoBindableMembers`] if `T` has no members.
pub fn build_plan<T: Bindable>(
    columns: &[Column],
    matching: NameMatching,
) -> Result<Arc<BindingPlan>, BindingError> {
    BindingPlan::for_type::<T>(columns, matching)
}

/// Bind one row into a fresh `T`.
///
/// Members without a column keep their `Default` value in both modes.
///
/// # Errors
///
/// [`BindingError::PlanMismatch`] in either mode when the row's columns are
/// not the ones `plan` was built over.
/// Strict mode only: [`BindingError::PropertyNotFound`] for a column with no
/// member, [`BindingError::MismatchedType`] for a value the member cannot
/// take.
pub fn bind_row<T: Bindable>(
    row: Row,
    plan: &BindingPlan,
    mode: BindingMode,
) -> Result<T, BindingError> {
    if !plan.matches(row.columns()) {
        return Err(BindingError::PlanMismatch {
            type_name: plan.type_name.to_string(),
        });
    }
    let mut instance = T::default();
    for (value, column) in row.into_values().into_iter().zip(&plan.columns) {
        let Some(target) = column.target else {
            if mode == BindingMode::Strict {
                return Err(BindingError::PropertyNotFound {
                    column: column.name.clone(),
                });
            }
            continue;
        };

        let actual = value.type_name();
        let bound = assign(&mut instance, value, target, mode);
        if !bound {
            if mode == BindingMode::Strict {
                return Err(BindingError::MismatchedType {
                    column: column.name.clone(),
                    expected: target.kind.name(),
                    actual,
                });
            }
            log::trace!(
                "safe binding left {}.{} at its default: cannot take {actual}",
                plan.type_name,
                column.name
            );
        }
    }
    Ok(instance)
}

fn assign<T: Bindable>(
    instance: &mut T,
    value: Value,
    target: MemberTarget,
    mode: BindingMode,
) -> bool {
    let converted = if value.is_null() {
        if !target.nullable {
            return false;
        }
        Value::Null
    } else {
        if !target.conversion.allowed_in(mode) {
            return false;
        }
        match target.conversion.apply(value, target.kind) {
            Some(converted) => converted,
            None => return false,
        }
    };
    instance.assign(target.member, converted).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::MemberDescriptor;
    use crate::table::TabularResult;

    #[derive(Debug, Default, PartialEq)]
    struct Pet {
        id: i32,
        name: String,
        weight: Option<f64>,
    }

    impl Bindable for Pet {
        fn type_name() -> &'static str {
            "Pet"
        }

        fn members() -> Vec<MemberDescriptor> {
            vec![
                MemberDescriptor::new("id", ValueKind::Int, false),
                MemberDescriptor::new("name", ValueKind::Text, false),
                MemberDescriptor::new("weight", ValueKind::Double, true),
            ]
        }

        fn assign(&mut self, member: usize, value: Value) -> Result<(), Value> {
            match (member, value) {
                (0, Value::Int(v)) => self.id = v,
                (1, Value::Text(v)) => self.name = v,
                (2, Value::Double(v)) => self.weight = Some(v),
                (2, Value::Null) => self.weight = None,
                (_, other) => return Err(other),
            }
            Ok(())
        }

        fn member_values(&self) -> Vec<Value> {
            vec![
                Value::Int(self.id),
                Value::Text(self.name.clone()),
                self.weight.map_or(Value::Null, Value::Double),
            ]
        }
    }

    fn single_row(columns: Vec<Column>, values: Vec<Value>) -> (Row, Arc<BindingPlan>) {
        let table = TabularResult::new(columns).unwrap().with_row(values).unwrap();
        let plan = build_plan::<Pet>(table.columns(), NameMatching::CaseInsensitive).unwrap();
        (table.into_rows().remove(0), plan)
    }

    #[test]
    fn test_matching_columns_bind_in_strict_mode() {
        let (row, plan) = single_row(
            vec![
                Column::new("ID", ValueKind::Int),
                Column::new("Name", ValueKind::Text),
                Column::new("weight", ValueKind::Double),
            ],
            vec![Value::Int(7), Value::Text("Rex".into()), Value::Double(12.5)],
        );
        let pet: Pet = bind_row(row, &plan, BindingMode::Strict).unwrap();
        assert_eq!(
            pet,
            Pet {
                id: 7,
                name: "Rex".into(),
                weight: Some(12.5)
            }
        );
    }

    #[test]
    fn test_extra_column_strict_vs_safe() {
        let columns = vec![
            Column::new("id", ValueKind::Int),
            Column::new("owner", ValueKind::Text),
        ];
        let values = vec![Value::Int(1), Value::Text("Sam".into())];

        let (row, plan) = single_row(columns.clone(), values.clone());
        let err = bind_row::<Pet>(row, &plan, BindingMode::Strict).unwrap_err();
        assert_eq!(
            err,
            BindingError::PropertyNotFound {
                column: "owner".into()
            }
        );

        let (row, plan) = single_row(columns, values);
        let pet: Pet = bind_row(row, &plan, BindingMode::Safe).unwrap();
        assert_eq!(pet.id, 1);
        assert_eq!(pet.name, "");
    }

    #[test]
    fn test_text_into_numeric_member() {
        let columns = vec![Column::new("id", ValueKind::Text)];
        let values = vec![Value::Text("abc".into())];

        let (row, plan) = single_row(columns.clone(), values.clone());
        let err = bind_row::<Pet>(row, &plan, BindingMode::Strict).unwrap_err();
        assert_eq!(
            err,
            BindingError::MismatchedType {
                column: "id".into(),
                expected: "int",
                actual: "text"
            }
        );

        let (row, plan) = single_row(columns, values);
        let pet: Pet = bind_row(row, &plan, BindingMode::Safe).unwrap();
        assert_eq!(pet.id, 0);
    }

    #[test]
    fn test_safe_mode_parses_numeric_text() {
        let (row, plan) = single_row(
            vec![Column::new("id", ValueKind::Text)],
            vec![Value::Text("41".into())],
        );
        let pet: Pet = bind_row(row, &plan, BindingMode::Safe).unwrap();
        assert_eq!(pet.id, 41);
    }

    #[test]
    fn test_strict_narrowing_checks_range() {
        let (row, plan) = single_row(
            vec![Column::new("id", ValueKind::BigInt)],
            vec![Value::BigInt(5)],
        );
        let pet: Pet = bind_row(row, &plan, BindingMode::Strict).unwrap();
        assert_eq!(pet.id, 5);

        let (row, plan) = single_row(
            vec![Column::new("id", ValueKind::BigInt)],
            vec![Value::BigInt(i64::from(i32::MAX) + 1)],
        );
        assert!(matches!(
            bind_row::<Pet>(row, &plan, BindingMode::Strict),
            Err(BindingError::MismatchedType { .. })
        ));
    }

    #[test]
    fn test_null_handling() {
        let columns = vec![
            Column::new("name", ValueKind::Text),
            Column::new("weight", ValueKind::Double),
        ];
        let values = vec![Value::Text("Tom".into()), Value::Null];
        let (row, plan) = single_row(columns, values);
        let pet: Pet = bind_row(row, &plan, BindingMode::Strict).unwrap();
        assert_eq!(pet.weight, None);

        let (row, plan) = single_row(vec![Column::new("name", ValueKind::Text)], vec![Value::Null]);
        assert_eq!(
            bind_row::<Pet>(row, &plan, BindingMode::Strict).unwrap_err(),
            BindingError::MismatchedType {
                column: "name".into(),
                expected: "text",
                actual: "null"
            }
        );
        let (row, plan) = single_row(vec![Column::new("name", ValueKind::Text)], vec![Value::Null]);
        assert_eq!(bind_row::<Pet>(row, &plan, BindingMode::Safe).unwrap().name, "");
    }

    #[test]
    fn test_unmapped_members_keep_defaults() {
        let (row, plan) = single_row(vec![Column::new("name", ValueKind::Text)], vec![Value::Text("Kit".into())]);
        assert_eq!(plan.column_for_member(0), None);
        assert_eq!(plan.column_for_member(1), Some(0));
        let pet: Pet = bind_row(row, &plan, BindingMode::Strict).unwrap();
        assert_eq!(pet.id, 0);
        assert_eq!(pet.weight, None);
    }

    #[test]
    fn test_row_from_another_column_list_is_rejected() {
        let (_, plan) = single_row(
            vec![Column::new("id", ValueKind::Int), Column::new("name", ValueKind::Text)],
            vec![Value::Int(1), Value::Text("Rex".into())],
        );
        let reordered = TabularResult::new(vec![
            Column::new("name", ValueKind::Text),
            Column::new("id", ValueKind::Int),
            Column::new("zzz", ValueKind::Int),
        ])
        .unwrap()
        .with_row(vec![Value::Text("Rex".into()), Value::Int(1), Value::Int(9)])
        .unwrap();
        let row = reordered.into_rows().remove(0);
        assert!(!plan.matches(row.columns()));
        for mode in [BindingMode::Strict, BindingMode::Safe] {
            assert_eq!(
                bind_row::<Pet>(row.clone(), &plan, mode).unwrap_err(),
                BindingError::PlanMismatch {
                    type_name: "Pet".into()
                }
            );
        }

        let retyped = TabularResult::new(vec![
            Column::new("id", ValueKind::BigInt),
            Column::new("name", ValueKind::Text),
        ])
        .unwrap()
        .with_row(vec![Value::BigInt(1), Value::Text("Rex".into())])
        .unwrap();
        let row = retyped.into_rows().remove(0);
        assert!(matches!(
            bind_row::<Pet>(row, &plan, BindingMode::Strict),
            Err(BindingError::PlanMismatch { .. })
        ));
    }

    #[test]
    fn test_plan_shape() {
        let columns = vec![
            Column::new("extra", ValueKind::Bool),
            Column::new("weight", ValueKind::Real),
        ];
        let descriptor = TypeDescriptor::build::<Pet>().unwrap();
        let plan = BindingPlan::build(&descriptor, &columns, NameMatching::CaseInsensitive);
        assert_eq!(plan.member_for_column(0), None);
        assert_eq!(plan.member_for_column(1), Some(2));
        assert_eq!(plan.column_for_member(2), Some(1));
        assert_eq!(plan.unmapped_columns().collect::<Vec<_>>(), vec!["extra"]);
    }

    #[test]
    fn test_descriptors_built_twice_give_identical_plans() {
        let columns = vec![
            Column::new("NAME", ValueKind::Text),
            Column::new("id", ValueKind::SmallInt),
        ];
        let a = BindingPlan::build(
            &TypeDescriptor::build::<Pet>().unwrap(),
            &columns,
            NameMatching::CaseInsensitive,
        );
        let b = BindingPlan::build(
            &TypeDescriptor::build::<Pet>().unwrap(),
            &columns,
            NameMatching::CaseInsensitive,
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_case_sensitive_matching() {
        let columns = vec![Column::new("ID", ValueKind::Int)];
        let plan = build_plan::<Pet>(&columns, NameMatching::CaseSensitive).unwrap();
        assert_eq!(plan.member_for_column(0), None);
        let plan = build_plan::<Pet>(&columns, NameMatching::CaseInsensitive).unwrap();
        assert_eq!(plan.member_for_column(0), Some(0));
    }

    #[test]
    fn test_plan_cache_reuses_plans() {
        let columns = vec![Column::new("id", ValueKind::Int)];
        let a = build_plan::<Pet>(&columns, NameMatching::CaseInsensitive).unwrap();
        let b = build_plan::<Pet>(&columns, NameMatching::CaseInsensitive).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_bind_options_builders() {
        let options = BindOptions::STRICT
            .with_mode(BindingMode::Safe)
            .with_matching(NameMatching::CaseSensitive);
        assert_eq!(options.mode, BindingMode::Safe);
        assert_eq!(options.matching, NameMatching::CaseSensitive);
        assert_eq!(BindOptions::SAFE.mode, BindingMode::Safe);
    }

    #[test]
    fn test_error_display() {
        let err = BindingError::MismatchedType {
            column: "id".into(),
            expected: "int",
            actual: "text",
        };
        assert_eq!(err.to_string(), "Mismatched type for column id: expected int, got text");
    }
}
