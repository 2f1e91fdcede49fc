//! `FieldValue` maps Rust member types onto [`ValueKind`]s.
//!
//! `#[derive(Bindable)]` asks each field type for its kind and nullability
//! when building the type descriptor, and uses `from_value` / `to_value` to
//! move values in and out of the instance.

use super::types::{Value, ValueKind};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// A Rust type that can be stored in a bindable member.
pub trait FieldValue: Sized {
    /// Kind the binder converts column values to before calling `from_value`.
    const KIND: ValueKind;
    /// Whether `NULL` is an acceptable value.
    const NULLABLE: bool = false;

    /// Build the member from an already converted value.
    ///
    /// # Errors
    ///
    /// Hands `value` back when it does not fit the type.
    fn from_value(value: Value) -> Result<Self, Value>;

    fn to_value(&self) -> Value;
}

macro_rules! impl_field_value {
    ($type:ty, $kind:ident) => {
        impl FieldValue for $type {
            const KIND: ValueKind = ValueKind::$kind;

            fn from_value(value: Value) -> Result<Self, Value> {
                match value {
                    Value::$kind(v) => Ok(v),
                    other => Err(other),
                }
            }

            fn to_value(&self) -> Value {
                Value::$kind(self.clone())
            }
        }
    };
}

impl_field_value!(bool, Bool);
impl_field_value!(i16, SmallInt);
impl_field_value!(i32, Int);
impl_field_value!(i64, BigInt);
impl_field_value!(f32, Real);
impl_field_value!(f64, Double);
impl_field_value!(Decimal, Decimal);
impl_field_value!(String, Text);
impl_field_value!(Vec<u8>, Bytes);
impl_field_value!(Uuid, Uuid);
impl_field_value!(NaiveDate, Date);
impl_field_value!(NaiveTime, Time);
impl_field_value!(NaiveDateTime, Timestamp);
impl_field_value!(DateTime<Utc>, TimestampTz);
impl_field_value!(serde_json::Value, Json);

// Types without a column kind of their own ride on the next wider signed
// integer and are range-checked on the way in.
macro_rules! impl_field_value_via {
    ($type:ty, $kind:ident, $wide:ty) => {
        impl FieldValue for $type {
            const KIND: ValueKind = ValueKind::$kind;

            fn from_value(value: Value) -> Result<Self, Value> {
                match value {
                    Value::$kind(v) => <$type>::try_from(v).map_err(|_| Value::$kind(v)),
                    other => Err(other),
                }
            }

            fn to_value(&self) -> Value {
                Value::$kind(<$wide>::from(*self))
            }
        }
    };
}

impl_field_value_via!(i8, SmallInt, i16);
impl_field_value_via!(u8, SmallInt, i16);
impl_field_value_via!(u16, Int, i32);
impl_field_value_via!(u32, BigInt, i64);

impl<T: FieldValue> FieldValue for Option<T> {
    const KIND: ValueKind = T::KIND;
    const NULLABLE: bool = true;

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }
}
