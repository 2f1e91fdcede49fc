//! Runtime values carried by result columns.
//!
//! A [`Value`] is what a data source hands back for one cell; a [`ValueKind`]
//! is the declared type of a column (or the expected type of a bound member).

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use uuid::Uuid;

/// Declared type of a column or a bindable member.
///
/// `Enum` only ever appears on the member side: a column holding enum data
/// declares `Text` (variant names) or one of the integer kinds (ordinals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    SmallInt,
    Int,
    BigInt,
    Real,
    Double,
    Decimal,
    Text,
    Bytes,
    Uuid,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Json,
    Enum,
}

impl ValueKind {
    /// Lower-case type name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Bool => "bool",
            ValueKind::SmallInt => "smallint",
            ValueKind::Int => "int",
            ValueKind::BigInt => "bigint",
            ValueKind::Real => "real",
            ValueKind::Double => "double",
            ValueKind::Decimal => "decimal",
            ValueKind::Text => "text",
            ValueKind::Bytes => "bytes",
            ValueKind::Uuid => "uuid",
            ValueKind::Date => "date",
            ValueKind::Time => "time",
            ValueKind::Timestamp => "timestamp",
            ValueKind::TimestampTz => "timestamptz",
            ValueKind::Json => "json",
            ValueKind::Enum => "enum",
        }
    }

    /// Whether a result column may declare this kind.
    pub fn is_column_kind(self) -> bool {
        self != ValueKind::Enum
    }

    /// Column kind used when writing a member of this kind into a table.
    pub fn column_kind(self) -> ValueKind {
        match self {
            ValueKind::Enum => ValueKind::Text,
            other => other,
        }
    }

    /// Integral kinds, ordered by width.
    pub fn integer_rank(self) -> Option<u8> {
        match self {
            ValueKind::SmallInt => Some(0),
            ValueKind::Int => Some(1),
            ValueKind::BigInt => Some(2),
            _ => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One cell of a tabular result.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Real(f32),
    Double(f64),
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Json(serde_json::Value),
}

impl Value {
    /// The kind of a non-null value. `None` for [`Value::Null`].
    pub fn kind(&self) -> Option<ValueKind> {
        let kind = match self {
            Value::Null => return None,
            Value::Bool(_) => ValueKind::Bool,
            Value::SmallInt(_) => ValueKind::SmallInt,
            Value::Int(_) => ValueKind::Int,
            Value::BigInt(_) => ValueKind::BigInt,
            Value::Real(_) => ValueKind::Real,
            Value::Double(_) => ValueKind::Double,
            Value::Decimal(_) => ValueKind::Decimal,
            Value::Text(_) => ValueKind::Text,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::Uuid(_) => ValueKind::Uuid,
            Value::Date(_) => ValueKind::Date,
            Value::Time(_) => ValueKind::Time,
            Value::Timestamp(_) => ValueKind::Timestamp,
            Value::TimestampTz(_) => ValueKind::TimestampTz,
            Value::Json(_) => ValueKind::Json,
        };
        Some(kind)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Type name for error messages; `"null"` for [`Value::Null`].
    pub fn type_name(&self) -> &'static str {
        self.kind().map_or("null", ValueKind::name)
    }

    /// Integral payload of `SmallInt`, `Int` and `BigInt` values.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::SmallInt(v) => Some(i64::from(*v)),
            Value::Int(v) => Some(i64::from(*v)),
            Value::BigInt(v) => Some(*v),
            _ => None,
        }
    }
}

/// Canonical text rendering, the inverse of the text parsers in
/// [`crate::value::conversion`].
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::SmallInt(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::BigInt(v) => write!(f, "{v}"),
            Value::Real(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Decimal(v) => write!(f, "{v}"),
            Value::Text(v) => f.write_str(v),
            Value::Bytes(v) => {
                f.write_str("\\x")?;
                for byte in v {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Value::Uuid(v) => write!(f, "{v}"),
            Value::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            Value::Time(v) => write!(f, "{}", v.format("%H:%M:%S%.f")),
            Value::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%.f")),
            Value::TimestampTz(v) => f.write_str(&v.to_rfc3339()),
            Value::Json(v) => write!(f, "{v}"),
        }
    }
}
