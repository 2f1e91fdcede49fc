//! The conversion table used when a column's kind differs from a member's.
//!
//! Every `(from, to)` pair of [`ValueKind`]s has exactly one [`Conversion`].
//! Strict binding only follows the implicit classes; safe binding follows
//! every class except [`Conversion::Unsupported`].

use super::types::{Value, ValueKind};
use crate::binding::BindingMode;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use uuid::Uuid;

/// How a value of one kind becomes a value of another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// Same kind, value passes through.
    Identity,
    /// Lossless for every value: integral widening, integer to decimal,
    /// integers that fit the float's mantissa, real to double, date to timestamp.
    Widen,
    /// Fails unless the value survives unchanged: integral narrowing, and
    /// `int`/`bigint` into a float that cannot hold every value.
    Narrow,
    /// Text holding an enum variant name.
    EnumName,
    /// Integer holding an enum ordinal.
    EnumOrdinal,
    /// Value-dependent conversion that may drop precision or fail.
    Lossy,
    /// Text (or bytes) parsed into a typed value.
    Parse,
    /// Typed value rendered as text.
    Format,
    Unsupported,
}

impl Conversion {
    /// Classify a pair of kinds.
    pub fn between(from: ValueKind, to: ValueKind) -> Self {
        use ValueKind as K;

        if from == to {
            return if from.is_column_kind() {
                Conversion::Identity
            } else {
                Conversion::Unsupported
            };
        }

        if let (Some(a), Some(b)) = (from.integer_rank(), to.integer_rank()) {
            return if a < b { Conversion::Widen } else { Conversion::Narrow };
        }

        match (from, to) {
            (K::SmallInt, K::Real | K::Double) | (K::Int, K::Double) => Conversion::Widen,
            (K::Int | K::BigInt, K::Real) | (K::BigInt, K::Double) => Conversion::Narrow,
            (K::SmallInt | K::Int | K::BigInt, K::Decimal) => Conversion::Widen,
            (K::SmallInt | K::Int | K::BigInt, K::Enum) => Conversion::EnumOrdinal,
            (K::SmallInt | K::Int | K::BigInt, K::Bool) => Conversion::Lossy,
            (K::Real, K::Double) => Conversion::Widen,
            (K::Double, K::Real) => Conversion::Lossy,
            (K::Real | K::Double, K::SmallInt | K::Int | K::BigInt | K::Decimal) => Conversion::Lossy,
            (K::Decimal, K::SmallInt | K::Int | K::BigInt | K::Real | K::Double) => Conversion::Lossy,
            (K::Bool, K::SmallInt | K::Int | K::BigInt) => Conversion::Lossy,
            (K::Date, K::Timestamp | K::TimestampTz) => Conversion::Widen,
            (K::Timestamp, K::TimestampTz) | (K::TimestampTz, K::Timestamp) => Conversion::Lossy,
            (K::Timestamp | K::TimestampTz, K::Date | K::Time) => Conversion::Lossy,
            (K::Text, K::Enum) => Conversion::EnumName,
            (K::Text, K::Bytes) => Conversion::Lossy,
            (K::Text, _) if to.is_column_kind() => Conversion::Parse,
            (K::Bytes, K::Text) => Conversion::Parse,
            (K::Bytes, _) => Conversion::Unsupported,
            (_, K::Text) if from.is_column_kind() => Conversion::Format,
            _ => Conversion::Unsupported,
        }
    }

    /// Conversions a strict binding accepts without complaint.
    pub fn is_implicit(self) -> bool {
        matches!(
            self,
            Conversion::Identity
                | Conversion::Widen
                | Conversion::Narrow
                | Conversion::EnumName
                | Conversion::EnumOrdinal
        )
    }

    /// Whether `mode` may attempt this conversion at all.
    pub fn allowed_in(self, mode: BindingMode) -> bool {
        match mode {
            BindingMode::Strict => self.is_implicit(),
            BindingMode::Safe => self != Conversion::Unsupported,
        }
    }

    /// Convert a non-null `value` to `to`. `None` when the class is
    /// unsupported or the particular value does not fit.
    pub fn apply(self, value: Value, to: ValueKind) -> Option<Value> {
        match self {
            Conversion::Unsupported => None,
            Conversion::Identity => Some(value),
            Conversion::EnumName => match value {
                Value::Text(_) => Some(value),
                _ => None,
            },
            Conversion::EnumOrdinal => value.as_i64().map(Value::BigInt),
            Conversion::Format => match value {
                Value::Null => None,
                other => Some(Value::Text(other.to_string())),
            },
            Conversion::Parse => parse(value, to),
            Conversion::Widen | Conversion::Narrow | Conversion::Lossy => reshape(value, to),
        }
    }
}

/// Look up and apply the conversion for `value` into `to`, honouring `mode`.
pub fn convert(value: Value, to: ValueKind, mode: BindingMode) -> Option<Value> {
    let from = value.kind()?;
    let conversion = Conversion::between(from, to);
    if !conversion.allowed_in(mode) {
        return None;
    }
    conversion.apply(value, to)
}

fn integer_into(v: i64, to: ValueKind) -> Option<Value> {
    match to {
        ValueKind::SmallInt => i16::try_from(v).ok().map(Value::SmallInt),
        ValueKind::Int => i32::try_from(v).ok().map(Value::Int),
        ValueKind::BigInt => Some(Value::BigInt(v)),
        ValueKind::Real => {
            let f = v as f32;
            (f as i128 == i128::from(v)).then_some(Value::Real(f))
        }
        ValueKind::Double => {
            let f = v as f64;
            (f as i128 == i128::from(v)).then_some(Value::Double(f))
        }
        ValueKind::Decimal => Some(Value::Decimal(Decimal::from(v))),
        ValueKind::Bool => match v {
            0 => Some(Value::Bool(false)),
            1 => Some(Value::Bool(true)),
            _ => None,
        },
        _ => None,
    }
}

fn float_into(v: f64, to: ValueKind) -> Option<Value> {
    match to {
        ValueKind::Real => {
            let f = v as f32;
            // Out of f32 range would silently become infinity.
            (f.is_finite() || !v.is_finite()).then_some(Value::Real(f))
        }
        ValueKind::Double => Some(Value::Double(v)),
        ValueKind::Decimal => Decimal::from_f64(v).map(Value::Decimal),
        ValueKind::SmallInt | ValueKind::Int | ValueKind::BigInt => {
            // Only whole numbers survive; 2.5 is not an integer.
            if !v.is_finite() || v.fract() != 0.0 || v < i64::MIN as f64 || v >= i64::MAX as f64 {
                return None;
            }
            integer_into(v as i64, to)
        }
        _ => None,
    }
}

fn decimal_into(v: Decimal, to: ValueKind) -> Option<Value> {
    match to {
        ValueKind::Real => v.to_f32().map(Value::Real),
        ValueKind::Double => v.to_f64().map(Value::Double),
        ValueKind::SmallInt | ValueKind::Int | ValueKind::BigInt => {
            if !v.fract().is_zero() {
                return None;
            }
            integer_into(v.to_i64()?, to)
        }
        _ => None,
    }
}

fn reshape(value: Value, to: ValueKind) -> Option<Value> {
    if let Some(v) = value.as_i64() {
        return integer_into(v, to);
    }
    match value {
        Value::Real(v) => float_into(f64::from(v), to),
        Value::Double(v) => float_into(v, to),
        Value::Decimal(v) => decimal_into(v, to),
        Value::Bool(v) => integer_into(i64::from(v), to),
        Value::Text(v) if to == ValueKind::Bytes => Some(Value::Bytes(v.into_bytes())),
        Value::Date(v) => {
            let midnight = v.and_time(NaiveTime::MIN);
            match to {
                ValueKind::Timestamp => Some(Value::Timestamp(midnight)),
                ValueKind::TimestampTz => Some(Value::TimestampTz(midnight.and_utc())),
                _ => None,
            }
        }
        Value::Timestamp(v) => match to {
            ValueKind::TimestampTz => Some(Value::TimestampTz(v.and_utc())),
            ValueKind::Date => Some(Value::Date(v.date())),
            ValueKind::Time => Some(Value::Time(v.time())),
            _ => None,
        },
        Value::TimestampTz(v) => match to {
            ValueKind::Timestamp => Some(Value::Timestamp(v.naive_utc())),
            ValueKind::Date => Some(Value::Date(v.date_naive())),
            ValueKind::Time => Some(Value::Time(v.time())),
            _ => None,
        },
        _ => None,
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
}

fn parse(value: Value, to: ValueKind) -> Option<Value> {
    let text = match value {
        Value::Text(text) => text,
        Value::Bytes(bytes) if to == ValueKind::Text => {
            return String::from_utf8(bytes).ok().map(Value::Text);
        }
        _ => return None,
    };
    let trimmed = text.trim();
    match to {
        ValueKind::Bool => parse_bool(trimmed).map(Value::Bool),
        ValueKind::SmallInt => trimmed.parse().ok().map(Value::SmallInt),
        ValueKind::Int => trimmed.parse().ok().map(Value::Int),
        ValueKind::BigInt => trimmed.parse().ok().map(Value::BigInt),
        ValueKind::Real => trimmed.parse().ok().map(Value::Real),
        ValueKind::Double => trimmed.parse().ok().map(Value::Double),
        ValueKind::Decimal => trimmed.parse::<Decimal>().ok().map(Value::Decimal),
        ValueKind::Uuid => Uuid::parse_str(trimmed).ok().map(Value::Uuid),
        ValueKind::Date => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .ok()
            .map(Value::Date),
        ValueKind::Time => NaiveTime::parse_from_str(trimmed, "%H:%M:%S%.f")
            .ok()
            .map(Value::Time),
        ValueKind::Timestamp => parse_timestamp(trimmed).map(Value::Timestamp),
        ValueKind::TimestampTz => DateTime::parse_from_rfc3339(trimmed)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| parse_timestamp(trimmed).map(|naive| naive.and_utc()))
            .map(Value::TimestampTz),
        ValueKind::Json => serde_json::from_str(&text).ok().map(Value::Json),
        _ => None,
    }
}
