//! PostgreSQL type mapping
//!
//! Maps `PostgreSQL` column types onto [`ValueKind`]s and reads
//! `may_postgres` rows into a [`TabularResult`].

use crate::executor::QueryError;
use crate::table::{Column, TabularResult};
use crate::value::{Value, ValueKind};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use may_postgres::types::Type;
use may_postgres::{Column as PgColumn, Error as PostgresError, Row as PgRow};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Value kind for a `PostgreSQL` type, `None` when unsupported.
pub fn kind_for(ty: &Type) -> Option<ValueKind> {
    let kind = match *ty {
        Type::BOOL => ValueKind::Bool,
        Type::INT2 => ValueKind::SmallInt,
        Type::INT4 => ValueKind::Int,
        Type::INT8 => ValueKind::BigInt,
        Type::FLOAT4 => ValueKind::Real,
        Type::FLOAT8 => ValueKind::Double,
        Type::NUMERIC => ValueKind::Decimal,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => ValueKind::Text,
        Type::BYTEA => ValueKind::Bytes,
        Type::UUID => ValueKind::Uuid,
        Type::DATE => ValueKind::Date,
        Type::TIME => ValueKind::Time,
        Type::TIMESTAMP => ValueKind::Timestamp,
        Type::TIMESTAMPTZ => ValueKind::TimestampTz,
        Type::JSON | Type::JSONB => ValueKind::Json,
        _ => return None,
    };
    Some(kind)
}

fn read_value(row: &PgRow, index: usize, kind: ValueKind) -> Result<Value, PostgresError> {
    let value = match kind {
        ValueKind::Bool => row.try_get::<_, Option<bool>>(index)?.map(Value::Bool),
        ValueKind::SmallInt => row.try_get::<_, Option<i16>>(index)?.map(Value::SmallInt),
        ValueKind::Int => row.try_get::<_, Option<i32>>(index)?.map(Value::Int),
        ValueKind::BigInt => row.try_get::<_, Option<i64>>(index)?.map(Value::BigInt),
        ValueKind::Real => row.try_get::<_, Option<f32>>(index)?.map(Value::Real),
        ValueKind::Double => row.try_get::<_, Option<f64>>(index)?.map(Value::Double),
        ValueKind::Decimal => row.try_get::<_, Option<Decimal>>(index)?.map(Value::Decimal),
        ValueKind::Text => row.try_get::<_, Option<String>>(index)?.map(Value::Text),
        ValueKind::Bytes => row.try_get::<_, Option<Vec<u8>>>(index)?.map(Value::Bytes),
        ValueKind::Uuid => row.try_get::<_, Option<Uuid>>(index)?.map(Value::Uuid),
        ValueKind::Date => row.try_get::<_, Option<NaiveDate>>(index)?.map(Value::Date),
        ValueKind::Time => row.try_get::<_, Option<NaiveTime>>(index)?.map(Value::Time),
        ValueKind::Timestamp => row
            .try_get::<_, Option<NaiveDateTime>>(index)?
            .map(Value::Timestamp),
        ValueKind::TimestampTz => row
            .try_get::<_, Option<DateTime<Utc>>>(index)?
            .map(Value::TimestampTz),
        ValueKind::Json => row
            .try_get::<_, Option<serde_json::Value>>(index)?
            .map(Value::Json),
        ValueKind::Enum => None,
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Describe `columns` as result columns.
///
/// # Errors
///
/// Returns `QueryError::UnsupportedColumnType` for a type with no mapping.
pub fn columns_from(columns: &[PgColumn]) -> Result<Vec<Column>, QueryError> {
    columns
        .iter()
        .map(|c| {
            kind_for(c.type_())
                .map(|kind| Column::new(c.name(), kind))
                .ok_or_else(|| QueryError::UnsupportedColumnType {
                    column: c.name().to_string(),
                    type_name: c.type_().name().to_string(),
                })
        })
        .collect()
}

/// Read `rows` into a [`TabularResult`] with the given statement columns.
///
/// # Errors
///
/// Returns `QueryError` for unsupported column types, duplicate column
/// names, or a value `may_postgres` fails to decode.
pub fn table_from_rows(columns: &[PgColumn], rows: &[PgRow]) -> Result<TabularResult, QueryError> {
    let columns = columns_from(columns)?;
    let kinds: Vec<ValueKind> = columns.iter().map(Column::kind).collect();
    let mut table = TabularResult::new(columns)?;
    for row in rows {
        let values = kinds
            .iter()
            .enumerate()
            .map(|(index, kind)| read_value(row, index, *kind))
            .collect::<Result<Vec<_>, _>>()?;
        table.push_row(values)?;
    }
    Ok(table)
}
