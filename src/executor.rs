//! Validated SQL execution
//!
//! Runs a [`ValidatedSql`] statement against Postgres and materializes every
//! row into a JSON object that preserves the store's column order (serde_json
//! is built with preserve_order). NUMERIC values are converted to f64 so the
//! rows serialize as plain numeric literals downstream; everything else
//! passes through unchanged. Connections are pooled and scoped to one call,
//! released on every exit path when the handle drops.

use crate::error::{MosaicError, Result};
use crate::validator::ValidatedSql;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{Column, PgPool, Row, TypeInfo};
use tracing::info;

/// One result row: column name -> scalar, in store column order.
pub type ResultRow = serde_json::Map<String, Value>;

pub struct SqlExecutor {
    pool: PgPool,
}

impl SqlExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Execute a validated statement and return the full ordered row set.
    pub async fn execute(&self, sql: &ValidatedSql) -> Result<Vec<ResultRow>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| MosaicError::Execution(format!("Failed to acquire connection: {}", e)))?;

        let rows = sqlx::query(sql.as_str())
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| MosaicError::Execution(e.to_string()))?;

        let mut data = Vec::with_capacity(rows.len());
        for row in &rows {
            data.push(row_to_map(row)?);
        }

        info!("Query returned {} rows", data.len());
        Ok(data)
    }

    /// Row count for the preview entry point, computed store-side.
    pub async fn count(&self, sql: &ValidatedSql) -> Result<i64> {
        let count_sql = format!("SELECT COUNT(*) FROM ({}) AS subquery", sql.as_str());

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| MosaicError::Execution(format!("Failed to acquire connection: {}", e)))?;

        let count: i64 = sqlx::query_scalar(&count_sql)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| MosaicError::Execution(e.to_string()))?;

        Ok(count)
    }
}

fn row_to_map(row: &PgRow) -> Result<ResultRow> {
    let mut map = ResultRow::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = decode_value(row, idx, column.type_info().name())
            .map_err(|e| MosaicError::Execution(format!("Failed to decode column '{}': {}", column.name(), e)))?;
        map.insert(column.name().to_string(), value);
    }
    Ok(map)
}

/// Decode one column into a JSON scalar by Postgres type name. NUMERIC goes
/// through Decimal -> f64; unknown types degrade to text, then null.
fn decode_value(row: &PgRow, idx: usize, type_name: &str) -> sqlx::Result<Value> {
    let value = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(idx)?.map(Value::Bool),
        "INT2" => row
            .try_get::<Option<i16>, _>(idx)?
            .map(|v| Value::from(v as i64)),
        "INT4" => row
            .try_get::<Option<i32>, _>(idx)?
            .map(|v| Value::from(v as i64)),
        "INT8" => row.try_get::<Option<i64>, _>(idx)?.map(Value::from),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(idx)?
            .map(|v| float_value(v as f64)),
        "FLOAT8" => row.try_get::<Option<f64>, _>(idx)?.map(float_value),
        "NUMERIC" => row
            .try_get::<Option<Decimal>, _>(idx)?
            .map(decimal_value),
        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(idx)?
            .map(|v| Value::String(v.to_string())),
        "TIME" => row
            .try_get::<Option<NaiveTime>, _>(idx)?
            .map(|v| Value::String(v.to_string())),
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(idx)?
            .map(|v| Value::String(v.to_string())),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(idx)?
            .map(|v| Value::String(v.to_rfc3339())),
        "UUID" => row
            .try_get::<Option<uuid::Uuid>, _>(idx)?
            .map(|v| Value::String(v.to_string())),
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => {
            row.try_get::<Option<String>, _>(idx)?.map(Value::String)
        }
        _ => row
            .try_get::<Option<String>, _>(idx)
            .unwrap_or(None)
            .map(Value::String),
    };

    Ok(value.unwrap_or(Value::Null))
}

fn float_value(v: f64) -> Value {
    serde_json::Number::from_f64(v)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Arbitrary-precision decimal -> floating point, so the value is
/// representable as a numeric literal in JSON.
fn decimal_value(d: Decimal) -> Value {
    d.to_f64().map(float_value).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn decimal_becomes_float() {
        let d = Decimal::from_str("42.50").unwrap();
        assert_eq!(decimal_value(d), serde_json::json!(42.5));
    }

    #[test]
    fn nan_degrades_to_null() {
        assert_eq!(float_value(f64::NAN), Value::Null);
    }

    #[test]
    fn result_row_preserves_insertion_order() {
        let mut row = ResultRow::new();
        row.insert("z".to_string(), Value::from(1));
        row.insert("a".to_string(), Value::from(2));
        let keys: Vec<_> = row.keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a"]);
    }
}
