//! Database-agnostic type mappings.
//!
//! This module converts driver rows into JSON objects keyed by column name.
//!
//! # Architecture
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Database-specific decoders handle the actual value extraction
//!
//! Timestamp columns come out as RFC 3339 UTC strings on every backend, so
//! handlers see the same `created_at` shape whichever engine stored it.

use crate::db::dialect::Dialect;
use crate::models::JsonRow;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Boolean,
    Timestamp,
    Text,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, dialect: Dialect) -> TypeCategory {
    let lower = type_name.to_lowercase();

    if lower.contains("int") || lower.contains("serial") {
        return TypeCategory::Integer;
    }

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }

    // SQLite NUMERIC affinity stores floats
    if dialect == Dialect::Sqlite && lower == "numeric" {
        return TypeCategory::Float;
    }

    if lower.contains("timestamp") || lower.contains("datetime") {
        return TypeCategory::Timestamp;
    }

    TypeCategory::Text
}

// =============================================================================
// Timestamp Normalization
// =============================================================================

/// Canonical timestamp text: RFC 3339, UTC, second precision.
pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Re-format timestamp text stored by an engine, treating zone-less values
/// as UTC. Unrecognized text is returned unchanged.
pub fn normalize_timestamp_text(text: &str) -> String {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return format_timestamp(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return format_timestamp(naive.and_utc());
        }
    }
    text.to_string()
}

fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

// =============================================================================
// Row to JSON Trait
// =============================================================================

/// Trait for converting database rows to JSON maps.
pub trait RowToJson {
    fn to_json_map(&self) -> JsonRow;
}

impl RowToJson for PgRow {
    fn to_json_map(&self) -> JsonRow {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), Dialect::Postgres);
                let value = postgres::decode_column(self, idx, category);
                (col.name().to_string(), value)
            })
            .collect()
    }
}

impl RowToJson for SqliteRow {
    fn to_json_map(&self) -> JsonRow {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), Dialect::Sqlite);
                let value = sqlite::decode_column(self, idx, category);
                (col.name().to_string(), value)
            })
            .collect()
    }
}

impl RowToJson for tiberius::Row {
    fn to_json_map(&self) -> JsonRow {
        self.cells()
            .map(|(col, data)| (col.name().to_string(), mssql::decode_cell(data)))
            .collect()
    }
}

// =============================================================================
// Database-Specific Decoders
// =============================================================================

mod postgres {
    use super::*;

    pub fn decode_column(row: &PgRow, idx: usize, category: TypeCategory) -> JsonValue {
        match category {
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Timestamp => decode_timestamp(row, idx),
            TypeCategory::Text => decode_text(row, idx),
        }
    }

    fn decode_integer(row: &PgRow, idx: usize) -> JsonValue {
        if let Ok(Some(v)) = row.try_get::<Option<i16>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i32>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        JsonValue::Null
    }

    fn decode_boolean(row: &PgRow, idx: usize) -> JsonValue {
        row.try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(JsonValue::Bool)
            .unwrap_or(JsonValue::Null)
    }

    fn decode_float(row: &PgRow, idx: usize) -> JsonValue {
        if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
            return float_value(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<f32>, _>(idx) {
            return float_value(f64::from(v));
        }
        JsonValue::Null
    }

    fn decode_timestamp(row: &PgRow, idx: usize) -> JsonValue {
        // TIMESTAMPTZ
        if let Ok(Some(v)) = row.try_get::<Option<DateTime<Utc>>, _>(idx) {
            return JsonValue::String(format_timestamp(v));
        }
        // TIMESTAMP without zone, stored as UTC
        if let Ok(Some(v)) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
            return JsonValue::String(format_timestamp(v.and_utc()));
        }
        JsonValue::Null
    }

    fn decode_text(row: &PgRow, idx: usize) -> JsonValue {
        row.try_get::<Option<String>, _>(idx)
            .ok()
            .flatten()
            .map(JsonValue::String)
            .unwrap_or(JsonValue::Null)
    }
}

mod sqlite {
    use super::*;

    pub fn decode_column(row: &SqliteRow, idx: usize, category: TypeCategory) -> JsonValue {
        match category {
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Timestamp => decode_timestamp(row, idx),
            TypeCategory::Text => decode_text(row, idx),
        }
    }

    fn decode_integer(row: &SqliteRow, idx: usize) -> JsonValue {
        row.try_get::<Option<i64>, _>(idx)
            .ok()
            .flatten()
            .map(|v| JsonValue::Number(v.into()))
            .unwrap_or(JsonValue::Null)
    }

    fn decode_boolean(row: &SqliteRow, idx: usize) -> JsonValue {
        row.try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(JsonValue::Bool)
            .unwrap_or(JsonValue::Null)
    }

    fn decode_float(row: &SqliteRow, idx: usize) -> JsonValue {
        row.try_get::<Option<f64>, _>(idx)
            .ok()
            .flatten()
            .map(float_value)
            .unwrap_or(JsonValue::Null)
    }

    fn decode_timestamp(row: &SqliteRow, idx: usize) -> JsonValue {
        // CURRENT_TIMESTAMP writes "YYYY-MM-DD HH:MM:SS" in UTC
        if let Ok(Some(v)) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
            return JsonValue::String(format_timestamp(v.and_utc()));
        }
        if let Ok(Some(v)) = row.try_get::<Option<String>, _>(idx) {
            return JsonValue::String(normalize_timestamp_text(&v));
        }
        JsonValue::Null
    }

    fn decode_text(row: &SqliteRow, idx: usize) -> JsonValue {
        if let Ok(Some(v)) = row.try_get::<Option<String>, _>(idx) {
            return JsonValue::String(v);
        }
        // Dynamically typed columns may hold a number
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        JsonValue::Null
    }
}

mod mssql {
    use super::*;
    use chrono::{FixedOffset, NaiveDate, NaiveTime};
    use tiberius::{ColumnData, FromSql};

    pub fn decode_cell(data: &ColumnData<'static>) -> JsonValue {
        match data {
            ColumnData::U8(v) => v.map(JsonValue::from).unwrap_or(JsonValue::Null),
            ColumnData::I16(v) => v.map(JsonValue::from).unwrap_or(JsonValue::Null),
            ColumnData::I32(v) => v.map(JsonValue::from).unwrap_or(JsonValue::Null),
            ColumnData::I64(v) => v.map(JsonValue::from).unwrap_or(JsonValue::Null),
            ColumnData::F32(v) => v
                .map(|f| float_value(f64::from(f)))
                .unwrap_or(JsonValue::Null),
            ColumnData::F64(v) => v.map(float_value).unwrap_or(JsonValue::Null),
            ColumnData::Bit(v) => v.map(JsonValue::Bool).unwrap_or(JsonValue::Null),
            ColumnData::String(v) => v
                .as_ref()
                .map(|s| JsonValue::String(s.to_string()))
                .unwrap_or(JsonValue::Null),
            ColumnData::Guid(v) => v
                .map(|g| JsonValue::String(g.to_string()))
                .unwrap_or(JsonValue::Null),
            ColumnData::Numeric(v) => v
                .as_ref()
                .map(|n| JsonValue::String(n.to_string()))
                .unwrap_or(JsonValue::Null),
            ColumnData::Binary(v) => v
                .as_ref()
                .map(|b| JsonValue::String(String::from_utf8_lossy(b).into_owned()))
                .unwrap_or(JsonValue::Null),
            ColumnData::DateTimeOffset(_) => match DateTime::<FixedOffset>::from_sql(data) {
                Ok(Some(v)) => JsonValue::String(format_timestamp(v.with_timezone(&Utc))),
                _ => JsonValue::Null,
            },
            ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
                match NaiveDateTime::from_sql(data) {
                    Ok(Some(v)) => JsonValue::String(format_timestamp(v.and_utc())),
                    _ => JsonValue::Null,
                }
            }
            ColumnData::Date(_) => match NaiveDate::from_sql(data) {
                Ok(Some(v)) => JsonValue::String(v.to_string()),
                _ => JsonValue::Null,
            },
            ColumnData::Time(_) => match NaiveTime::from_sql(data) {
                Ok(Some(v)) => JsonValue::String(v.to_string()),
                _ => JsonValue::Null,
            },
            _ => {
                tracing::debug!("Unsupported SQL Server column type, returning null");
                JsonValue::Null
            }
        }
    }
}
