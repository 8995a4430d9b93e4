//! Parameter binding utilities for database queries.
//!
//! This module provides functions to bind `QueryParam` values to the
//! driver-specific query objects. Every statement the service runs goes
//! through these; values are never spliced into SQL text.

use crate::models::QueryParam;
use sqlx::postgres::PgArguments;
use sqlx::sqlite::SqliteArguments;
use sqlx::{Postgres, Sqlite};

/// Bind a parameter to a PostgreSQL query.
pub(crate) fn bind_postgres_param<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
    }
}

/// Bind a parameter to a SQLite query.
pub(crate) fn bind_sqlite_param<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
    }
}

/// Bind a parameter to a SQL Server query. Parameters map to `@P1`, `@P2`, ...
/// in the order they are bound.
pub(crate) fn bind_mssql_param(query: &mut tiberius::Query<'_>, param: &QueryParam) {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.clone()),
    }
}
