//! Backend drivers.
//!
//! [`DbHandle`] is the live connection object for whichever engine was
//! configured. Every variant supports the same four operations (connect,
//! ensure schema, execute, close) and reports whether it is still usable.

pub mod identity;
pub mod mssql;
pub mod postgres;
pub mod sqlite;

use crate::config::{BackendKind, DatabaseConfig};
use crate::db::dialect::Dialect;
use crate::db::schema::schema_statements;
use crate::error::{DbError, DbResult};
use crate::impl_db_dispatch;
use crate::models::{JsonRow, NormalizedResult, Statement};
use mssql::MssqlConnection;
use sqlx::{PgPool, SqlitePool};
use std::sync::Arc;

/// Backend-specific connection handle. Cloning shares the underlying pool or
/// connection.
#[derive(Debug, Clone)]
pub enum DbHandle {
    Sqlite(SqlitePool),
    Postgres(PgPool),
    Mssql(Arc<MssqlConnection>),
}

impl DbHandle {
    /// Open a handle for the configured backend.
    pub async fn connect(config: &DatabaseConfig) -> DbResult<Self> {
        match config {
            DatabaseConfig::Sqlite(c) => sqlite::connect(c).await.map(Self::Sqlite),
            DatabaseConfig::Postgres(c) => postgres::connect(c).await.map(Self::Postgres),
            DatabaseConfig::AzureSql(c) => MssqlConnection::connect(c)
                .await
                .map(|conn| Self::Mssql(Arc::new(conn))),
        }
    }

    /// Create the `users` and `quotes` tables if they do not exist.
    pub async fn ensure_schema(&self) -> DbResult<()> {
        let statements = schema_statements(self.dialect());
        impl_db_dispatch!(self, {
            Sqlite(p) => sqlite::ensure_schema(p, statements).await,
            Postgres(p) => postgres::ensure_schema(p, statements).await,
            Mssql(c) => c.ensure_schema(statements).await,
        })
    }

    pub async fn execute(&self, statement: &Statement) -> DbResult<NormalizedResult> {
        impl_db_dispatch!(self, {
            Sqlite(p) => sqlite::execute(p, statement).await,
            Postgres(p) => postgres::execute(p, statement).await,
            Mssql(c) => c.execute(statement).await,
        })
    }

    /// Close the handle. Safe to call more than once.
    pub async fn close(&self) {
        impl_db_dispatch!(self, {
            Sqlite(p) => p.close().await,
            Postgres(p) => p.close().await,
            Mssql(c) => c.close().await,
        })
    }

    pub fn is_connected(&self) -> bool {
        impl_db_dispatch!(self, {
            Sqlite(p) => !p.is_closed(),
            Postgres(p) => !p.is_closed(),
            Mssql(c) => c.is_connected(),
        })
    }

    pub fn kind(&self) -> BackendKind {
        impl_db_dispatch!(self, {
            Sqlite(_p) => BackendKind::Sqlite,
            Postgres(_p) => BackendKind::Postgres,
            Mssql(_c) => BackendKind::Mssql,
        })
    }

    pub fn dialect(&self) -> Dialect {
        Dialect::from(self.kind())
    }
}

/// Read the generated id from the single row an `INSERT ... RETURNING id`
/// (or `OUTPUT INSERTED.id`) produces.
pub(crate) fn inserted_id_from_rows(rows: Vec<JsonRow>) -> DbResult<NormalizedResult> {
    rows.first()
        .and_then(|row| row.get("id"))
        .and_then(|id| id.as_i64())
        .map(NormalizedResult::inserted)
        .ok_or_else(|| DbError::internal("Insert did not return the generated id"))
}
