//! Embedded file database driver.

use crate::config::SqliteConfig;
use crate::db::params::bind_sqlite_param;
use crate::db::types::RowToJson;
use crate::error::{DbError, DbResult};
use crate::models::{NormalizedResult, Statement, StatementKind};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::time::Duration;
use tracing::debug;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open the database file, creating it and its parent directory if absent.
pub async fn connect(config: &SqliteConfig) -> DbResult<SqlitePool> {
    let path = &config.path;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            DbError::storage_io(
                format!("Cannot create directory {}: {}", parent.display(), e),
                "Check SQLITE_PATH and directory permissions",
            )
        })?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool_opts = &config.pool_options;
    let pool = SqlitePoolOptions::new()
        .max_connections(pool_opts.max_connections_or_default(true))
        .acquire_timeout(pool_opts.acquire_timeout())
        .idle_timeout(Some(pool_opts.idle_timeout()))
        .connect_with(options)
        .await
        .map_err(|e| {
            DbError::storage_io(
                format!("Cannot open {}: {}", path.display(), e),
                "Check SQLITE_PATH points to a writable location",
            )
        })?;

    debug!(path = %path.display(), "SQLite database opened");
    Ok(pool)
}

pub async fn ensure_schema(pool: &SqlitePool, statements: &[&str]) -> DbResult<()> {
    for ddl in statements {
        sqlx::query(ddl).execute(pool).await?;
    }
    Ok(())
}

pub async fn execute(pool: &SqlitePool, statement: &Statement) -> DbResult<NormalizedResult> {
    let mut query = sqlx::query(&statement.sql);
    for param in &statement.params {
        query = bind_sqlite_param(query, param);
    }

    match statement.kind {
        StatementKind::Select => {
            let rows = query.fetch_all(pool).await?;
            Ok(NormalizedResult::from_rows(
                rows.iter().map(RowToJson::to_json_map).collect(),
            ))
        }
        StatementKind::Insert => {
            let done = query.execute(pool).await?;
            Ok(NormalizedResult::inserted(done.last_insert_rowid()))
        }
    }
}
