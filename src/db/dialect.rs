//! SQL dialect differences between the supported engines.
//!
//! Only three things vary for the statements this service runs: the
//! parameter placeholder syntax, how a row limit is written, and how an
//! insert reports the generated id.

use crate::config::BackendKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
    Mssql,
}

impl Dialect {
    /// Placeholder for the `n`th parameter, counting from 1.
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Self::Sqlite => "?".to_string(),
            Self::Postgres => format!("${n}"),
            Self::Mssql => format!("@P{n}"),
        }
    }

    /// Comma-separated placeholders for parameters `first..first + count`.
    pub fn placeholders(&self, first: usize, count: usize) -> String {
        (first..first + count)
            .map(|n| self.placeholder(n))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `INSERT` that yields the new row's `id`.
    ///
    /// SQLite reports it out of band (`last_insert_rowid`); the other two
    /// engines return it as a one-row result.
    pub fn insert_returning_id(&self, table: &str, columns: &[&str]) -> String {
        let column_list = columns.join(", ");
        let values = self.placeholders(1, columns.len());
        match self {
            Self::Sqlite => format!("INSERT INTO {table} ({column_list}) VALUES ({values})"),
            Self::Postgres => {
                format!("INSERT INTO {table} ({column_list}) VALUES ({values}) RETURNING id")
            }
            Self::Mssql => format!(
                "INSERT INTO {table} ({column_list}) OUTPUT INSERTED.id VALUES ({values})"
            ),
        }
    }

    /// `SELECT` capped at a row count bound as parameter `limit_param`.
    pub fn select_limited(
        &self,
        columns: &str,
        from: &str,
        order_by: &str,
        limit_param: usize,
    ) -> String {
        let limit = self.placeholder(limit_param);
        match self {
            Self::Mssql => format!("SELECT TOP ({limit}) {columns} FROM {from} ORDER BY {order_by}"),
            Self::Sqlite | Self::Postgres => {
                format!("SELECT {columns} FROM {from} ORDER BY {order_by} LIMIT {limit}")
            }
        }
    }
}

impl From<BackendKind> for Dialect {
    fn from(kind: BackendKind) -> Self {
        match kind {
            BackendKind::Sqlite => Self::Sqlite,
            BackendKind::Postgres => Self::Postgres,
            BackendKind::Mssql => Self::Mssql,
        }
    }
}
