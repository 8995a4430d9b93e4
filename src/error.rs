//! Error types for the quote API.
//!
//! `DbError` covers the data-access layer (drivers, connection manager, query
//! façade). `ApiError` is what request handlers return; it maps onto HTTP
//! status codes and a `{"error": "..."}` body.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Configuration error: {message}")]
    Configuration { message: String, suggestion: String },

    #[error("Credential error: {message}")]
    Credential { message: String, suggestion: String },

    #[error("Storage I/O error: {message}")]
    StorageIo { message: String, suggestion: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    /// Every pooled connection is in use. The handle itself is healthy.
    #[error("Connection pool exhausted: {message}")]
    PoolExhausted { message: String, suggestion: String },

    #[error("Unique constraint violated: {message}")]
    Conflict { message: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// SQLSTATE for sqlx backends, server error number for SQL Server
        code: Option<String>,
    },

    #[error("Database not connected")]
    NotConnected,

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    pub fn configuration(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn credential(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Credential {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn storage_io(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::StorageIo {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn pool_exhausted(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::PoolExhausted {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn database(message: impl Into<String>, code: Option<String>) -> Self {
        Self::Database {
            message: message.into(),
            code,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Configuration { suggestion, .. }
            | Self::Credential { suggestion, .. }
            | Self::StorageIo { suggestion, .. }
            | Self::Connection { suggestion, .. }
            | Self::PoolExhausted { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// Errors that mean the handle itself is unusable, as opposed to a bad statement.
    pub fn is_connection_loss(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::StorageIo { .. } | Self::NotConnected
        )
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::configuration(
                msg.to_string(),
                "Check the connection settings and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    return DbError::conflict(db_err.message());
                }
                let code = db_err.code().map(|c| c.to_string());
                DbError::database(db_err.message(), code)
            }
            sqlx::Error::RowNotFound => DbError::database("No rows returned", None),
            sqlx::Error::PoolTimedOut => DbError::pool_exhausted(
                "Timed out acquiring a pooled connection",
                "Check database server load and pool size",
            ),
            sqlx::Error::PoolClosed => {
                DbError::connection("Connection pool is closed", "Reconnect to the database")
            }
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration or set DB_SSL=false",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnNotFound(col) => {
                DbError::internal(format!("Column not found: {}", col))
            }
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// SQL Server error numbers for duplicate keys on a unique index / constraint.
const MSSQL_UNIQUE_VIOLATIONS: [u32; 2] = [2601, 2627];

impl From<tiberius::error::Error> for DbError {
    fn from(err: tiberius::error::Error) -> Self {
        use tiberius::error::Error as TdsError;

        match err {
            TdsError::Server(token) => {
                if MSSQL_UNIQUE_VIOLATIONS.contains(&token.code()) {
                    return DbError::conflict(token.message());
                }
                DbError::database(token.message(), Some(token.code().to_string()))
            }
            TdsError::Io { kind, message } => DbError::connection(
                format!("I/O error ({:?}): {}", kind, message),
                "Check network connectivity and database server status",
            ),
            TdsError::Tls(msg) => DbError::connection(
                format!("TLS error: {}", msg),
                "Verify AZURE_SQL_ENCRYPT and certificate settings",
            ),
            TdsError::Routing { host, port } => DbError::connection(
                format!("Server requested routing to {}:{}", host, port),
                "Connect to the routed host directly",
            ),
            TdsError::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check SQL Server version compatibility",
            ),
            other => DbError::internal(format!("SQL Server error: {}", other)),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors surfaced by HTTP handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(#[from] DbError),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(err) => {
                error!(error = %err, suggestion = ?err.suggestion(), "Request failed");
                "Server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
