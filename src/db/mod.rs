//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Backend drivers for SQLite, PostgreSQL and SQL Server
//! - Connection lifecycle management with lazy reconnect
//! - Logical operations rendered per dialect
//! - Row-to-JSON type mappings
//! - Idempotent schema creation

pub mod backend;
pub mod dialect;
pub mod executor;
#[macro_use]
pub mod macros;
pub mod operations;
pub mod params;
pub mod pool;
pub mod schema;
pub mod types;

pub use backend::DbHandle;
pub use dialect::Dialect;
pub use executor::QueryExecutor;
pub use operations::Operation;
pub use pool::{ConnectionManager, Lease};
