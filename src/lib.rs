//! Quote API Library
//!
//! A JSON REST service for account registration, bearer-token login and
//! quote storage on SQLite, PostgreSQL or Azure SQL.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod server;

pub use config::Config;
pub use error::{ApiError, DbError};
pub use routes::{AppState, create_router};
pub use server::HttpServer;
