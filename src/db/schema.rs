//! Table definitions.
//!
//! Every statement here is safe to run on each start: SQLite and PostgreSQL
//! use `CREATE TABLE IF NOT EXISTS`, SQL Server guards the `CREATE` with a
//! `sysobjects` lookup.

use crate::db::dialect::Dialect;

const SQLITE_SCHEMA: [&str; 2] = [
    r#"CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        email TEXT UNIQUE NOT NULL,
        password TEXT NOT NULL,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    )"#,
    r#"CREATE TABLE IF NOT EXISTS quotes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        company TEXT NOT NULL,
        tag_name TEXT NOT NULL,
        po_number TEXT,
        delivery TEXT,
        size_shape TEXT,
        order_types TEXT,
        grid_size TEXT,
        colour TEXT,
        comments TEXT,
        measurements TEXT,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    )"#,
];

const POSTGRES_SCHEMA: [&str; 2] = [
    r#"CREATE TABLE IF NOT EXISTS users (
        id SERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT UNIQUE NOT NULL,
        password TEXT NOT NULL,
        created_at TIMESTAMPTZ DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS quotes (
        id SERIAL PRIMARY KEY,
        company TEXT NOT NULL,
        tag_name TEXT NOT NULL,
        po_number TEXT,
        delivery TEXT,
        size_shape TEXT,
        order_types TEXT,
        grid_size TEXT,
        colour TEXT,
        comments TEXT,
        measurements TEXT,
        created_at TIMESTAMPTZ DEFAULT NOW()
    )"#,
];

const MSSQL_SCHEMA: [&str; 2] = [
    r#"IF NOT EXISTS (SELECT * FROM sysobjects WHERE name = 'users' AND xtype = 'U')
    CREATE TABLE users (
        id INT IDENTITY(1,1) PRIMARY KEY,
        name NVARCHAR(255) NOT NULL,
        email NVARCHAR(255) UNIQUE NOT NULL,
        password NVARCHAR(255) NOT NULL,
        created_at DATETIME2 DEFAULT SYSUTCDATETIME()
    )"#,
    r#"IF NOT EXISTS (SELECT * FROM sysobjects WHERE name = 'quotes' AND xtype = 'U')
    CREATE TABLE quotes (
        id INT IDENTITY(1,1) PRIMARY KEY,
        company NVARCHAR(255) NOT NULL,
        tag_name NVARCHAR(255) NOT NULL,
        po_number NVARCHAR(255),
        delivery NVARCHAR(255),
        size_shape NVARCHAR(255),
        order_types NVARCHAR(1000),
        grid_size NVARCHAR(255),
        colour NVARCHAR(255),
        comments NVARCHAR(MAX),
        measurements NVARCHAR(MAX),
        created_at DATETIME2 DEFAULT SYSUTCDATETIME()
    )"#,
];

/// DDL for `users` and `quotes`, in creation order.
pub fn schema_statements(dialect: Dialect) -> &'static [&'static str] {
    match dialect {
        Dialect::Sqlite => &SQLITE_SCHEMA,
        Dialect::Postgres => &POSTGRES_SCHEMA,
        Dialect::Mssql => &MSSQL_SCHEMA,
    }
}
