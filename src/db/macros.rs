//! Backend dispatch macro.
//!
//! Generates the `match` over [`DbHandle`](crate::db::backend::DbHandle)
//! variants so each driver operation reads as one arm per engine.

/// Macro for generating backend dispatch match arms.
///
/// # Example
///
/// ```ignore
/// impl_db_dispatch!(handle, {
///     Sqlite(p) => sqlite::close(p).await,
///     Postgres(p) => postgres::close(p).await,
///     Mssql(c) => c.close().await,
/// });
/// ```
#[macro_export]
macro_rules! impl_db_dispatch {
    ($handle:expr, { $($variant:ident($h:ident) => $body:expr),+ $(,)? }) => {
        match $handle {
            $(
                $crate::db::backend::DbHandle::$variant($h) => $body,
            )+
        }
    };
}

pub use impl_db_dispatch;
