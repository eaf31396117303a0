pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryStorage;

#[cfg(feature = "postgres")]
pub use postgres::PostgresStorage;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStorage;

/// Closes a per-request connection. Close failures are logged and otherwise
/// ignored so they never replace the operation's own result.
#[cfg(any(feature = "postgres", feature = "sqlite"))]
pub(crate) async fn release<C: sqlx::Connection>(conn: C, backend: &str) {
    match conn.close().await {
        Ok(()) => tracing::debug!("{} connection closed", backend),
        Err(e) => tracing::debug!("{} connection close failed: {}", backend, e),
    }
}

#[cfg(any(feature = "postgres", feature = "sqlite"))]
pub(crate) fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> nd_core::Error {
    move |e| nd_core::Error::Database(format!("Failed to {}: {}", context, e))
}
