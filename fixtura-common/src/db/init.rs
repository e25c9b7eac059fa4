//! Connection factory for the store under test
//!
//! The pool is created lazily: nothing touches the database until the first
//! acquire, so an unreachable store surfaces when the suite is prepared rather
//! than when the handle is built.

use crate::config::DatabaseConfig;
use crate::{Error, Result};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool};
use std::str::FromStr;
use tracing::debug;

/// Build a lazily connecting pool for `config.url`
pub fn connect(config: &DatabaseConfig) -> Result<SqlitePool> {
    let mut options = SqliteConnectOptions::from_str(&config.url)
        .map_err(|e| Error::Config(format!("Invalid database url '{}': {}", config.url, e)))?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(config.busy_timeout());

    let mut pool_options = SqlitePoolOptions::new()
        .acquire_timeout(config.acquire_timeout())
        // A reset cancelled between disabling and restoring foreign keys
        // returns its connection with them off; switch them back on
        // before the connection is reused.
        .after_release(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON")
                    .execute(&mut *conn)
                    .await?;
                Ok(true)
            })
        });

    if config.is_in_memory() {
        // An in-memory database lives exactly as long as its connection,
        // so pin the pool to one connection that is never recycled.
        pool_options = pool_options
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    } else {
        // WAL allows test readers to run alongside one writer
        options = options.journal_mode(SqliteJournalMode::Wal);
        pool_options = pool_options.max_connections(config.max_connections);
    }

    debug!(
        "Configured pool for {} (in_memory={})",
        config.url,
        config.is_in_memory()
    );

    Ok(pool_options.connect_lazy_with(options))
}

/// Acquire a connection, mapping connect failures to [`Error::Unreachable`]
pub async fn acquire(pool: &SqlitePool) -> Result<PoolConnection<Sqlite>> {
    if pool.is_closed() {
        return Err(Error::ResourceGone("connection pool is closed".to_string()));
    }

    pool.acquire()
        .await
        .map_err(|e| Error::Unreachable(e.to_string()))
}
