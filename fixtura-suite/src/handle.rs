//! Resource handle seam
//!
//! The lifecycle controller owns exactly one [`ResourceHandle`] and calls two
//! operations on it: a full reset and a release. [`SqliteHandle`] is the
//! implementation for an sqlx SQLite pool.

use async_trait::async_trait;
use fixtura_common::db::{apply_policy, connect, ManagedSchema};
use fixtura_common::{DatabaseConfig, Error, ResetPolicy};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

/// Handle to an external stateful resource
#[async_trait]
pub trait ResourceHandle: Send + Sync {
    /// Label used in logs and errors (never contains credentials)
    fn resource_id(&self) -> String;

    /// Reconcile the resource with its expected state and verify the result
    async fn reset(&self, policy: &ResetPolicy) -> fixtura_common::Result<()>;

    /// Release the resource and everything it holds
    async fn close(&self) -> fixtura_common::Result<()>;
}

/// SQLite store behind an sqlx pool, reset to a [`ManagedSchema`]
pub struct SqliteHandle {
    pool: SqlitePool,
    schema: ManagedSchema,
    label: String,
    file_backed: bool,
}

impl SqliteHandle {
    /// Build a handle for `config` without connecting.
    ///
    /// An unreachable store is reported by the first `reset`, not here.
    pub fn open(config: &DatabaseConfig, schema: ManagedSchema) -> fixtura_common::Result<Self> {
        let pool = connect(config)?;
        Ok(Self {
            pool,
            schema,
            label: redact(&config.url),
            file_backed: !config.is_in_memory(),
        })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: SqlitePool, schema: ManagedSchema, label: impl Into<String>) -> Self {
        Self {
            pool,
            schema,
            label: label.into(),
            file_backed: false,
        }
    }

    /// Domain-level accessor handed to tests.
    ///
    /// Clones share the handle's pool, so they stop working once the
    /// handle is closed.
    pub fn accessor(&self) -> SqlitePool {
        self.pool.clone()
    }

    pub fn schema(&self) -> &ManagedSchema {
        &self.schema
    }
}

#[async_trait]
impl ResourceHandle for SqliteHandle {
    fn resource_id(&self) -> String {
        self.label.clone()
    }

    async fn reset(&self, policy: &ResetPolicy) -> fixtura_common::Result<()> {
        let summary = apply_policy(&self.pool, &self.schema, policy).await?;
        debug!(
            "{}: dropped {:?}, created {:?}",
            self.label, summary.dropped, summary.created
        );
        if !summary.unresolved.is_empty() {
            warn!(
                "{}: schema differences kept by additive reset: {}",
                self.label,
                summary.unresolved.join("; ")
            );
        }
        Ok(())
    }

    async fn close(&self) -> fixtura_common::Result<()> {
        if self.pool.is_closed() {
            return Err(Error::ResourceGone(format!("{} is already closed", self.label)));
        }

        // Flush the WAL so the file is self-contained, but only when
        // connections are open; never connect just to close.
        let checkpoint = if self.file_backed && self.pool.size() > 0 {
            sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
                .execute(&self.pool)
                .await
                .map(|_| ())
        } else {
            Ok(())
        };

        self.pool.close().await;
        info!("Released {}", self.label);

        checkpoint.map_err(Error::from)
    }
}

/// Strip userinfo and query parameters from a connection URL
fn redact(url: &str) -> String {
    let without_query = url.split('?').next().unwrap_or(url);
    match (without_query.find("://"), without_query.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}{}", &without_query[..scheme_end + 3], &without_query[at + 1..])
        }
        _ => without_query.to_string(),
    }
}
