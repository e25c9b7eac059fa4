//! Store reset and clean-state verification
//!
//! Destructive reset drops every user object in the store (managed or not)
//! and recreates the managed tables, leaving them empty. Additive reset only
//! creates what is missing. Either way the result is verified before it is
//! reported as done.

use crate::config::ResetPolicy;
use crate::db::init::acquire;
use crate::db::schema_sync::{
    quote_ident, ObjectKind, SchemaDiff, SchemaDrift, SchemaIntrospector, SchemaObject,
    SchemaSync,
};
use crate::db::table_schemas::ManagedSchema;
use crate::{Error, Result};
use sqlx::{Connection, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

/// What a reset changed
#[derive(Debug, Clone, Default)]
pub struct ResetSummary {
    /// Objects dropped (destructive reset only)
    pub dropped: Vec<SchemaObject>,
    /// Tables created
    pub created: Vec<String>,
    /// Drift an additive reset could not fix
    pub unresolved: Vec<String>,
}

/// Bring the store in line with `schema` according to `policy`, then verify it
pub async fn apply_policy(
    pool: &SqlitePool,
    schema: &ManagedSchema,
    policy: &ResetPolicy,
) -> Result<ResetSummary> {
    schema.validate()?;

    let mut conn = acquire(pool).await?;

    let summary = if policy.destructive {
        let summary = force_reset(&mut conn, schema).await?;
        verify_clean(&mut conn, schema).await?;
        summary
    } else {
        let summary = additive_sync(&mut conn, schema).await?;
        verify_schema(&mut conn, schema).await?;
        summary
    };

    info!(
        "Reset complete (destructive={}): dropped {} objects, created {} tables",
        policy.destructive,
        summary.dropped.len(),
        summary.created.len()
    );

    Ok(summary)
}

/// Drop every user object and recreate the managed tables
pub async fn force_reset(conn: &mut SqliteConnection, schema: &ManagedSchema) -> Result<ResetSummary> {
    // foreign_keys cannot change inside a transaction. If this future is
    // cancelled before the restore, the pool's release hook restores it.
    sqlx::query("PRAGMA foreign_keys = OFF")
        .execute(&mut *conn)
        .await?;

    let result = drop_and_create(conn, schema).await;

    let restore = sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&mut *conn)
        .await;

    let summary = result?;
    restore?;
    Ok(summary)
}

async fn drop_and_create(conn: &mut SqliteConnection, schema: &ManagedSchema) -> Result<ResetSummary> {
    let mut summary = ResetSummary::default();
    let existing = SchemaIntrospector::list_objects(conn).await?;

    let mut tx = conn.begin().await?;

    // Triggers and views first, indexes go with their tables
    for kind in [ObjectKind::Trigger, ObjectKind::View, ObjectKind::Table] {
        for object in existing.iter().filter(|o| o.kind == kind) {
            let sql = format!("DROP {} IF EXISTS {}", kind.keyword(), quote_ident(&object.name));
            debug!("{}", sql);
            sqlx::query(&sql).execute(&mut *tx).await?;
            summary.dropped.push(object.clone());
        }
    }

    for table in schema.tables() {
        sqlx::query(&table.create_table_sql(false))
            .execute(&mut *tx)
            .await?;
        for sql in table.create_index_sql(false) {
            sqlx::query(&sql).execute(&mut *tx).await?;
        }
        summary.created.push(table.name.clone());
    }

    tx.commit().await?;

    Ok(summary)
}

/// Create missing managed tables and columns, keep existing data
pub async fn additive_sync(conn: &mut SqliteConnection, schema: &ManagedSchema) -> Result<ResetSummary> {
    let mut summary = ResetSummary::default();

    for table in schema.tables() {
        if !SchemaIntrospector::table_exists(conn, &table.name).await? {
            sqlx::query(&table.create_table_sql(true))
                .execute(&mut *conn)
                .await?;
            summary.created.push(table.name.clone());
        } else {
            let unresolved = SchemaSync::sync_table(conn, table).await?;
            summary
                .unresolved
                .extend(unresolved.iter().map(|d| d.to_string()));
        }

        for sql in table.create_index_sql(true) {
            sqlx::query(&sql).execute(&mut *conn).await?;
        }
    }

    if !summary.unresolved.is_empty() {
        warn!(
            "Additive reset left {} schema differences in place",
            summary.unresolved.len()
        );
    }

    Ok(summary)
}

/// Check that every managed table exists with the declared columns.
///
/// Type and constraint drift is tolerated here: an additive reset cannot fix
/// it and reports it in [`ResetSummary::unresolved`] instead.
pub async fn verify_schema(conn: &mut SqliteConnection, schema: &ManagedSchema) -> Result<()> {
    let problems = schema_problems(conn, schema, false).await?;
    if problems.is_empty() {
        Ok(())
    } else {
        Err(Error::DirtyState(problems.join("; ")))
    }
}

/// Check that the store holds exactly the managed structures, all empty
pub async fn verify_clean(conn: &mut SqliteConnection, schema: &ManagedSchema) -> Result<()> {
    let mut problems = schema_problems(conn, schema, true).await?;

    for object in SchemaIntrospector::list_objects(conn).await? {
        if !is_managed(schema, &object) {
            problems.push(format!(
                "residual {} '{}'",
                object.kind.keyword().to_lowercase(),
                object.name
            ));
        }
    }

    for table in schema.tables() {
        if SchemaIntrospector::table_exists(conn, &table.name).await? {
            let rows = SchemaIntrospector::row_count(conn, &table.name).await?;
            if rows > 0 {
                problems.push(format!("table '{}' holds {} rows", table.name, rows));
            }
        }
    }

    if problems.is_empty() {
        debug!("Store verified clean ({} tables)", schema.tables().len());
        Ok(())
    } else {
        Err(Error::DirtyState(problems.join("; ")))
    }
}

/// Missing tables and column drift; without `strict` only missing columns count
async fn schema_problems(
    conn: &mut SqliteConnection,
    schema: &ManagedSchema,
    strict: bool,
) -> Result<Vec<String>> {
    let mut problems = Vec::new();

    for table in schema.tables() {
        if !SchemaIntrospector::table_exists(conn, &table.name).await? {
            problems.push(format!("table '{}' is missing", table.name));
            continue;
        }

        let actual = SchemaIntrospector::introspect_table(conn, &table.name).await?;
        problems.extend(
            SchemaDiff::compare(&table.name, &table.columns, &actual)
                .iter()
                .filter(|drift| strict || matches!(drift, SchemaDrift::MissingColumn { .. }))
                .map(|drift| drift.to_string()),
        );
    }

    Ok(problems)
}

fn is_managed(schema: &ManagedSchema, object: &SchemaObject) -> bool {
    match object.kind {
        ObjectKind::Table => schema
            .tables()
            .iter()
            .any(|t| t.name.eq_ignore_ascii_case(&object.name)),
        ObjectKind::Index => schema
            .tables()
            .iter()
            .flat_map(|t| t.indexes.iter())
            .any(|i| i.name.eq_ignore_ascii_case(&object.name)),
        ObjectKind::View | ObjectKind::Trigger => false,
    }
}
