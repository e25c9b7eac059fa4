//! Integration tests for the destructive and additive reset against
//! file-backed databases

use fixtura_common::db::{
    acquire, apply_policy, connect, ColumnDefinition, ManagedSchema, SchemaIntrospector,
    TableDefinition, TableSchema,
};
use fixtura_common::{DatabaseConfig, Error, ResetPolicy};
use std::path::Path;

struct AccountsTable;

impl TableSchema for AccountsTable {
    fn table_name() -> &'static str {
        "accounts"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("id", "INTEGER").primary_key(),
            ColumnDefinition::new("name", "TEXT").not_null(),
            ColumnDefinition::new("created_at", "TIMESTAMP")
                .not_null()
                .default("CURRENT_TIMESTAMP"),
        ]
    }

    fn indexes() -> Vec<(&'static str, Vec<&'static str>)> {
        vec![("idx_accounts_name", vec!["name"])]
    }
}

fn schema() -> ManagedSchema {
    ManagedSchema::new().with::<AccountsTable>().table(
        TableDefinition::new("transfers")
            .column(ColumnDefinition::new("id", "INTEGER").primary_key())
            .column(
                ColumnDefinition::new("account_id", "INTEGER")
                    .not_null()
                    .references("accounts", "id"),
            )
            .column(ColumnDefinition::new("amount", "REAL").not_null()),
    )
}

/// Full schema text, used to compare post-reset states
async fn snapshot(db_path: &Path) -> Vec<(String, String, Option<String>)> {
    let pool = connect(&DatabaseConfig::for_file(db_path)).unwrap();
    let rows: Vec<(String, String, Option<String>)> = sqlx::query_as(
        "SELECT type, name, sql FROM sqlite_master WHERE name NOT LIKE 'sqlite_%' ORDER BY type, name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();
    pool.close().await;
    rows
}

#[tokio::test]
async fn test_stale_store_is_reset_to_clean_schema() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("stale.db");

    // Leftovers from an earlier run
    {
        let pool = connect(&DatabaseConfig::for_file(&db_path)).unwrap();
        sqlx::query("CREATE TABLE accounts (id INTEGER PRIMARY KEY, legacy_flag INTEGER)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO accounts (id, legacy_flag) VALUES (1, 1), (2, 0)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("CREATE TABLE audit_log (entry TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "CREATE TRIGGER audit_accounts AFTER INSERT ON accounts BEGIN INSERT INTO audit_log VALUES ('x'); END",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool.close().await;
    }

    let pool = connect(&DatabaseConfig::for_file(&db_path)).unwrap();
    let summary = apply_policy(&pool, &schema(), &ResetPolicy::FORCE)
        .await
        .unwrap();

    assert_eq!(summary.created, vec!["accounts".to_string(), "transfers".to_string()]);
    assert_eq!(summary.dropped.len(), 3);

    let mut conn = acquire(&pool).await.unwrap();
    let tables = SchemaIntrospector::list_tables(&mut conn).await.unwrap();
    assert_eq!(tables, vec!["accounts".to_string(), "transfers".to_string()]);
    assert_eq!(SchemaIntrospector::row_count(&mut conn, "accounts").await.unwrap(), 0);

    let columns = SchemaIntrospector::introspect_table(&mut conn, "accounts")
        .await
        .unwrap();
    assert!(columns.iter().all(|c| c.name != "legacy_flag"));
    drop(conn);
    pool.close().await;
}

#[tokio::test]
async fn test_consecutive_resets_produce_identical_state() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("isolation.db");

    let pool = connect(&DatabaseConfig::for_file(&db_path)).unwrap();
    apply_policy(&pool, &schema(), &ResetPolicy::FORCE).await.unwrap();
    sqlx::query("INSERT INTO accounts (id, name) VALUES (1, 'first run')")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;
    let first = snapshot(&db_path).await;

    let pool = connect(&DatabaseConfig::for_file(&db_path)).unwrap();
    apply_policy(&pool, &schema(), &ResetPolicy::FORCE).await.unwrap();
    let leftover: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts")
        .fetch_one(&pool)
        .await
        .unwrap();
    pool.close().await;
    let second = snapshot(&db_path).await;

    assert_eq!(leftover, 0);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_additive_policy_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("additive.db");
    let pool = connect(&DatabaseConfig::for_file(&db_path)).unwrap();

    apply_policy(&pool, &schema(), &ResetPolicy::FORCE).await.unwrap();
    sqlx::query("INSERT INTO accounts (id, name) VALUES (1, 'keep me')")
        .execute(&pool)
        .await
        .unwrap();

    let summary = apply_policy(&pool, &schema(), &ResetPolicy::ADDITIVE)
        .await
        .unwrap();
    assert!(summary.dropped.is_empty());
    assert!(summary.created.is_empty());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
    pool.close().await;
}

#[tokio::test]
async fn test_unreachable_store() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("missing").join("nested").join("x.db");
    let pool = connect(&DatabaseConfig::for_file(&db_path)).unwrap();

    let result = apply_policy(&pool, &schema(), &ResetPolicy::FORCE).await;
    assert!(matches!(result, Err(Error::Unreachable(_))));
}

#[tokio::test]
async fn test_invalid_schema_rejected_before_touching_store() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("untouched.db");
    let pool = connect(&DatabaseConfig::for_file(&db_path)).unwrap();

    let invalid = ManagedSchema::new().table(TableDefinition::new("no_columns"));
    let result = apply_policy(&pool, &invalid, &ResetPolicy::FORCE).await;

    assert!(matches!(result, Err(Error::InvalidInput(_))));
    assert!(!db_path.exists());
}
