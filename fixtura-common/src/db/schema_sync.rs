//! Schema introspection and synchronization
//!
//! Managed tables are declared in code (see [`crate::db::table_schemas`]) and
//! compared against what the store actually contains.
//!
//! # Architecture
//!
//! 1. **Introspection** - read tables, views, triggers and columns via `sqlite_master`
//!    and `pragma_table_info`
//! 2. **Diff** - compare declared columns with actual columns
//! 3. **Sync** - add missing columns via ALTER TABLE (additive reset only)
//!
//! # Usage
//!
//! ```rust,ignore
//! let table = TableDefinition::new("users")
//!     .column(ColumnDefinition::new("id", "INTEGER").primary_key())
//!     .column(ColumnDefinition::new("email", "TEXT").not_null().unique());
//!
//! let unresolved = SchemaSync::sync_table(&mut conn, &table).await?;
//! ```

use crate::db::table_schemas::TableDefinition;
use crate::Result;
use sqlx::{Row, SqliteConnection};
use tracing::{debug, info, warn};

/// Column definition with SQL constraints
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    /// Column name
    pub name: String,
    /// SQL type (e.g., "TEXT", "INTEGER", "REAL", "TIMESTAMP")
    pub sql_type: String,
    /// NOT NULL constraint
    pub not_null: bool,
    /// PRIMARY KEY constraint
    pub primary_key: bool,
    /// UNIQUE constraint
    pub unique: bool,
    /// DEFAULT value (raw SQL expression)
    pub default_value: Option<String>,
    /// Foreign key target as (table, column)
    pub references: Option<(String, String)>,
}

impl ColumnDefinition {
    /// Create new column definition
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            not_null: false,
            primary_key: false,
            unique: false,
            default_value: None,
            references: None,
        }
    }

    /// Mark column as PRIMARY KEY
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Mark column as NOT NULL
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Mark column as UNIQUE
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Set DEFAULT value
    pub fn default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Add a foreign key to `table(column)`
    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.references = Some((table.into(), column.into()));
        self
    }

    /// Column clause for CREATE TABLE
    pub fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", quote_ident(&self.name), self.sql_type);

        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(default) = &self.default_value {
            sql.push_str(&format!(" DEFAULT {}", default));
        }
        if let Some((table, column)) = &self.references {
            sql.push_str(&format!(
                " REFERENCES {}({})",
                quote_ident(table),
                quote_ident(column)
            ));
        }

        sql
    }
}

/// Quote an SQL identifier, doubling embedded quotes
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Actual column from database introspection (pragma_table_info result)
#[derive(Debug, Clone)]
pub struct ActualColumn {
    /// Column ID (position in table)
    pub cid: i32,
    /// Column name
    pub name: String,
    /// SQL type from pragma_table_info
    pub type_name: String,
    /// NOT NULL constraint
    pub not_null: bool,
    /// DEFAULT value
    pub default_value: Option<String>,
    /// PRIMARY KEY flag (1 = yes, 0 = no)
    pub pk: bool,
}

/// Kind of entry in `sqlite_master`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ObjectKind {
    Table,
    View,
    Index,
    Trigger,
}

impl ObjectKind {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "table" => Some(Self::Table),
            "view" => Some(Self::View),
            "index" => Some(Self::Index),
            "trigger" => Some(Self::Trigger),
            _ => None,
        }
    }

    /// Keyword used in DROP statements
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Table => "TABLE",
            Self::View => "VIEW",
            Self::Index => "INDEX",
            Self::Trigger => "TRIGGER",
        }
    }
}

/// User-created object found in the store
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SchemaObject {
    pub kind: ObjectKind,
    pub name: String,
}

/// Schema drift detected between expected and actual schema
#[derive(Debug, Clone)]
pub enum SchemaDrift {
    /// Column missing from database
    MissingColumn {
        table: String,
        column: ColumnDefinition,
    },
    /// Column type mismatch (cannot fix additively)
    TypeMismatch {
        table: String,
        column: String,
        expected: String,
        actual: String,
    },
    /// Constraint mismatch (cannot fix additively)
    ConstraintMismatch {
        table: String,
        column: String,
        constraint: String, // "NOT NULL", "PRIMARY KEY"
    },
}

impl std::fmt::Display for SchemaDrift {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaDrift::MissingColumn { table, column } => {
                write!(f, "{}.{} is missing", table, column.name)
            }
            SchemaDrift::TypeMismatch { table, column, expected, actual } => write!(
                f,
                "{}.{} has type '{}', expected '{}'",
                table, column, actual, expected
            ),
            SchemaDrift::ConstraintMismatch { table, column, constraint } => {
                write!(f, "{}.{} lacks {}", table, column, constraint)
            }
        }
    }
}

/// Defines expected schema for a database table
///
/// Implemented by application model types; collected into a
/// [`ManagedSchema`](crate::db::table_schemas::ManagedSchema) with `with::<T>()`.
pub trait TableSchema {
    /// Table name in database
    fn table_name() -> &'static str;

    /// Expected column definitions (order matters for table creation)
    fn expected_columns() -> Vec<ColumnDefinition>;

    /// Extra indexes as (index name, column list)
    fn indexes() -> Vec<(&'static str, Vec<&'static str>)> {
        Vec::new()
    }
}

/// Schema introspection - read actual database schema
pub struct SchemaIntrospector;

impl SchemaIntrospector {
    /// Read actual columns from a table using pragma_table_info
    ///
    /// Returns columns in database order (by cid)
    pub async fn introspect_table(
        conn: &mut SqliteConnection,
        table_name: &str,
    ) -> Result<Vec<ActualColumn>> {
        let rows = sqlx::query(
            "SELECT cid, name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?)",
        )
        .bind(table_name)
        .fetch_all(&mut *conn)
        .await?;

        let mut columns: Vec<ActualColumn> = rows
            .iter()
            .map(|row| ActualColumn {
                cid: row.get("cid"),
                name: row.get("name"),
                type_name: row.get("type"),
                not_null: row.get::<i32, _>("notnull") != 0,
                default_value: row.get("dflt_value"),
                pk: row.get::<i32, _>("pk") != 0,
            })
            .collect();

        // Sort by cid to ensure consistent order
        columns.sort_by_key(|c| c.cid);

        Ok(columns)
    }

    /// Check if table exists
    pub async fn table_exists(conn: &mut SqliteConnection, table_name: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM sqlite_master
                WHERE type='table' AND name = ?
            )
            "#,
        )
        .bind(table_name)
        .fetch_one(&mut *conn)
        .await?;

        Ok(exists)
    }

    /// List every user-created object, skipping SQLite internals and
    /// indexes SQLite creates implicitly for constraints
    pub async fn list_objects(conn: &mut SqliteConnection) -> Result<Vec<SchemaObject>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT type, name FROM sqlite_master
            WHERE name NOT LIKE 'sqlite_%'
            ORDER BY type, name
            "#,
        )
        .fetch_all(&mut *conn)
        .await?;

        let mut objects: Vec<SchemaObject> = rows
            .into_iter()
            .filter_map(|(kind, name)| {
                ObjectKind::parse(&kind).map(|kind| SchemaObject { kind, name })
            })
            .collect();
        objects.sort();

        Ok(objects)
    }

    /// Names of all user tables, sorted
    pub async fn list_tables(conn: &mut SqliteConnection) -> Result<Vec<String>> {
        Ok(Self::list_objects(conn)
            .await?
            .into_iter()
            .filter(|o| o.kind == ObjectKind::Table)
            .map(|o| o.name)
            .collect())
    }

    /// Number of rows in `table_name`
    pub async fn row_count(conn: &mut SqliteConnection, table_name: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table_name));
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&mut *conn).await?;
        Ok(count)
    }
}

/// Schema comparison - detect drift between expected and actual
pub struct SchemaDiff;

impl SchemaDiff {
    /// Compare expected schema to actual database schema
    ///
    /// Returns list of schema drift items that need correction
    pub fn compare(
        table_name: &str,
        expected: &[ColumnDefinition],
        actual: &[ActualColumn],
    ) -> Vec<SchemaDrift> {
        let mut drift = Vec::new();

        for expected_col in expected {
            if let Some(actual_col) = actual.iter().find(|c| c.name == expected_col.name) {
                if !Self::types_compatible(&expected_col.sql_type, &actual_col.type_name) {
                    drift.push(SchemaDrift::TypeMismatch {
                        table: table_name.to_string(),
                        column: expected_col.name.clone(),
                        expected: expected_col.sql_type.clone(),
                        actual: actual_col.type_name.clone(),
                    });
                }

                if expected_col.not_null && !actual_col.not_null {
                    drift.push(SchemaDrift::ConstraintMismatch {
                        table: table_name.to_string(),
                        column: expected_col.name.clone(),
                        constraint: "NOT NULL".to_string(),
                    });
                }

                if expected_col.primary_key && !actual_col.pk {
                    drift.push(SchemaDrift::ConstraintMismatch {
                        table: table_name.to_string(),
                        column: expected_col.name.clone(),
                        constraint: "PRIMARY KEY".to_string(),
                    });
                }
            } else {
                drift.push(SchemaDrift::MissingColumn {
                    table: table_name.to_string(),
                    column: expected_col.clone(),
                });
            }
        }

        drift
    }

    /// Check if SQL types are compatible (SQLite type affinity rules)
    fn types_compatible(expected: &str, actual: &str) -> bool {
        let exp = expected.to_uppercase();
        let act = actual.to_uppercase();

        if exp == act {
            return true;
        }

        // INTEGER affinity
        if exp.contains("INT") && act.contains("INT") {
            return true;
        }

        // TEXT affinity
        if (exp.contains("TEXT") || exp.contains("CHAR") || exp.contains("CLOB"))
            && (act.contains("TEXT") || act.contains("CHAR") || act.contains("CLOB"))
        {
            return true;
        }

        // REAL affinity
        if (exp.contains("REAL") || exp.contains("FLOAT") || exp.contains("DOUBLE"))
            && (act.contains("REAL") || act.contains("FLOAT") || act.contains("DOUBLE"))
        {
            return true;
        }

        false
    }
}

/// Schema synchronization - apply additive schema changes
pub struct SchemaSync;

impl SchemaSync {
    /// Synchronize one table: detect drift and add missing columns
    ///
    /// **What this CAN fix:**
    /// - Missing columns (via ALTER TABLE ADD COLUMN)
    ///
    /// **What this CANNOT fix (returned to the caller):**
    /// - Type changes
    /// - Constraint changes
    ///
    /// Expects the table to exist already.
    pub async fn sync_table(
        conn: &mut SqliteConnection,
        table: &TableDefinition,
    ) -> Result<Vec<SchemaDrift>> {
        debug!("Schema sync: checking table '{}'", table.name);

        if !SchemaIntrospector::table_exists(conn, &table.name).await? {
            warn!(
                "Table '{}' does not exist - create it before syncing columns",
                table.name
            );
            return Ok(Vec::new());
        }

        let actual = SchemaIntrospector::introspect_table(conn, &table.name).await?;
        let drift = SchemaDiff::compare(&table.name, &table.columns, &actual);

        if drift.is_empty() {
            debug!("Schema up to date for '{}'", table.name);
            return Ok(Vec::new());
        }

        let mut unresolved = Vec::new();
        for change in drift {
            match change {
                SchemaDrift::MissingColumn { column, .. } => {
                    Self::add_column(conn, &table.name, &column).await?;
                }
                other => {
                    warn!("Schema drift needs a destructive reset: {}", other);
                    unresolved.push(other);
                }
            }
        }

        Ok(unresolved)
    }

    /// Add missing column to table via ALTER TABLE ADD COLUMN
    pub async fn add_column(
        conn: &mut SqliteConnection,
        table: &str,
        column: &ColumnDefinition,
    ) -> Result<()> {
        let mut sql = format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            quote_ident(table),
            quote_ident(&column.name),
            column.sql_type
        );

        // SQLite ALTER TABLE ADD COLUMN limitations:
        // - PRIMARY KEY and UNIQUE are not supported
        // - NOT NULL only with a DEFAULT value
        if column.primary_key || column.unique {
            warn!(
                "Cannot add PRIMARY KEY/UNIQUE column {}.{} via ALTER TABLE, adding it without the constraint",
                table, column.name
            );
        }

        if column.not_null {
            if let Some(default) = &column.default_value {
                sql.push_str(&format!(" NOT NULL DEFAULT {}", default));
            } else {
                warn!(
                    "Cannot add NOT NULL column {}.{} without DEFAULT value, column will be nullable",
                    table, column.name
                );
            }
        } else if let Some(default) = &column.default_value {
            sql.push_str(&format!(" DEFAULT {}", default));
        }

        info!("Adding column {}.{} ({})", table, column.name, column.sql_type);

        match sqlx::query(&sql).execute(&mut *conn).await {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("duplicate column") => {
                debug!("Column {}.{} already present", table, column.name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
