//! Managed schema definitions
//!
//! The set of tables a suite owns. A destructive reset recreates exactly these
//! tables, in declaration order, so referenced tables must be declared before
//! the tables that reference them.
//!
//! # Usage
//!
//! ```rust,ignore
//! let schema = ManagedSchema::new()
//!     .with::<UsersTable>()
//!     .table(
//!         TableDefinition::new("sessions")
//!             .column(ColumnDefinition::new("id", "INTEGER").primary_key())
//!             .column(ColumnDefinition::new("user_id", "INTEGER").not_null().references("users", "id"))
//!             .index("idx_sessions_user", &["user_id"]),
//!     );
//! ```

use crate::db::schema_sync::{quote_ident, ColumnDefinition, TableSchema};
use crate::{Error, Result};

/// Secondary index on a managed table
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDefinition {
    pub name: String,
    pub columns: Vec<String>,
}

/// One managed table
#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    pub indexes: Vec<IndexDefinition>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Build from a [`TableSchema`] implementation
    pub fn from_schema<T: TableSchema>() -> Self {
        let mut table = Self::new(T::table_name());
        table.columns = T::expected_columns();
        for (name, columns) in T::indexes() {
            table = table.index(name, &columns);
        }
        table
    }

    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    pub fn index(mut self, name: impl Into<String>, columns: &[&str]) -> Self {
        self.indexes.push(IndexDefinition {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    /// CREATE TABLE statement
    ///
    /// `if_not_exists` is used by the additive reset; the destructive reset
    /// always starts from an empty store.
    pub fn create_table_sql(&self, if_not_exists: bool) -> String {
        let columns: Vec<String> = self.columns.iter().map(|c| c.to_sql()).collect();
        format!(
            "CREATE TABLE {}{} ({})",
            if if_not_exists { "IF NOT EXISTS " } else { "" },
            quote_ident(&self.name),
            columns.join(", ")
        )
    }

    /// CREATE INDEX statements
    pub fn create_index_sql(&self, if_not_exists: bool) -> Vec<String> {
        self.indexes
            .iter()
            .map(|index| {
                let columns: Vec<String> = index.columns.iter().map(|c| quote_ident(c)).collect();
                format!(
                    "CREATE INDEX {}{} ON {} ({})",
                    if if_not_exists { "IF NOT EXISTS " } else { "" },
                    quote_ident(&index.name),
                    quote_ident(&self.name),
                    columns.join(", ")
                )
            })
            .collect()
    }
}

/// Ordered collection of managed tables
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManagedSchema {
    tables: Vec<TableDefinition>,
}

impl ManagedSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table defined by a [`TableSchema`] type
    pub fn with<T: TableSchema>(self) -> Self {
        self.table(TableDefinition::from_schema::<T>())
    }

    pub fn table(mut self, table: TableDefinition) -> Self {
        self.tables.push(table);
        self
    }

    pub fn tables(&self) -> &[TableDefinition] {
        &self.tables
    }

    /// Managed table names in declaration order
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Reject definitions that cannot be created.
    ///
    /// Checks for duplicate or empty table names, tables without columns,
    /// duplicate column names, indexes over unknown columns, and foreign keys
    /// pointing at tables that are not declared earlier.
    pub fn validate(&self) -> Result<()> {
        let mut seen: Vec<&str> = Vec::new();

        for table in &self.tables {
            if table.name.trim().is_empty() {
                return Err(Error::InvalidInput("table name must not be empty".to_string()));
            }
            if seen.iter().any(|name| name.eq_ignore_ascii_case(&table.name)) {
                return Err(Error::InvalidInput(format!(
                    "table '{}' is declared twice",
                    table.name
                )));
            }
            if table.columns.is_empty() {
                return Err(Error::InvalidInput(format!(
                    "table '{}' has no columns",
                    table.name
                )));
            }

            let mut columns: Vec<&str> = Vec::new();
            for column in &table.columns {
                if columns.iter().any(|c| c.eq_ignore_ascii_case(&column.name)) {
                    return Err(Error::InvalidInput(format!(
                        "column '{}.{}' is declared twice",
                        table.name, column.name
                    )));
                }
                columns.push(&column.name);

                if let Some((target, _)) = &column.references {
                    let self_reference = target.eq_ignore_ascii_case(&table.name);
                    if !self_reference && !seen.iter().any(|name| name.eq_ignore_ascii_case(target)) {
                        return Err(Error::InvalidInput(format!(
                            "column '{}.{}' references '{}', which is not declared before it",
                            table.name, column.name, target
                        )));
                    }
                }
            }

            for index in &table.indexes {
                if let Some(missing) = index
                    .columns
                    .iter()
                    .find(|c| !columns.iter().any(|known| known.eq_ignore_ascii_case(c)))
                {
                    return Err(Error::InvalidInput(format!(
                        "index '{}' uses unknown column '{}.{}'",
                        index.name, table.name, missing
                    )));
                }
            }

            seen.push(&table.name);
        }

        Ok(())
    }
}
