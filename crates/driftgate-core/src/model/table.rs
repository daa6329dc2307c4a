//! Table definitions.

use super::column::ColumnDef;
use serde::{Deserialize, Serialize};

/// A table definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDef {
    /// Table name (unique within the schema).
    pub name: String,
    /// Column definitions, in declaration order.
    pub columns: Vec<ColumnDef>,
    /// Names of the primary key columns.
    pub primary_key: Vec<String>,
    /// Whether this table participates in shard-table bootstrap.
    ///
    /// Index creation on shardable tables is filtered out of migration
    /// batches because the shard bootstrap creates those indexes itself.
    pub shardable: bool,
}

impl TableDef {
    /// Create a new table definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            shardable: false,
        }
    }

    /// Add a column.
    pub fn with_column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// Set the primary key columns.
    pub fn with_primary_key(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Mark the table as shardable.
    pub fn shardable(mut self) -> Self {
        self.shardable = true;
        self
    }

    /// Get a column by name.
    pub fn get_column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Check whether a column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.get_column(name).is_some()
    }
}
