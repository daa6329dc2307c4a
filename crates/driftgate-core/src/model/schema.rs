//! The schema model - a complete description of expected database structure.

use super::{ForeignKeyDef, IndexDef, TableDef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A complete schema model.
///
/// Collections are `BTreeMap`s keyed by object name so that iteration,
/// snapshot rendering, and therefore content hashing are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaModel {
    /// Table definitions keyed by name.
    pub tables: BTreeMap<String, TableDef>,
    /// Index definitions keyed by name.
    pub indexes: BTreeMap<String, IndexDef>,
    /// Foreign key definitions keyed by name.
    pub foreign_keys: BTreeMap<String, ForeignKeyDef>,
}

impl SchemaModel {
    /// Create an empty schema model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table.
    pub fn with_table(mut self, table: TableDef) -> Self {
        self.tables.insert(table.name.clone(), table);
        self
    }

    /// Add an index.
    pub fn with_index(mut self, index: IndexDef) -> Self {
        self.indexes.insert(index.name.clone(), index);
        self
    }

    /// Add a foreign key.
    pub fn with_foreign_key(mut self, foreign_key: ForeignKeyDef) -> Self {
        self.foreign_keys.insert(foreign_key.name.clone(), foreign_key);
        self
    }

    /// Get a table by name.
    pub fn get_table(&self, name: &str) -> Option<&TableDef> {
        self.tables.get(name)
    }

    /// Get an index by name.
    pub fn get_index(&self, name: &str) -> Option<&IndexDef> {
        self.indexes.get(name)
    }

    /// Get a foreign key by name.
    pub fn get_foreign_key(&self, name: &str) -> Option<&ForeignKeyDef> {
        self.foreign_keys.get(name)
    }

    /// All indexes on the given table.
    pub fn indexes_on(&self, table: &str) -> Vec<&IndexDef> {
        self.indexes.values().filter(|i| i.table == table).collect()
    }

    /// All foreign keys declared on the given table.
    pub fn foreign_keys_on(&self, table: &str) -> Vec<&ForeignKeyDef> {
        self.foreign_keys
            .values()
            .filter(|f| f.table == table)
            .collect()
    }

    /// All foreign keys that reference the given table.
    pub fn foreign_keys_referencing(&self, table: &str) -> Vec<&ForeignKeyDef> {
        self.foreign_keys
            .values()
            .filter(|f| f.referenced_table == table)
            .collect()
    }

    /// List all table names.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(|s| s.as_str()).collect()
    }

    /// Check if the model is empty.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.indexes.is_empty() && self.foreign_keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnDef, ColumnType};

    fn sample_model() -> SchemaModel {
        let users = TableDef::new("Users")
            .with_column(ColumnDef::new("Id", ColumnType::Uuid))
            .with_column(ColumnDef::new("Name", ColumnType::Text))
            .with_column(ColumnDef::new("Email", ColumnType::Text))
            .with_primary_key(["Id"]);

        let posts = TableDef::new("Posts")
            .with_column(ColumnDef::new("Id", ColumnType::Uuid))
            .with_column(ColumnDef::new("AuthorId", ColumnType::Uuid))
            .with_primary_key(["Id"]);

        SchemaModel::new()
            .with_table(users)
            .with_table(posts)
            .with_index(IndexDef::new("IX_Users_Email", "Users", ["Email"]).unique())
            .with_foreign_key(ForeignKeyDef::new(
                "FK_Posts_Users",
                "Posts",
                ["AuthorId"],
                "Users",
                ["Id"],
            ))
    }

    #[test]
    fn test_model_builder() {
        let model = sample_model();

        assert_eq!(model.tables.len(), 2);
        assert_eq!(model.indexes.len(), 1);
        assert_eq!(model.foreign_keys.len(), 1);
        assert!(!model.is_empty());
    }

    #[test]
    fn test_lookups() {
        let model = sample_model();

        assert!(model.get_table("Users").is_some());
        assert!(model.get_table("Missing").is_none());
        assert_eq!(model.indexes_on("Users").len(), 1);
        assert_eq!(model.foreign_keys_on("Posts").len(), 1);
        assert_eq!(model.foreign_keys_referencing("Users").len(), 1);
    }

    #[test]
    fn test_table_names_sorted() {
        let model = sample_model();
        // BTreeMap keeps names in lexicographic order.
        assert_eq!(model.table_names(), vec!["Posts", "Users"]);
    }

    #[test]
    fn test_structural_equality() {
        assert_eq!(sample_model(), sample_model());
        assert_ne!(sample_model(), SchemaModel::new());
    }
}
