//! Migration operations - atomic structural changes.

use crate::model::{ColumnDef, ForeignKeyDef, IndexDef, TableDef};
use serde::Serialize;

/// One atomic structural change.
///
/// Operations are produced by the differ in dependency order: dependent
/// objects (indexes, foreign keys) are dropped before their owning
/// structural element and created after it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MigrationOperation {
    /// Create a new table with all its columns.
    CreateTable { table: TableDef },
    /// Drop an existing table.
    DropTable { table: String },
    /// Add a column to an existing table.
    AddColumn { table: String, column: ColumnDef },
    /// Drop a column from an existing table.
    DropColumn { table: String, column: String },
    /// Alter a column in place.
    AlterColumn {
        table: String,
        column: ColumnDef,
        previous: ColumnDef,
    },
    /// Change a table's primary key.
    AlterPrimaryKey {
        table: String,
        primary_key: Vec<String>,
        previous: Vec<String>,
    },
    /// Table metadata changed: column order or shard participation.
    /// Captured so the new snapshot is persisted; lowers to no backend
    /// command.
    AlterTable { table: TableDef, previous: TableDef },
    /// Create an index.
    CreateIndex { index: IndexDef },
    /// Drop an index.
    DropIndex { index: String, table: String },
    /// Add a foreign key constraint.
    AddForeignKey { foreign_key: ForeignKeyDef },
    /// Drop a foreign key constraint.
    DropForeignKey { foreign_key: String, table: String },
}

impl MigrationOperation {
    /// The table this operation targets.
    pub fn table(&self) -> &str {
        match self {
            MigrationOperation::CreateTable { table } => &table.name,
            MigrationOperation::DropTable { table } => table,
            MigrationOperation::AddColumn { table, .. } => table,
            MigrationOperation::DropColumn { table, .. } => table,
            MigrationOperation::AlterColumn { table, .. } => table,
            MigrationOperation::AlterPrimaryKey { table, .. } => table,
            MigrationOperation::AlterTable { table, .. } => &table.name,
            MigrationOperation::CreateIndex { index } => &index.table,
            MigrationOperation::DropIndex { table, .. } => table,
            MigrationOperation::AddForeignKey { foreign_key } => &foreign_key.table,
            MigrationOperation::DropForeignKey { table, .. } => table,
        }
    }

    /// Whether this operation removes existing structure.
    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            MigrationOperation::DropTable { .. }
                | MigrationOperation::DropColumn { .. }
                | MigrationOperation::DropIndex { .. }
                | MigrationOperation::DropForeignKey { .. }
        )
    }

    /// Human-readable description for logs.
    pub fn description(&self) -> String {
        match self {
            MigrationOperation::CreateTable { table } => {
                format!("Create table '{}'", table.name)
            }
            MigrationOperation::DropTable { table } => format!("Drop table '{table}'"),
            MigrationOperation::AddColumn { table, column } => {
                format!("Add column '{}.{}'", table, column.name)
            }
            MigrationOperation::DropColumn { table, column } => {
                format!("Drop column '{table}.{column}'")
            }
            MigrationOperation::AlterColumn { table, column, .. } => {
                format!("Alter column '{}.{}'", table, column.name)
            }
            MigrationOperation::AlterPrimaryKey { table, .. } => {
                format!("Alter primary key on '{table}'")
            }
            MigrationOperation::AlterTable { table, .. } => {
                format!("Alter table '{}'", table.name)
            }
            MigrationOperation::CreateIndex { index } => {
                format!("Create index '{}' on '{}'", index.name, index.table)
            }
            MigrationOperation::DropIndex { index, table } => {
                format!("Drop index '{index}' on '{table}'")
            }
            MigrationOperation::AddForeignKey { foreign_key } => {
                format!(
                    "Add foreign key '{}' on '{}'",
                    foreign_key.name, foreign_key.table
                )
            }
            MigrationOperation::DropForeignKey { foreign_key, table } => {
                format!("Drop foreign key '{foreign_key}' on '{table}'")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnType, TableDef};

    #[test]
    fn test_operation_table() {
        let op = MigrationOperation::AddColumn {
            table: "Users".into(),
            column: ColumnDef::new("Email", ColumnType::Text),
        };
        assert_eq!(op.table(), "Users");

        let op = MigrationOperation::CreateTable {
            table: TableDef::new("Posts"),
        };
        assert_eq!(op.table(), "Posts");
    }

    #[test]
    fn test_destructive_flag() {
        assert!(MigrationOperation::DropTable {
            table: "Users".into()
        }
        .is_destructive());
        assert!(!MigrationOperation::CreateTable {
            table: TableDef::new("Users")
        }
        .is_destructive());
    }

    #[test]
    fn test_description() {
        let op = MigrationOperation::DropIndex {
            index: "IX_Users_Email".into(),
            table: "Users".into(),
        };
        assert!(op.description().contains("IX_Users_Email"));
    }
}
