//! Schema model diffing.
//!
//! Compares two schema models and produces an ordered list of migration
//! operations. The diff is pure and deterministic for a given pair of
//! models; model collections are ordered maps, so equal models always
//! produce the same (empty) result.

use super::operation::MigrationOperation;
use crate::model::{SchemaModel, TableDef};
use thiserror::Error;

/// Diff errors - malformed model input. Fatal for the attempt.
#[derive(Debug, Error)]
pub enum DiffError {
    /// An index or foreign key references a table the model does not define.
    #[error("'{object}' references unknown table '{table}'")]
    UnknownTable { object: String, table: String },

    /// An index or foreign key references a column the table does not define.
    #[error("'{object}' references unknown column '{table}.{column}'")]
    UnknownColumn {
        object: String,
        table: String,
        column: String,
    },
}

/// Computes ordered operations between two schema models.
pub struct ModelDiffer;

impl ModelDiffer {
    /// Compute the operations that transform `old` into `new`.
    ///
    /// Ordering: foreign key drops, index drops, column drops, table
    /// drops, then table creates, column adds/alters, index creates,
    /// and foreign key adds.
    pub fn diff(old: &SchemaModel, new: &SchemaModel) -> Result<Vec<MigrationOperation>, DiffError> {
        Self::validate(new)?;

        let mut operations = Vec::new();

        let dropped_tables: Vec<&TableDef> = old
            .tables
            .values()
            .filter(|t| !new.tables.contains_key(&t.name))
            .collect();

        // Foreign keys first: removed, changed, or attached to (or
        // referencing) a table that goes away.
        for fk in old.foreign_keys.values() {
            let gone = match new.foreign_keys.get(&fk.name) {
                None => true,
                Some(current) => current != fk,
            };
            let owner_dropped = dropped_tables.iter().any(|t| t.name == fk.table);
            if gone && !owner_dropped {
                operations.push(MigrationOperation::DropForeignKey {
                    foreign_key: fk.name.clone(),
                    table: fk.table.clone(),
                });
            }
        }

        // Indexes: removed or changed. Indexes on dropped tables go down
        // with the table itself.
        for index in old.indexes.values() {
            let gone = match new.indexes.get(&index.name) {
                None => true,
                Some(current) => current != index,
            };
            let owner_dropped = dropped_tables.iter().any(|t| t.name == index.table);
            if gone && !owner_dropped {
                operations.push(MigrationOperation::DropIndex {
                    index: index.name.clone(),
                    table: index.table.clone(),
                });
            }
        }

        // Column drops on surviving tables.
        for old_table in old.tables.values() {
            if let Some(new_table) = new.tables.get(&old_table.name) {
                for column in &old_table.columns {
                    if !new_table.has_column(&column.name) {
                        operations.push(MigrationOperation::DropColumn {
                            table: old_table.name.clone(),
                            column: column.name.clone(),
                        });
                    }
                }
            }
        }

        // Table drops, after their dependents.
        for table in &dropped_tables {
            operations.push(MigrationOperation::DropTable {
                table: table.name.clone(),
            });
        }

        // Table creates before anything that targets them.
        for table in new.tables.values() {
            if !old.tables.contains_key(&table.name) {
                operations.push(MigrationOperation::CreateTable {
                    table: (*table).clone(),
                });
            }
        }

        // Column adds and alters on surviving tables, followed by
        // primary key and table metadata changes. Every field of a
        // surviving table is covered here, so an empty diff implies
        // the models (and their content hashes) are equal.
        for new_table in new.tables.values() {
            if let Some(old_table) = old.tables.get(&new_table.name) {
                for column in &new_table.columns {
                    match old_table.get_column(&column.name) {
                        None => operations.push(MigrationOperation::AddColumn {
                            table: new_table.name.clone(),
                            column: column.clone(),
                        }),
                        Some(previous) if previous != column => {
                            operations.push(MigrationOperation::AlterColumn {
                                table: new_table.name.clone(),
                                column: column.clone(),
                                previous: previous.clone(),
                            });
                        }
                        Some(_) => {}
                    }
                }

                if new_table.primary_key != old_table.primary_key {
                    operations.push(MigrationOperation::AlterPrimaryKey {
                        table: new_table.name.clone(),
                        primary_key: new_table.primary_key.clone(),
                        previous: old_table.primary_key.clone(),
                    });
                }

                // Relative order of the columns both sides share;
                // adds and drops are already captured above.
                let old_order: Vec<&str> = old_table
                    .columns
                    .iter()
                    .filter(|c| new_table.has_column(&c.name))
                    .map(|c| c.name.as_str())
                    .collect();
                let new_order: Vec<&str> = new_table
                    .columns
                    .iter()
                    .filter(|c| old_table.has_column(&c.name))
                    .map(|c| c.name.as_str())
                    .collect();
                if old_order != new_order || old_table.shardable != new_table.shardable {
                    operations.push(MigrationOperation::AlterTable {
                        table: new_table.clone(),
                        previous: old_table.clone(),
                    });
                }
            }
        }

        // Index creates: new indexes, plus recreations of changed ones.
        for index in new.indexes.values() {
            let create = match old.indexes.get(&index.name) {
                None => true,
                Some(previous) => previous != index,
            };
            if create {
                operations.push(MigrationOperation::CreateIndex {
                    index: index.clone(),
                });
            }
        }

        // Foreign key adds last, once both sides exist.
        for fk in new.foreign_keys.values() {
            let create = match old.foreign_keys.get(&fk.name) {
                None => true,
                Some(previous) => previous != fk,
            };
            if create {
                operations.push(MigrationOperation::AddForeignKey {
                    foreign_key: fk.clone(),
                });
            }
        }

        Ok(operations)
    }

    /// Produce the baseline operation list: every object created from
    /// nothing. Used when no prior snapshot exists.
    pub fn baseline(model: &SchemaModel) -> Result<Vec<MigrationOperation>, DiffError> {
        Self::validate(model)?;

        let mut operations = Vec::new();
        for table in model.tables.values() {
            operations.push(MigrationOperation::CreateTable {
                table: table.clone(),
            });
        }
        for index in model.indexes.values() {
            operations.push(MigrationOperation::CreateIndex {
                index: index.clone(),
            });
        }
        for fk in model.foreign_keys.values() {
            operations.push(MigrationOperation::AddForeignKey {
                foreign_key: fk.clone(),
            });
        }
        Ok(operations)
    }

    /// Validate that indexes and foreign keys reference objects the
    /// model actually defines.
    fn validate(model: &SchemaModel) -> Result<(), DiffError> {
        for index in model.indexes.values() {
            let table = Self::require_table(model, &index.name, &index.table)?;
            for column in &index.columns {
                Self::require_column(table, &index.name, column)?;
            }
        }
        for fk in model.foreign_keys.values() {
            let table = Self::require_table(model, &fk.name, &fk.table)?;
            for column in &fk.columns {
                Self::require_column(table, &fk.name, column)?;
            }
            let referenced = Self::require_table(model, &fk.name, &fk.referenced_table)?;
            for column in &fk.referenced_columns {
                Self::require_column(referenced, &fk.name, column)?;
            }
        }
        Ok(())
    }

    fn require_table<'a>(
        model: &'a SchemaModel,
        object: &str,
        table: &str,
    ) -> Result<&'a TableDef, DiffError> {
        model.get_table(table).ok_or_else(|| DiffError::UnknownTable {
            object: object.to_string(),
            table: table.to_string(),
        })
    }

    fn require_column(table: &TableDef, object: &str, column: &str) -> Result<(), DiffError> {
        if table.has_column(column) {
            Ok(())
        } else {
            Err(DiffError::UnknownColumn {
                object: object.to_string(),
                table: table.name.clone(),
                column: column.to_string(),
            })
        }
    }
}
