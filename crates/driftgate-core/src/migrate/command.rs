//! Command generation and execution.
//!
//! Operations are lowered into backend DDL commands by the generator
//! and applied through the [`CommandExecutor`] seam. The engine does
//! not ship a live database driver; callers plug in an executor for
//! their backend, and tests use [`RecordingExecutor`].

use super::operation::MigrationOperation;
use crate::model::{ColumnDef, ColumnType, DefaultValue, ForeignKeyDef, IndexDef, ReferentialAction, TableDef};
use parking_lot::Mutex;
use thiserror::Error;

/// Command execution errors.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// The backend rejected a command.
    #[error("command failed: {reason}")]
    Command { reason: String },
    /// The backend connection is unusable.
    #[error("connection failed: {reason}")]
    Connection { reason: String },
}

/// One executable DDL command.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlCommand {
    /// The command text.
    pub text: String,
    /// Whether the command removes existing structure.
    pub destructive: bool,
}

impl SqlCommand {
    fn new(text: impl Into<String>, destructive: bool) -> Self {
        Self {
            text: text.into(),
            destructive,
        }
    }
}

/// Applies commands to a backend.
///
/// Implementations must apply commands in the order given and report
/// the first failure; the orchestrator stops at the failed command and
/// surfaces a partial-migration error.
pub trait CommandExecutor: Send + Sync {
    fn execute(&self, connection: &str, command: &SqlCommand) -> Result<(), ExecuteError>;
}

/// Lowers migration operations into DDL commands.
#[derive(Debug, Default)]
pub struct CommandGenerator;

impl CommandGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Generate commands for an ordered operation list.
    ///
    /// One operation produces at most one command; metadata-only
    /// operations lower to none. The ordering the differ established
    /// is preserved.
    pub fn generate(&self, operations: &[MigrationOperation]) -> Vec<SqlCommand> {
        operations.iter().filter_map(|op| self.lower(op)).collect()
    }

    fn lower(&self, op: &MigrationOperation) -> Option<SqlCommand> {
        let command = match op {
            MigrationOperation::CreateTable { table } => {
                SqlCommand::new(render_create_table(table), false)
            }
            MigrationOperation::DropTable { table } => {
                SqlCommand::new(format!("DROP TABLE \"{table}\""), true)
            }
            MigrationOperation::AddColumn { table, column } => SqlCommand::new(
                format!(
                    "ALTER TABLE \"{table}\" ADD COLUMN {}",
                    render_column(column)
                ),
                false,
            ),
            MigrationOperation::DropColumn { table, column } => SqlCommand::new(
                format!("ALTER TABLE \"{table}\" DROP COLUMN \"{column}\""),
                true,
            ),
            MigrationOperation::AlterColumn { table, column, .. } => SqlCommand::new(
                format!(
                    "ALTER TABLE \"{table}\" ALTER COLUMN {}",
                    render_column(column)
                ),
                false,
            ),
            MigrationOperation::AlterPrimaryKey {
                table,
                primary_key,
                previous,
            } => SqlCommand::new(
                render_alter_primary_key(table, primary_key, previous),
                primary_key.is_empty(),
            ),
            // Column order and shard participation live in the snapshot
            // only; there is no backend counterpart.
            MigrationOperation::AlterTable { .. } => return None,
            MigrationOperation::CreateIndex { index } => {
                SqlCommand::new(render_create_index(index), false)
            }
            MigrationOperation::DropIndex { index, table } => SqlCommand::new(
                format!("DROP INDEX \"{index}\" ON \"{table}\""),
                true,
            ),
            MigrationOperation::AddForeignKey { foreign_key } => {
                SqlCommand::new(render_add_foreign_key(foreign_key), false)
            }
            MigrationOperation::DropForeignKey { foreign_key, table } => SqlCommand::new(
                format!("ALTER TABLE \"{table}\" DROP CONSTRAINT \"{foreign_key}\""),
                true,
            ),
        };
        Some(command)
    }
}

fn render_create_table(table: &TableDef) -> String {
    let mut parts: Vec<String> = table.columns.iter().map(render_column).collect();
    if !table.primary_key.is_empty() {
        let cols: Vec<String> = table
            .primary_key
            .iter()
            .map(|c| format!("\"{c}\""))
            .collect();
        parts.push(format!("PRIMARY KEY ({})", cols.join(", ")));
    }
    format!("CREATE TABLE \"{}\" ({})", table.name, parts.join(", "))
}

fn render_column(column: &ColumnDef) -> String {
    let mut out = format!("\"{}\" {}", column.name, sql_type(column));
    if !column.nullable {
        out.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        out.push_str(" DEFAULT ");
        out.push_str(&render_default(default));
    }
    out
}

fn sql_type(column: &ColumnDef) -> String {
    match column.column_type {
        ColumnType::Boolean => "BOOLEAN".to_string(),
        ColumnType::Int32 => "INTEGER".to_string(),
        ColumnType::Int64 => "BIGINT".to_string(),
        ColumnType::Float64 => "DOUBLE PRECISION".to_string(),
        ColumnType::Decimal => "DECIMAL(18, 6)".to_string(),
        ColumnType::Text => match column.max_length {
            Some(len) => format!("VARCHAR({len})"),
            None => "TEXT".to_string(),
        },
        ColumnType::Bytes => "BLOB".to_string(),
        ColumnType::Uuid => "UUID".to_string(),
        ColumnType::DateTime => "TIMESTAMP".to_string(),
    }
}

fn render_default(default: &DefaultValue) -> String {
    match default {
        DefaultValue::Bool(v) => if *v { "TRUE" } else { "FALSE" }.to_string(),
        DefaultValue::Int(v) => v.to_string(),
        DefaultValue::Float(v) => v.to_string(),
        DefaultValue::Text(v) => format!("'{}'", v.replace('\'', "''")),
        DefaultValue::Expression(v) => v.clone(),
    }
}

fn render_alter_primary_key(table: &str, primary_key: &[String], previous: &[String]) -> String {
    let mut clauses = Vec::new();
    if !previous.is_empty() {
        clauses.push("DROP PRIMARY KEY".to_string());
    }
    if !primary_key.is_empty() {
        let cols: Vec<String> = primary_key.iter().map(|c| format!("\"{c}\"")).collect();
        clauses.push(format!("ADD PRIMARY KEY ({})", cols.join(", ")));
    }
    format!("ALTER TABLE \"{table}\" {}", clauses.join(", "))
}

fn render_create_index(index: &IndexDef) -> String {
    let cols: Vec<String> = index.columns.iter().map(|c| format!("\"{c}\"")).collect();
    let unique = if index.unique { "UNIQUE " } else { "" };
    format!(
        "CREATE {unique}INDEX \"{}\" ON \"{}\" ({})",
        index.name,
        index.table,
        cols.join(", ")
    )
}

fn render_add_foreign_key(fk: &ForeignKeyDef) -> String {
    let cols: Vec<String> = fk.columns.iter().map(|c| format!("\"{c}\"")).collect();
    let ref_cols: Vec<String> = fk
        .referenced_columns
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect();
    let action = match fk.on_delete {
        ReferentialAction::NoAction => "NO ACTION",
        ReferentialAction::Cascade => "CASCADE",
        ReferentialAction::SetNull => "SET NULL",
    };
    format!(
        "ALTER TABLE \"{}\" ADD CONSTRAINT \"{}\" FOREIGN KEY ({}) REFERENCES \"{}\" ({}) ON DELETE {action}",
        fk.table,
        fk.name,
        cols.join(", "),
        fk.referenced_table,
        ref_cols.join(", ")
    )
}

/// Records executed commands instead of applying them.
///
/// Can be configured to fail at a given command index to exercise
/// partial-failure paths.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    executed: Mutex<Vec<(String, SqlCommand)>>,
    fail_at: Mutex<Option<usize>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the nth executed command (zero-based) with a command error.
    pub fn fail_at(&self, index: usize) {
        *self.fail_at.lock() = Some(index);
    }

    /// Snapshot of every command executed so far.
    pub fn executed(&self) -> Vec<(String, SqlCommand)> {
        self.executed.lock().clone()
    }

    /// Number of commands executed so far.
    pub fn executed_count(&self) -> usize {
        self.executed.lock().len()
    }
}

impl CommandExecutor for RecordingExecutor {
    fn execute(&self, connection: &str, command: &SqlCommand) -> Result<(), ExecuteError> {
        let mut executed = self.executed.lock();
        if let Some(fail_index) = *self.fail_at.lock() {
            if executed.len() == fail_index {
                return Err(ExecuteError::Command {
                    reason: format!("injected failure at command {fail_index}"),
                });
            }
        }
        executed.push((connection.to_string(), command.clone()));
        Ok(())
    }
}
