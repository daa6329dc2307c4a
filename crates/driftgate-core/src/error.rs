//! Engine-level error taxonomy.

use crate::migrate::{DiffError, ExecuteError};
use crate::snapshot::SnapshotError;
use crate::store::StoreError;
use thiserror::Error;

/// Errors surfaced by a migration run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Snapshot compilation failed.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// The differ found a structurally invalid model.
    #[error("diff error: {0}")]
    Diff(#[from] DiffError),

    /// The migration store rejected a read or write.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Execution stopped partway through a command batch.
    ///
    /// Commands before `applied` succeeded and are not rolled back.
    #[error("migration for '{accessor}' failed at command {applied}: {source}")]
    PartialMigration {
        accessor: String,
        /// Commands that executed before the failure.
        applied: usize,
        /// The command that failed.
        failed: String,
        source: ExecuteError,
    },

    /// The run was cancelled between commands.
    #[error("migration cancelled after {commands_applied} commands")]
    Cancelled { commands_applied: usize },
}
