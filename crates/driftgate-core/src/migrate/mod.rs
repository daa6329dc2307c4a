//! Migration engine.
//!
//! This module provides:
//! - Structural diffing of two schema models into ordered operations
//! - Filtering of invalid or already-executed operations
//! - Lowering of operations into backend commands and serialized execution
//! - The orchestrator control loop with tenant gating and aspect hooks

pub mod aspect;
pub mod command;
pub mod diff;
pub mod filter;
pub mod operation;
pub mod orchestrator;

pub use aspect::{AspectContext, AspectOutcome, MigrationAspect};
pub use command::{CommandExecutor, CommandGenerator, ExecuteError, RecordingExecutor, SqlCommand};
pub use diff::{DiffError, ModelDiffer};
pub use filter::{FilterError, OperationFilter};
pub use operation::MigrationOperation;
pub use orchestrator::{MigrationOrchestrator, MigrationOutcome};
