//! The migration control loop.
//!
//! A run moves through a fixed sequence of stages: resolve the stored
//! snapshot, diff it against the requested model, filter the
//! operations, gate on the resolved connection, execute the surviving
//! commands, then persist a new snapshot record. Cancellation is
//! honored between stages and between individual commands, never
//! mid-command.

use super::aspect::{AspectContext, MigrationAspect};
use super::command::{CommandExecutor, CommandGenerator, SqlCommand};
use super::diff::ModelDiffer;
use super::filter::OperationFilter;
use super::operation::MigrationOperation;
use crate::audit::SYSTEM_ACTOR;
use crate::cancel::CancelToken;
use crate::clock::Clock;
use crate::error::EngineError;
use crate::ids::{IdGenerator, RecordId};
use crate::model::SchemaModel;
use crate::snapshot;
use crate::store::{MigrationRecord, MigrationStore};
use crate::tenant::ResolvedConnection;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

/// Serializes command execution and snapshot persistence across every
/// orchestrator in the process. Concurrent runs against the same
/// backend would interleave DDL otherwise, and two runs passing the
/// latest-hash recheck together would both persist a record.
static EXEC_LOCK: Mutex<()> = Mutex::new(());

/// What a migration run concluded.
#[derive(Debug)]
pub enum MigrationOutcome {
    /// The stored snapshot already matches the requested model.
    NoChange,
    /// The resolved connection is not allowed to alter structure. The
    /// operations that would have run are reported for diagnostics.
    SkippedReadOnly { operations: Vec<MigrationOperation> },
    /// Another run persisted an identical snapshot first.
    AlreadyApplied,
    /// Commands executed and a snapshot record was persisted.
    Applied {
        record_id: RecordId,
        operations: Vec<MigrationOperation>,
        commands: Vec<SqlCommand>,
        /// True when no prior snapshot existed and the whole model was
        /// treated as new.
        baseline: bool,
        /// True when an aspect requested a follow-up persist.
        save_again: bool,
    },
}

/// Drives migration runs end to end.
pub struct MigrationOrchestrator {
    store: Arc<dyn MigrationStore>,
    executor: Arc<dyn CommandExecutor>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    generator: CommandGenerator,
    filter: OperationFilter,
    aspects: Vec<Arc<dyn MigrationAspect>>,
    model_cache: DashMap<String, SchemaModel>,
    actor: String,
}

impl MigrationOrchestrator {
    pub fn new(
        store: Arc<dyn MigrationStore>,
        executor: Arc<dyn CommandExecutor>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            executor,
            ids,
            clock,
            generator: CommandGenerator::new(),
            filter: OperationFilter::new(),
            aspects: Vec::new(),
            model_cache: DashMap::new(),
            actor: SYSTEM_ACTOR.to_string(),
        }
    }

    /// Register an aspect. Aspects run in registration order.
    pub fn with_aspect(mut self, aspect: Arc<dyn MigrationAspect>) -> Self {
        self.aspects.push(aspect);
        self
    }

    /// Attribute persisted records to the given actor instead of the
    /// system default.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    /// Run a migration for one accessor.
    pub fn run(
        &self,
        accessor: &str,
        model: &SchemaModel,
        connection: &ResolvedConnection,
        cancel: &CancelToken,
    ) -> Result<MigrationOutcome, EngineError> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled {
                commands_applied: 0,
            });
        }

        let previous = self.resolve_snapshot(accessor)?;
        let baseline = previous.is_none();

        let operations = match &previous {
            Some(previous) => {
                let operations = ModelDiffer::diff(previous, model)?;
                if operations.is_empty() {
                    self.model_cache.insert(accessor.to_string(), model.clone());
                    return Ok(MigrationOutcome::NoChange);
                }
                operations
            }
            None => ModelDiffer::baseline(model)?,
        };

        let (operations, set_hash) = self.filter.apply(accessor, operations, model);

        // Non-writing connections may only run structural changes when
        // the tenant has structure synchronization enabled. Gated after
        // filtering so the skip reports what would actually have run.
        if !connection.is_writing && !connection.structure_sync_enabled {
            info!(
                accessor,
                operations = operations.len(),
                "connection may not alter structure, skipping migration"
            );
            return Ok(MigrationOutcome::SkippedReadOnly { operations });
        }

        let mut commands = Vec::new();
        let mut save_again = false;

        let _guard = EXEC_LOCK.lock();

        if !operations.is_empty() {
            let ctx = AspectContext {
                accessor,
                tenant: connection.tenant.as_ref(),
                operations: &operations,
            };
            for aspect in &self.aspects {
                aspect.before(&ctx);
            }

            commands = self.generator.generate(&operations);

            for (applied, command) in commands.iter().enumerate() {
                if cancel.is_cancelled() {
                    return Err(EngineError::Cancelled {
                        commands_applied: applied,
                    });
                }
                self.executor
                    .execute(&connection.connection, command)
                    .map_err(|source| EngineError::PartialMigration {
                        accessor: accessor.to_string(),
                        applied,
                        failed: command.text.clone(),
                        source,
                    })?;
            }

            if let Some(hash) = &set_hash {
                self.filter.mark_executed(accessor, hash);
            }

            for aspect in &self.aspects {
                save_again |= aspect.after(&ctx).save_again;
            }
        }

        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled {
                commands_applied: commands.len(),
            });
        }

        let compiled = snapshot::compile(model)?;

        // Another run may have persisted the same model between our
        // diff and now; persisting again would duplicate the record.
        if let Some(latest) = self.store.latest_migration(accessor)? {
            if latest.snapshot_hash == compiled.hash {
                self.filter.clear(accessor);
                self.model_cache.insert(accessor.to_string(), model.clone());
                return Ok(MigrationOutcome::AlreadyApplied);
            }
        }

        let record = MigrationRecord {
            id: self.ids.next_id(),
            accessor_name: accessor.to_string(),
            snapshot_type_name: compiled.type_name,
            snapshot_body: compiled.body,
            snapshot_hash: compiled.hash,
            created_by: self.actor.clone(),
            created_at: self.clock.now(),
        };
        self.store.insert_migration(&record)?;

        self.model_cache.insert(accessor.to_string(), model.clone());
        self.filter.clear(accessor);

        info!(
            accessor,
            operations = operations.len(),
            commands = commands.len(),
            baseline,
            "migration applied"
        );

        Ok(MigrationOutcome::Applied {
            record_id: record.id,
            operations,
            commands,
            baseline,
            save_again,
        })
    }

    /// Resolve the model the accessor was last migrated to.
    ///
    /// A snapshot that cannot be restored is treated as absent so the
    /// run falls back to the baseline path instead of failing.
    fn resolve_snapshot(&self, accessor: &str) -> Result<Option<SchemaModel>, EngineError> {
        if let Some(cached) = self.model_cache.get(accessor) {
            return Ok(Some(cached.value().clone()));
        }

        let Some(record) = self.store.latest_migration(accessor)? else {
            return Ok(None);
        };

        match snapshot::restore(&record.snapshot_body, &record.snapshot_type_name) {
            Ok(model) => Ok(Some(model)),
            Err(e) => {
                warn!(accessor, error = %e, "stored snapshot unusable, rebuilding from baseline");
                Ok(None)
            }
        }
    }
}
