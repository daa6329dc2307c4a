//! Operation filtering.
//!
//! Operations that are structurally correct in isolation can still be
//! invalid in execution context. The filter drops:
//!
//! - index creation on tables flagged shardable, because the parallel
//!   shard-table bootstrap creates those indexes itself;
//! - whole batches whose operation-set hash matches an entry in the
//!   idempotency cache, protecting a retry from duplicate-object errors
//!   when a previous run executed the batch but failed to persist.

use super::operation::MigrationOperation;
use crate::model::SchemaModel;
use dashmap::DashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Filter errors. Never fatal: the orchestrator falls back to the
/// unfiltered operation list when hashing fails.
#[derive(Debug, Error)]
pub enum FilterError {
    /// The operation set could not be hashed.
    #[error("operation set hash failed: {0}")]
    Hash(String),
}

/// Filters generated operations against known-invalid and
/// already-executed cases.
///
/// The idempotency cache is process-wide and keyed by accessor name.
/// Entries are written after a batch executes and cleared once a unit
/// of work for the accessor completes persistence.
#[derive(Debug, Default)]
pub struct OperationFilter {
    executed: DashMap<String, String>,
}

impl OperationFilter {
    /// Create an empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash an operation set for idempotency tracking.
    pub fn operation_set_hash(operations: &[MigrationOperation]) -> Result<String, FilterError> {
        let rendered =
            serde_json::to_string(operations).map_err(|e| FilterError::Hash(e.to_string()))?;
        Ok(hex::encode(blake3::hash(rendered.as_bytes()).as_bytes()))
    }

    /// Apply the filter.
    ///
    /// Returns the surviving operations and the operation-set hash of
    /// the incoming batch (when it could be computed).
    pub fn apply(
        &self,
        accessor: &str,
        operations: Vec<MigrationOperation>,
        model: &SchemaModel,
    ) -> (Vec<MigrationOperation>, Option<String>) {
        let set_hash = match Self::operation_set_hash(&operations) {
            Ok(hash) => hash,
            Err(e) => {
                warn!(accessor, error = %e, "operation hashing failed, passing batch unfiltered");
                return (operations, None);
            }
        };

        if let Some(entry) = self.executed.get(accessor) {
            if *entry.value() == set_hash {
                info!(
                    accessor,
                    operations = operations.len(),
                    "batch already executed, discarding operations"
                );
                return (Vec::new(), Some(set_hash));
            }
        }

        let surviving: Vec<MigrationOperation> = operations
            .into_iter()
            .filter(|op| {
                if let MigrationOperation::CreateIndex { index } = op {
                    let shardable = model
                        .get_table(&index.table)
                        .map(|t| t.shardable)
                        .unwrap_or(false);
                    if shardable {
                        debug!(
                            index = %index.name,
                            table = %index.table,
                            "dropping index creation on shardable table"
                        );
                        return false;
                    }
                }
                true
            })
            .collect();

        (surviving, Some(set_hash))
    }

    /// Record that a batch with the given hash executed for the accessor.
    pub fn mark_executed(&self, accessor: &str, set_hash: &str) {
        self.executed
            .insert(accessor.to_string(), set_hash.to_string());
    }

    /// Clear the idempotency entry for an accessor. Called when a unit
    /// of work completes persistence.
    pub fn clear(&self, accessor: &str) {
        self.executed.remove(accessor);
    }

    /// Whether an entry exists for the accessor.
    pub fn has_entry(&self, accessor: &str) -> bool {
        self.executed.contains_key(accessor)
    }
}
