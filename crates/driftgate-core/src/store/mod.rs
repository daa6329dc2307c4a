//! Migration and audit persistence.
//!
//! The engine persists one migration record per applied unit of work
//! and audit records as they are captured. [`MemoryStore`] backs tests
//! and ephemeral runs; [`SledStore`] is the durable implementation.

mod sled_store;

pub use sled_store::SledStore;

use crate::audit::AuditRecord;
use crate::ids::RecordId;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Persistence errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying database failed.
    #[error("storage error: {0}")]
    Backend(#[from] sled::Error),
    /// A stored record could not be encoded or decoded.
    #[error("record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Injected or synthetic write failure.
    #[error("write rejected: {0}")]
    WriteRejected(String),
}

/// The durable shape of one applied migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// Record identifier.
    pub id: RecordId,
    /// Accessor the migration ran for.
    pub accessor_name: String,
    /// Snapshot document format identifier.
    pub snapshot_type_name: String,
    /// Compressed snapshot body.
    pub snapshot_body: Vec<u8>,
    /// Content hash of the snapshotted model.
    pub snapshot_hash: String,
    /// Actor the migration is attributed to.
    pub created_by: String,
    /// When the migration was persisted.
    pub created_at: DateTime<Utc>,
}

/// Persistence seam for migration and audit records.
pub trait MigrationStore: Send + Sync {
    /// Persist a migration record.
    fn insert_migration(&self, record: &MigrationRecord) -> Result<(), StoreError>;

    /// The most recently persisted migration for an accessor.
    fn latest_migration(&self, accessor: &str) -> Result<Option<MigrationRecord>, StoreError>;

    /// All migrations for an accessor, oldest first.
    fn list_migrations(&self, accessor: &str) -> Result<Vec<MigrationRecord>, StoreError>;

    /// Persist an audit record.
    fn insert_audit(&self, record: &AuditRecord) -> Result<(), StoreError>;

    /// All audit records for an entity, oldest first.
    fn list_audits(&self, entity_name: &str) -> Result<Vec<AuditRecord>, StoreError>;
}

/// In-memory store for tests and ephemeral runs.
///
/// Supports write-failure injection so persistence-failure paths can
/// be exercised.
#[derive(Default)]
pub struct MemoryStore {
    migrations: RwLock<Vec<MigrationRecord>>,
    audits: RwLock<Vec<AuditRecord>>,
    fail_writes: RwLock<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail.
    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.write() = fail;
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if *self.fail_writes.read() {
            return Err(StoreError::WriteRejected("injected failure".to_string()));
        }
        Ok(())
    }
}

impl MigrationStore for MemoryStore {
    fn insert_migration(&self, record: &MigrationRecord) -> Result<(), StoreError> {
        self.check_writable()?;
        self.migrations.write().push(record.clone());
        Ok(())
    }

    fn latest_migration(&self, accessor: &str) -> Result<Option<MigrationRecord>, StoreError> {
        Ok(self
            .migrations
            .read()
            .iter()
            .filter(|r| r.accessor_name == accessor)
            .max_by_key(|r| (r.created_at, r.id))
            .cloned())
    }

    fn list_migrations(&self, accessor: &str) -> Result<Vec<MigrationRecord>, StoreError> {
        let mut records: Vec<MigrationRecord> = self
            .migrations
            .read()
            .iter()
            .filter(|r| r.accessor_name == accessor)
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.created_at, r.id));
        Ok(records)
    }

    fn insert_audit(&self, record: &AuditRecord) -> Result<(), StoreError> {
        self.check_writable()?;
        self.audits.write().push(record.clone());
        Ok(())
    }

    fn list_audits(&self, entity_name: &str) -> Result<Vec<AuditRecord>, StoreError> {
        let mut records: Vec<AuditRecord> = self
            .audits
            .read()
            .iter()
            .filter(|r| r.entity_name == entity_name)
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.created_at, r.id));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(accessor: &str, seq: u8, hash: &str) -> MigrationRecord {
        let mut id = [0u8; 16];
        id[15] = seq;
        MigrationRecord {
            id,
            accessor_name: accessor.to_string(),
            snapshot_type_name: "driftgate.schema-snapshot.v1".to_string(),
            snapshot_body: vec![1, 2, 3],
            snapshot_hash: hash.to_string(),
            created_by: "system".to_string(),
            created_at: Utc
                .with_ymd_and_hms(2024, 5, 1, 12, 0, u32::from(seq))
                .unwrap(),
        }
    }

    #[test]
    fn test_latest_migration_per_accessor() {
        let store = MemoryStore::new();
        store.insert_migration(&record("default", 1, "aaa")).unwrap();
        store.insert_migration(&record("default", 2, "bbb")).unwrap();
        store.insert_migration(&record("reporting", 3, "ccc")).unwrap();

        let latest = store.latest_migration("default").unwrap().unwrap();
        assert_eq!(latest.snapshot_hash, "bbb");
        assert_eq!(store.list_migrations("default").unwrap().len(), 2);
        assert!(store.latest_migration("missing").unwrap().is_none());
    }

    #[test]
    fn test_write_failure_injection() {
        let store = MemoryStore::new();
        store.fail_writes(true);
        let err = store.insert_migration(&record("default", 1, "aaa"));
        assert!(matches!(err, Err(StoreError::WriteRejected(_))));

        store.fail_writes(false);
        assert!(store.insert_migration(&record("default", 1, "aaa")).is_ok());
    }
}
