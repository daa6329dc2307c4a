//! Sled-backed migration store.

use super::{MigrationRecord, MigrationStore, StoreError};
use crate::audit::AuditRecord;
use sled::{Db, Tree};

/// Tree name for migration records.
const MIGRATION_TREE: &str = "migrations";

/// Tree name for audit records.
const AUDIT_TREE: &str = "audits";

/// Durable store on a sled database.
///
/// Migration keys are `accessor \0 created_at_micros_be id` so a prefix
/// scan over the accessor yields records in creation order; audit keys
/// follow the same layout with the entity type as prefix.
pub struct SledStore {
    _db: Db,
    migration_tree: Tree,
    audit_tree: Tree,
}

impl SledStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, StoreError> {
        let db = sled::Config::new()
            .path(path)
            .use_compression(true)
            .open()?;
        let migration_tree = db.open_tree(MIGRATION_TREE)?;
        let audit_tree = db.open_tree(AUDIT_TREE)?;

        Ok(Self {
            _db: db,
            migration_tree,
            audit_tree,
        })
    }

    fn scoped_key(scope: &str, at_micros: u64, id: &[u8; 16]) -> Vec<u8> {
        let mut key = Vec::with_capacity(scope.len() + 1 + 8 + 16);
        key.extend_from_slice(scope.as_bytes());
        key.push(0);
        key.extend_from_slice(&at_micros.to_be_bytes());
        key.extend_from_slice(id);
        key
    }

    fn scope_prefix(scope: &str) -> Vec<u8> {
        let mut prefix = Vec::with_capacity(scope.len() + 1);
        prefix.extend_from_slice(scope.as_bytes());
        prefix.push(0);
        prefix
    }
}

impl MigrationStore for SledStore {
    fn insert_migration(&self, record: &MigrationRecord) -> Result<(), StoreError> {
        let at_micros = record.created_at.timestamp_micros().max(0) as u64;
        let key = Self::scoped_key(&record.accessor_name, at_micros, &record.id);
        let value = serde_json::to_vec(record)?;
        self.migration_tree.insert(key, value)?;
        self.migration_tree.flush()?;
        Ok(())
    }

    fn latest_migration(&self, accessor: &str) -> Result<Option<MigrationRecord>, StoreError> {
        let prefix = Self::scope_prefix(accessor);
        match self.migration_tree.scan_prefix(&prefix).last() {
            Some(entry) => {
                let (_, value) = entry?;
                Ok(Some(serde_json::from_slice(&value)?))
            }
            None => Ok(None),
        }
    }

    fn list_migrations(&self, accessor: &str) -> Result<Vec<MigrationRecord>, StoreError> {
        let prefix = Self::scope_prefix(accessor);
        let mut records = Vec::new();
        for entry in self.migration_tree.scan_prefix(&prefix) {
            let (_, value) = entry?;
            records.push(serde_json::from_slice(&value)?);
        }
        Ok(records)
    }

    fn insert_audit(&self, record: &AuditRecord) -> Result<(), StoreError> {
        let at_micros = record.created_at.timestamp_micros().max(0) as u64;
        let key = Self::scoped_key(&record.entity_name, at_micros, &record.id);
        let value = serde_json::to_vec(record)?;
        self.audit_tree.insert(key, value)?;
        self.audit_tree.flush()?;
        Ok(())
    }

    fn list_audits(&self, entity_name: &str) -> Result<Vec<AuditRecord>, StoreError> {
        let prefix = Self::scope_prefix(entity_name);
        let mut records = Vec::new();
        for entry in self.audit_tree.scan_prefix(&prefix) {
            let (_, value) = entry?;
            records.push(serde_json::from_slice(&value)?);
        }
        Ok(records)
    }
}
