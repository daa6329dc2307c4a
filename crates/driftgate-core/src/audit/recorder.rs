//! Change-set capture into audit records.

use super::record::{AuditPropertyRecord, AuditRecord};
use crate::changeset::{ChangeSet, EntityEntry, EntityState, PropertyEntry};
use crate::clock::Clock;
use crate::ids::IdGenerator;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Actor attributed when an entity carries no stamp at all.
pub const SYSTEM_ACTOR: &str = "system";

/// Audit capture errors. Always isolated to the offending entry; a
/// failed entry is skipped and the rest of the change set is captured.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The entry has no usable key property.
    #[error("entity '{entity_name}' has no resolvable key")]
    MissingKey { entity_name: String },
}

/// Turns change sets into audit records.
///
/// Capture never fails the surrounding unit of work: entries that
/// cannot be audited are logged and dropped.
pub struct AuditRecorder {
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl AuditRecorder {
    pub fn new(ids: Arc<dyn IdGenerator>, clock: Arc<dyn Clock>) -> Self {
        Self { ids, clock }
    }

    /// Capture a change set into audit records. Entries flagged as not
    /// audited are never captured.
    pub fn capture(&self, change_set: &ChangeSet) -> Vec<AuditRecord> {
        change_set
            .entries
            .iter()
            .filter(|entry| entry.audited)
            .filter_map(|entry| match self.capture_entry(entry) {
                Ok(record) => record,
                Err(e) => {
                    warn!(entity = %entry.entity_name, error = %e, "skipping unauditable entry");
                    None
                }
            })
            .collect()
    }

    /// Actor/time fallback chain: update stamp for modifications,
    /// then creation stamp, then the ambient clock and the system
    /// identity.
    fn resolve_stamp(&self, entry: &EntityEntry) -> (String, DateTime<Utc>) {
        if entry.state == EntityState::Modified {
            if let Some(stamp) = &entry.updated_by {
                return (stamp.actor.clone(), stamp.at);
            }
        }
        if let Some(stamp) = &entry.created_by {
            return (stamp.actor.clone(), stamp.at);
        }
        debug!(
            entity = %entry.entity_name,
            "entity carries no actor stamp, attributing to system"
        );
        (SYSTEM_ACTOR.to_string(), self.clock.now())
    }

    fn capture_entry(&self, entry: &EntityEntry) -> Result<Option<AuditRecord>, AuditError> {
        let entity_key = resolve_key(entry)?;
        let (created_by, created_at) = self.resolve_stamp(entry);

        let properties: Vec<AuditPropertyRecord> = entry
            .properties
            .iter()
            .filter(|p| !p.is_concurrency_token)
            .filter_map(|p| capture_property(entry.state, p))
            .collect();

        // A modification where nothing but tokens changed is not worth
        // a record.
        if entry.state == EntityState::Modified && properties.is_empty() {
            return Ok(None);
        }

        Ok(Some(AuditRecord {
            id: self.ids.next_id(),
            entity_name: entry.entity_name.clone(),
            type_name: entry.type_name.clone(),
            entity_key,
            state: entry.state,
            created_by,
            created_at,
            properties,
        }))
    }
}

/// Render the entity key from its key properties.
///
/// Deleted entities only have original values; everything else prefers
/// the current value.
fn resolve_key(entry: &EntityEntry) -> Result<String, AuditError> {
    let parts: Vec<&str> = entry
        .properties
        .iter()
        .filter(|p| p.is_key)
        .filter_map(|p| {
            if entry.state == EntityState::Deleted {
                p.original.as_deref().or(p.current.as_deref())
            } else {
                p.current.as_deref().or(p.original.as_deref())
            }
        })
        .collect();

    if parts.is_empty() {
        return Err(AuditError::MissingKey {
            entity_name: entry.entity_name.clone(),
        });
    }
    Ok(parts.join(","))
}

fn capture_property(state: EntityState, property: &PropertyEntry) -> Option<AuditPropertyRecord> {
    match state {
        EntityState::Added => property.current.as_ref().map(|current| AuditPropertyRecord {
            name: property.name.clone(),
            type_name: property.type_name.clone(),
            old_value: None,
            new_value: Some(current.clone()),
        }),
        EntityState::Deleted => property.original.as_ref().map(|original| AuditPropertyRecord {
            name: property.name.clone(),
            type_name: property.type_name.clone(),
            old_value: Some(original.clone()),
            new_value: None,
        }),
        EntityState::Modified => {
            if property.original == property.current {
                return None;
            }
            Some(AuditPropertyRecord {
                name: property.name.clone(),
                type_name: property.type_name.clone(),
                old_value: property.original.clone(),
                new_value: property.current.clone(),
            })
        }
    }
}
