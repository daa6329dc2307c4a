//! Durable audit record shapes.

use crate::changeset::EntityState;
use crate::ids::RecordId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One audited entity write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Record identifier.
    pub id: RecordId,
    /// Logical entity name.
    pub entity_name: String,
    /// Full type name of the audited entity.
    pub type_name: String,
    /// Rendered key of the audited entity.
    pub entity_key: String,
    /// The state transition that was audited.
    pub state: EntityState,
    /// Actor the write is attributed to.
    pub created_by: String,
    /// When the write happened.
    pub created_at: DateTime<Utc>,
    /// Per-property value changes.
    pub properties: Vec<AuditPropertyRecord>,
}

/// One property change inside an audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditPropertyRecord {
    /// Property name.
    pub name: String,
    /// Property data type name, when known.
    pub type_name: Option<String>,
    /// Value before the write.
    pub old_value: Option<String>,
    /// Value after the write.
    pub new_value: Option<String>,
}
