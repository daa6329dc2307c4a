//! Change sets - the tracked-entity input to audit capture.
//!
//! A change set describes what a unit of work is about to write:
//! one entry per tracked entity, each carrying its state transition,
//! per-property before/after values, and whatever actor stamps the
//! entity exposes. The audit recorder turns a change set into durable
//! audit records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The lifecycle transition a tracked entity is undergoing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityState {
    Added,
    Modified,
    Deleted,
}

/// A single tracked property with its before and after values.
///
/// Values are pre-rendered to text by the caller; the engine compares
/// and stores them opaquely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyEntry {
    /// Property name.
    pub name: String,
    /// Property data type name, when the caller knows it.
    pub type_name: Option<String>,
    /// Value before the write, absent for added entities.
    pub original: Option<String>,
    /// Value after the write, absent for deleted entities.
    pub current: Option<String>,
    /// Whether this property is a concurrency token. Token churn is
    /// bookkeeping, not a data change, and is never audited.
    pub is_concurrency_token: bool,
    /// Whether this property participates in the entity key.
    pub is_key: bool,
}

impl PropertyEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: None,
            original: None,
            current: None,
            is_concurrency_token: false,
            is_key: false,
        }
    }

    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn original(mut self, value: impl Into<String>) -> Self {
        self.original = Some(value.into());
        self
    }

    pub fn current(mut self, value: impl Into<String>) -> Self {
        self.current = Some(value.into());
        self
    }

    pub fn concurrency_token(mut self) -> Self {
        self.is_concurrency_token = true;
        self
    }

    pub fn key(mut self) -> Self {
        self.is_key = true;
        self
    }
}

/// Who performed a write and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorStamp {
    pub actor: String,
    pub at: DateTime<Utc>,
}

/// One tracked entity inside a change set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityEntry {
    /// Logical entity name, e.g. `"User"`.
    pub entity_name: String,
    /// Full type name, e.g. `"Domain.Entities.User"`. Defaults to the
    /// logical name.
    pub type_name: String,
    /// State transition this entry represents.
    pub state: EntityState,
    /// Whether the entity type participates in auditing at all.
    pub audited: bool,
    /// Tracked properties, keys included.
    pub properties: Vec<PropertyEntry>,
    /// Update stamp, when the entity exposes update metadata.
    pub updated_by: Option<ActorStamp>,
    /// Creation stamp, when the entity exposes creation metadata.
    pub created_by: Option<ActorStamp>,
}

impl EntityEntry {
    pub fn new(entity_name: impl Into<String>, state: EntityState) -> Self {
        let entity_name = entity_name.into();
        Self {
            type_name: entity_name.clone(),
            entity_name,
            state,
            audited: true,
            properties: Vec::new(),
            updated_by: None,
            created_by: None,
        }
    }

    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = type_name.into();
        self
    }

    /// Exclude this entity type from audit capture entirely.
    pub fn not_audited(mut self) -> Self {
        self.audited = false;
        self
    }

    pub fn with_property(mut self, property: PropertyEntry) -> Self {
        self.properties.push(property);
        self
    }

    pub fn updated_by(mut self, actor: impl Into<String>, at: DateTime<Utc>) -> Self {
        self.updated_by = Some(ActorStamp {
            actor: actor.into(),
            at,
        });
        self
    }

    pub fn created_by(mut self, actor: impl Into<String>, at: DateTime<Utc>) -> Self {
        self.created_by = Some(ActorStamp {
            actor: actor.into(),
            at,
        });
        self
    }
}

/// The full set of pending writes for one unit of work.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Tracked entities in the order the caller enumerated them.
    pub entries: Vec<EntityEntry>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, entry: EntityEntry) -> Self {
        self.entries.push(entry);
        self
    }
}
