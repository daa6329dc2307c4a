//! The engine facade.
//!
//! Wires the orchestrator, tenant resolver, audit recorder, and store
//! behind one entry point. Library users construct a
//! [`MigrationEngine`] once per process and call [`migrate`] per
//! accessor and [`record_audits`] per unit of work.
//!
//! [`migrate`]: MigrationEngine::migrate
//! [`record_audits`]: MigrationEngine::record_audits

use crate::audit::AuditRecorder;
use crate::cancel::CancelToken;
use crate::changeset::ChangeSet;
use crate::clock::{Clock, SystemClock};
use crate::error::EngineError;
use crate::ids::{GeneratedIds, IdGenerator};
use crate::migrate::{CommandExecutor, MigrationAspect, MigrationOrchestrator, MigrationOutcome};
use crate::model::SchemaModel;
use crate::store::MigrationStore;
use crate::tenant::{ConnectionKind, TenantDescriptor, TenantResolver};
use std::sync::Arc;
use tracing::warn;

/// Engine construction parameters.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Connection string for the host (non-tenant) database.
    pub host_connection: String,
    /// Actor persisted migration records are attributed to.
    pub actor: String,
}

impl EngineConfig {
    pub fn new(host_connection: impl Into<String>) -> Self {
        Self {
            host_connection: host_connection.into(),
            actor: crate::audit::SYSTEM_ACTOR.to_string(),
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }
}

/// Builds [`MigrationEngine`] instances.
pub struct EngineBuilder {
    config: EngineConfig,
    store: Arc<dyn MigrationStore>,
    executor: Arc<dyn CommandExecutor>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    aspects: Vec<Arc<dyn MigrationAspect>>,
}

impl EngineBuilder {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn MigrationStore>,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        Self {
            config,
            store,
            executor,
            ids: Arc::new(GeneratedIds::new()),
            clock: Arc::new(SystemClock),
            aspects: Vec::new(),
        }
    }

    /// Override the id generator.
    pub fn ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Override the time source.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Register a migration aspect.
    pub fn aspect(mut self, aspect: Arc<dyn MigrationAspect>) -> Self {
        self.aspects.push(aspect);
        self
    }

    pub fn build(self) -> MigrationEngine {
        let mut orchestrator = MigrationOrchestrator::new(
            self.store.clone(),
            self.executor,
            self.ids.clone(),
            self.clock.clone(),
        )
        .with_actor(self.config.actor.clone());
        for aspect in self.aspects {
            orchestrator = orchestrator.with_aspect(aspect);
        }

        MigrationEngine {
            orchestrator,
            recorder: AuditRecorder::new(self.ids, self.clock),
            resolver: TenantResolver::new(self.config.host_connection),
            store: self.store,
        }
    }
}

/// The schema migration and audit engine.
pub struct MigrationEngine {
    orchestrator: MigrationOrchestrator,
    recorder: AuditRecorder,
    resolver: TenantResolver,
    store: Arc<dyn MigrationStore>,
}

impl MigrationEngine {
    /// Migrate an accessor to the given model over the tenant's
    /// writing connection.
    pub fn migrate(
        &self,
        accessor: &str,
        model: &SchemaModel,
        tenant: Option<&TenantDescriptor>,
        cancel: &CancelToken,
    ) -> Result<MigrationOutcome, EngineError> {
        self.migrate_on(accessor, model, tenant, ConnectionKind::Writing, cancel)
    }

    /// Migrate over a specific connection kind.
    ///
    /// The active connection is request-scoped input: a unit of work
    /// bound to a read-only connection passes
    /// [`ConnectionKind::Default`] and is gated accordingly.
    pub fn migrate_on(
        &self,
        accessor: &str,
        model: &SchemaModel,
        tenant: Option<&TenantDescriptor>,
        kind: ConnectionKind,
        cancel: &CancelToken,
    ) -> Result<MigrationOutcome, EngineError> {
        let connection = self.resolver.resolve(tenant, kind);
        self.orchestrator.run(accessor, model, &connection, cancel)
    }

    /// Capture a change set and persist the resulting audit records.
    ///
    /// Fully best-effort: a record that fails to persist is logged and
    /// dropped. Returns how many records were persisted.
    pub fn record_audits(&self, change_set: &ChangeSet) -> usize {
        let mut persisted = 0;
        for record in self.recorder.capture(change_set) {
            match self.store.insert_audit(&record) {
                Ok(()) => persisted += 1,
                Err(e) => {
                    warn!(entity = %record.entity_name, error = %e, "audit record not persisted");
                }
            }
        }
        persisted
    }
}
