//! Aspect hooks around migration execution.
//!
//! Aspects observe the orchestrator before commands run and after they
//! complete. They cannot veto a migration; an aspect that needs the
//! engine to persist a second time after post-processing signals it
//! through [`AspectOutcome::save_again`].

use super::operation::MigrationOperation;
use crate::tenant::TenantDescriptor;

/// Context handed to aspects around execution.
#[derive(Debug)]
pub struct AspectContext<'a> {
    /// Accessor the migration runs for.
    pub accessor: &'a str,
    /// Tenant the migration runs under, when tenant-scoped.
    pub tenant: Option<&'a TenantDescriptor>,
    /// The operations about to execute (before) or just executed (after).
    pub operations: &'a [MigrationOperation],
}

/// Result of an after-hook.
#[derive(Debug, Default)]
pub struct AspectOutcome {
    /// Request that the orchestrator persist the unit of work again.
    pub save_again: bool,
}

/// Hook invoked around command execution.
pub trait MigrationAspect: Send + Sync {
    /// Called before the first command executes.
    fn before(&self, _ctx: &AspectContext<'_>) {}

    /// Called after the last command executes.
    fn after(&self, _ctx: &AspectContext<'_>) -> AspectOutcome {
        AspectOutcome::default()
    }
}
