//! Tenant and connection resolution.
//!
//! The engine can serve multiple tenants, each with its own connection
//! strings and sync policy. The resolver picks the concrete connection
//! a unit of work runs against; the orchestrator consults the resolved
//! flags to decide whether structural changes may run at all.

use serde::{Deserialize, Serialize};

/// Which of a tenant's connections the current unit of work is using.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    /// The tenant's default connection.
    Default,
    /// The dedicated writing connection.
    Writing,
}

/// A tenant and its connection configuration.
///
/// Descriptors are configuration-owned and resolved fresh per unit of
/// work; the resolver never caches them across requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantDescriptor {
    /// Stable tenant name.
    pub name: String,
    /// Host the tenant's databases live on.
    pub host: String,
    /// Default connection string.
    pub default_connection: String,
    /// Dedicated writing connection string. When writing separation is
    /// disabled this is treated as identical to the default.
    pub writing_connection: String,
    /// Whether reads and writes are split across connections.
    pub writing_separation_enabled: bool,
    /// Whether structural changes may run against non-writing
    /// connections of this tenant.
    pub structure_sync_enabled: bool,
    /// Whether seeded data changes may run against non-writing
    /// connections of this tenant.
    pub data_sync_enabled: bool,
}

impl TenantDescriptor {
    pub fn new(name: impl Into<String>, default_connection: impl Into<String>) -> Self {
        let default_connection = default_connection.into();
        Self {
            name: name.into(),
            host: String::new(),
            writing_connection: default_connection.clone(),
            default_connection,
            writing_separation_enabled: false,
            structure_sync_enabled: true,
            data_sync_enabled: true,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Route writes through a dedicated connection.
    pub fn with_writing_connection(mut self, connection: impl Into<String>) -> Self {
        self.writing_connection = connection.into();
        self.writing_separation_enabled = true;
        self
    }

    pub fn structure_sync(mut self, enabled: bool) -> Self {
        self.structure_sync_enabled = enabled;
        self
    }

    pub fn data_sync(mut self, enabled: bool) -> Self {
        self.data_sync_enabled = enabled;
        self
    }
}

/// The connection a unit of work actually runs against.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConnection {
    /// Tenant the connection belongs to, absent for the host.
    pub tenant: Option<TenantDescriptor>,
    /// Concrete connection string.
    pub connection: String,
    /// Whether this connection is the tenant's writing connection.
    pub is_writing: bool,
    /// Tenant structure-sync flag, true for the host.
    pub structure_sync_enabled: bool,
    /// Tenant data-sync flag, true for the host.
    pub data_sync_enabled: bool,
}

/// Resolves the connection for a unit of work.
#[derive(Debug)]
pub struct TenantResolver {
    host_connection: String,
}

impl TenantResolver {
    pub fn new(host_connection: impl Into<String>) -> Self {
        Self {
            host_connection: host_connection.into(),
        }
    }

    /// Resolve a tenant (or the host, when `tenant` is `None`) to the
    /// connection of the requested kind.
    ///
    /// When writing separation is disabled the default and writing
    /// connections are identical, and every resolved connection counts
    /// as writing. With separation enabled, only
    /// [`ConnectionKind::Writing`] yields a writing connection.
    pub fn resolve(
        &self,
        tenant: Option<&TenantDescriptor>,
        kind: ConnectionKind,
    ) -> ResolvedConnection {
        match tenant {
            None => ResolvedConnection {
                tenant: None,
                connection: self.host_connection.clone(),
                is_writing: true,
                structure_sync_enabled: true,
                data_sync_enabled: true,
            },
            Some(tenant) => {
                let (connection, is_writing) = if !tenant.writing_separation_enabled {
                    (tenant.default_connection.clone(), true)
                } else {
                    match kind {
                        ConnectionKind::Writing => (tenant.writing_connection.clone(), true),
                        ConnectionKind::Default => (tenant.default_connection.clone(), false),
                    }
                };
                ResolvedConnection {
                    tenant: Some(tenant.clone()),
                    connection,
                    is_writing,
                    structure_sync_enabled: tenant.structure_sync_enabled,
                    data_sync_enabled: tenant.data_sync_enabled,
                }
            }
        }
    }
}
