//! Driftgate - schema migration and audit engine.
//!
//! Driftgate keeps a database's structure in sync with a declared
//! schema model. Each run compiles the model to a content-addressed
//! snapshot, diffs it against the last persisted snapshot, lowers the
//! difference into ordered DDL commands, and records the new snapshot
//! once the commands succeed. Alongside migration it captures tracked
//! change sets into per-property audit records.

pub mod audit;
pub mod cancel;
pub mod changeset;
pub mod clock;
pub mod engine;
pub mod error;
pub mod ids;
pub mod migrate;
pub mod model;
pub mod snapshot;
pub mod store;
pub mod tenant;

pub use audit::{AuditError, AuditPropertyRecord, AuditRecord, AuditRecorder, SYSTEM_ACTOR};
pub use cancel::CancelToken;
pub use changeset::{ActorStamp, ChangeSet, EntityEntry, EntityState, PropertyEntry};
pub use clock::{Clock, FixedClock, SystemClock};
pub use engine::{EngineBuilder, EngineConfig, MigrationEngine};
pub use error::EngineError;
pub use ids::{GeneratedIds, IdGenerator, RecordId, SequentialIds};
pub use migrate::{
    AspectContext, AspectOutcome, CommandExecutor, CommandGenerator, DiffError, ExecuteError,
    FilterError, MigrationAspect, MigrationOperation, MigrationOrchestrator, MigrationOutcome,
    ModelDiffer, OperationFilter, RecordingExecutor, SqlCommand,
};
pub use model::{
    ColumnDef, ColumnType, DefaultValue, ForeignKeyDef, IndexDef, ReferentialAction, SchemaModel,
    TableDef,
};
pub use snapshot::{CompiledSnapshot, SnapshotError, SNAPSHOT_TYPE_NAME};
pub use store::{MemoryStore, MigrationRecord, MigrationStore, SledStore, StoreError};
pub use tenant::{ConnectionKind, ResolvedConnection, TenantDescriptor, TenantResolver};
