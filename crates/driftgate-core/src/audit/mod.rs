//! Audit capture.
//!
//! Converts tracked change sets into durable audit records: one record
//! per audited entity write, with per-property before/after values and
//! an actor/time attribution resolved from the change set's stamps.

pub mod record;
pub mod recorder;

pub use record::{AuditPropertyRecord, AuditRecord};
pub use recorder::{AuditError, AuditRecorder, SYSTEM_ACTOR};
