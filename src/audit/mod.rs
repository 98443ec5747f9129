//! Append-only audit trail of system and job outcomes
//!
//! Handlers write through [`AuditSink`], which never lets an audit failure
//! fail the job that produced it.

mod record;
mod sink;
mod store;

pub use record::{AuditAction, AuditEntry, AuditRecord, ResourceType};
pub use sink::AuditSink;
pub use store::{AuditStore, InMemoryAuditStore};
