//! Append-only audit trail for delegation lifecycle and check decisions.
//!
//! Every lifecycle transition and every check outcome produces exactly one
//! [`AuditEvent`]. Events are never mutated or deleted by this subsystem;
//! downstream consumers (log stores, alerting) subscribe via the broadcast
//! channel exposed by [`InMemoryAuditLog`].

mod errors;
mod model;
mod recorder;

pub use errors::AuditError;
pub use model::{AuditEvent, AuditEventKind};
pub use recorder::{AuditRecorder, InMemoryAuditLog};
