//! Authorization gateway between agents and their tools.
//!
//! Every tool invocation passes through [`ToolGate::invoke`]:
//! - the target resource and required access level are derived from the
//!   call arguments by the tool's pure extraction rule,
//! - the (possibly cached) authorization check runs,
//! - only an `Allow` lets the wrapped tool execute — its side effects never
//!   occur on denial.
//!
//! Denials surface as [`GateError::Unauthorized`] carrying the audit
//! reason; a backend outage surfaces as [`GateError::Unavailable`] so
//! callers can tell the two apart.

mod errors;
mod gate;
mod types;

pub use errors::{GateError, ToolError};
pub use gate::ToolGate;
pub use types::{DeniedCheck, Tool};
