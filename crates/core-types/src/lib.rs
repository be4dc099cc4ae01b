#![allow(dead_code)]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

/// Identifier of a task-scoped delegation from a user to an agent.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an agent receiving delegated authority.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the delegating principal.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a resource an agent may act on.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub String);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Access levels a grant may carry for a resource. Doubles as the relation
/// name written to the relationship backend.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Reader,
    Writer,
}

impl AccessLevel {
    /// Relation string used in backend tuples.
    pub fn relation(self) -> &'static str {
        match self {
            AccessLevel::Reader => "reader",
            AccessLevel::Writer => "writer",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.relation())
    }
}

/// Error returned when parsing an unknown access level name.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParseAccessLevelError(pub String);

impl fmt::Display for ParseAccessLevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown access level: {}", self.0)
    }
}

impl std::error::Error for ParseAccessLevelError {}

impl FromStr for AccessLevel {
    type Err = ParseAccessLevelError;

    // Accepts both the relation names and the short forms scope inference
    // payloads tend to use.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "reader" | "read" => Ok(AccessLevel::Reader),
            "writer" | "write" => Ok(AccessLevel::Writer),
            other => Err(ParseAccessLevelError(other.to_string())),
        }
    }
}

/// Outcome of an authorization check.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Decision {
    Allow,
    Deny(Denial),
}

impl Decision {
    pub fn deny(kind: DenialKind, reason: impl Into<String>) -> Self {
        Decision::Deny(Denial {
            kind,
            reason: reason.into(),
        })
    }

    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Structured denial carried back through the cache and gateway.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Denial {
    pub kind: DenialKind,
    pub reason: String,
}

/// Denial categories. `BackendError` marks a fail-closed outage denial so
/// callers can tell "you may not" apart from "the authorizer is down".
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    TaskInactive,
    NotAssigned,
    OutOfScope,
    NotGranted,
    BackendError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_level_parses_relation_and_short_forms() {
        assert_eq!("reader".parse::<AccessLevel>(), Ok(AccessLevel::Reader));
        assert_eq!("read".parse::<AccessLevel>(), Ok(AccessLevel::Reader));
        assert_eq!("Write".parse::<AccessLevel>(), Ok(AccessLevel::Writer));
        assert!("owner".parse::<AccessLevel>().is_err());
    }

    #[test]
    fn denial_helper_builds_structured_reason() {
        let decision = Decision::deny(DenialKind::OutOfScope, "out of scope");
        assert!(!decision.is_allow());
        match decision {
            Decision::Deny(denial) => {
                assert_eq!(denial.kind, DenialKind::OutOfScope);
                assert_eq!(denial.reason, "out of scope");
            }
            Decision::Allow => unreachable!(),
        }
    }

    #[test]
    fn task_ids_are_unique() {
        assert_ne!(TaskId::new(), TaskId::new());
    }
}
