//! Operator-visible engine status.

use serde::{Deserialize, Serialize};

/// Status surfaced to the host-management layer after each pass.
///
/// Fatal pass errors become `Blocked` rather than crashing the process;
/// the previous working configuration and running service are left
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum Status {
    /// The engine is converging (installing, regenerating).
    Maintenance(String),
    /// The managed service is running with current configuration.
    Active(String),
    /// Operator attention required, typically a configuration error.
    Blocked(String),
}

impl Status {
    /// The status message text.
    pub fn message(&self) -> &str {
        match self {
            Status::Maintenance(m) | Status::Active(m) | Status::Blocked(m) => m,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Maintenance(m) => write!(f, "maintenance: {}", m),
            Status::Active(m) => write!(f, "active: {}", m),
            Status::Blocked(m) => write!(f, "blocked: {}", m),
        }
    }
}
