//! Pending actions.
//!
//! Actions are idempotent flags, not queued events: raising an action
//! twice before it executes has the same effect as raising it once. A
//! handler clears its own flag on success, which makes the whole engine
//! safe to invoke repeatedly as a no-op when nothing changed.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A configuration artifact the engine generates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Artifact {
    /// The primary artifact: the structured scrape/job configuration
    /// document.
    ScrapeConfig,
    /// The secondary artifact: the runtime-flags file read at daemon
    /// startup.
    RuntimeDefaults,
}

/// One not-yet-executed engine action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// (Re)install the daemon packages.
    Install,
    /// Re-run the convergence planner. This is the planner's own
    /// re-entry flag; it clears it after evaluation.
    CheckReconfig,
    /// Regenerate one artifact.
    Regenerate(Artifact),
    /// Start or restart the managed service.
    Restart,
}

/// The working set of pending actions.
///
/// Persisted across passes by the engine so that flags left behind by an
/// aborted pass are retried on the next trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingActions {
    actions: BTreeSet<Action>,
}

impl PendingActions {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise an action. Returns true if it was not already pending.
    pub fn raise(&mut self, action: Action) -> bool {
        self.actions.insert(action)
    }

    /// Clear an action. Returns true if it was pending.
    pub fn clear(&mut self, action: Action) -> bool {
        self.actions.remove(&action)
    }

    /// Whether an action is pending.
    pub fn is_pending(&self, action: Action) -> bool {
        self.actions.contains(&action)
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Pending actions in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = Action> + '_ {
        self.actions.iter().copied()
    }
}
