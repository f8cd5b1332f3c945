//! Reconciliation engine for the managed metrics daemon.
//!
//! One [`Engine::run_pass`] call per external trigger runs the full
//! detect → plan → generate → restart cycle:
//! - input collectors translate the trigger into facts,
//! - the convergence planner compares facts and template digests against
//!   their fingerprints and raises the minimal set of pending actions,
//! - artifact generators render and validate configuration artifacts,
//! - the supervisor driver applies at most one start/restart.
//!
//! The engine is synchronous and single-threaded; the caller serializes
//! triggers. Pending actions are persisted, so a pass aborted by a fatal
//! error retries its remaining actions on the next trigger.

mod action;
mod collect;
mod engine;
mod error;
mod generate;
mod options;
mod peers;
mod planner;
mod status;
mod supervise;

pub use action::{Action, Artifact, PendingActions};
pub use collect::Trigger;
pub use engine::{
    ArtifactPaths, Collaborators, Engine, PACKAGES, PRIMARY_TEMPLATE, SECONDARY_TEMPLATE,
    SERVICE_NAME, UnitInfo,
};
pub use error::EngineError;
pub use generate::{ScrapeDocument, ScrapeJob, TargetGroup};
pub use options::{INSTALL_OPTIONS, Options};
pub use peers::{HostPort, PeerView, RelationSnapshot, ServiceGroup};
pub use status::Status;
pub use supervise::RunningCycle;
