//! Error types for the engine.

use thiserror::Error;
use warden_host::HostError;
use warden_store::StoreError;

/// Errors that abort a convergence pass.
///
/// A fatal error aborts only the current pass: actions already cleared
/// stay cleared, unprocessed actions remain pending and are retried on
/// the next trigger. Persistence errors propagate unchanged; the engine
/// has no retry logic of its own.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Persisted-state failure, surfaced as-is.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Collaborator failure: rendering, validation, packages, services,
    /// ports.
    #[error(transparent)]
    Host(#[from] HostError),

    /// The external-url option's format string could not be expanded.
    #[error("malformed external-url format {format:?}: {detail}")]
    MalformedUrl { format: String, detail: String },

    /// A declared option has an unusable value.
    #[error("invalid option {name:?}: {detail}")]
    InvalidOption { name: String, detail: String },

    /// Artifact document serialization failure.
    #[error("artifact serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Filesystem failure outside the collaborators (rules file, version
    /// digest).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
