//! Error types for host collaborators.

use thiserror::Error;

/// Errors raised by host-facing collaborators.
///
/// All of these abort the current convergence pass; none of them are
/// retried by the engine itself (the next external trigger retries).
#[derive(Debug, Error)]
pub enum HostError {
    /// A named template does not exist in the template directory.
    #[error("template not found: {name}")]
    MissingTemplate { name: String },

    /// A template references a context key the caller did not supply.
    #[error("undefined variable '{variable}' in template {template}")]
    UndefinedVariable { template: String, variable: String },

    /// The rendered artifact failed external validation.
    #[error("artifact validation failed: {message}")]
    Validation { message: String },

    /// Package installation failed, e.g. unreachable repositories.
    #[error("package installation failed: {detail}")]
    PackageInstall { detail: String },

    /// A service control operation failed.
    #[error("service control failed for {service}: {detail}")]
    ServiceControl { service: String, detail: String },

    /// A port open/close operation failed.
    #[error("port control failed: {detail}")]
    PortControl { detail: String },

    /// Filesystem or process-spawn failure.
    #[error("host I/O error: {0}")]
    Io(#[from] std::io::Error),
}
