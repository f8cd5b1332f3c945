//! External validation of rendered artifacts.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::HostError;

/// Checks a rendered configuration artifact before it is allowed to
/// trigger a service restart.
pub trait Validator {
    /// Validate the artifact at `path`. An `Err(HostError::Validation)`
    /// aborts the pass and leaves the previously valid artifact in use.
    fn validate(&self, path: &Path) -> Result<(), HostError>;
}

/// Production implementation invoking the daemon's own config checker.
#[derive(Debug)]
pub struct Promtool {
    binary: PathBuf,
}

impl Promtool {
    /// Use the `promtool` found on `PATH`.
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("promtool"),
        }
    }

    /// Use a specific checker binary.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for Promtool {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator for Promtool {
    fn validate(&self, path: &Path) -> Result<(), HostError> {
        debug!(path = %path.display(), "validating rendered config");
        let output = Command::new(&self.binary)
            .arg("check-config")
            .arg(path)
            .output()?;
        if !output.status.success() {
            return Err(HostError::Validation {
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}
