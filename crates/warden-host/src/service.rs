//! Managed service process control.

use std::process::Command;

use tracing::info;

use crate::HostError;

/// Start/restart primitives for the managed daemon.
pub trait ServiceControl {
    /// Whether the service is currently running.
    fn is_running(&self, service: &str) -> Result<bool, HostError>;

    /// Start the service.
    fn start(&self, service: &str) -> Result<(), HostError>;

    /// Restart the service.
    fn restart(&self, service: &str) -> Result<(), HostError>;
}

/// Production implementation shelling out to systemctl.
#[derive(Debug, Default)]
pub struct SystemdControl;

impl SystemdControl {
    fn run(&self, verb: &str, service: &str) -> Result<(), HostError> {
        let output = Command::new("systemctl").args([verb, service]).output()?;
        if !output.status.success() {
            return Err(HostError::ServiceControl {
                service: service.to_string(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

impl ServiceControl for SystemdControl {
    fn is_running(&self, service: &str) -> Result<bool, HostError> {
        // is-active exits non-zero for inactive units; that is an answer,
        // not an error.
        let status = Command::new("systemctl")
            .args(["is-active", "--quiet", service])
            .status()?;
        Ok(status.success())
    }

    fn start(&self, service: &str) -> Result<(), HostError> {
        info!(service, "starting service");
        self.run("start", service)
    }

    fn restart(&self, service: &str) -> Result<(), HostError> {
        info!(service, "restarting service");
        self.run("restart", service)
    }
}
