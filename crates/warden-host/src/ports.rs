//! Network port management.

use std::process::Command;

use tracing::info;

use crate::HostError;

/// Opens and closes the daemon's listening port on the host.
pub trait PortControl {
    /// Expose `port` to the network.
    fn open_port(&self, port: u16) -> Result<(), HostError>;

    /// Withdraw `port`. Callers never close a port they did not open.
    fn close_port(&self, port: u16) -> Result<(), HostError>;
}

/// Production implementation invoking the host-management hook tools.
#[derive(Debug, Default)]
pub struct HookPorts;

impl HookPorts {
    fn run(&self, tool: &str, port: u16) -> Result<(), HostError> {
        let spec = format!("{}/tcp", port);
        let output = Command::new(tool).arg(&spec).output()?;
        if !output.status.success() {
            return Err(HostError::PortControl {
                detail: format!(
                    "{} {}: {}",
                    tool,
                    spec,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(())
    }
}

impl PortControl for HookPorts {
    fn open_port(&self, port: u16) -> Result<(), HostError> {
        info!(port, "opening port");
        self.run("open-port", port)
    }

    fn close_port(&self, port: u16) -> Result<(), HostError> {
        info!(port, "closing port");
        self.run("close-port", port)
    }
}
