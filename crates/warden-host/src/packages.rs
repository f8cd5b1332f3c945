//! Package installation.

use std::process::Command;

use tracing::info;

use crate::HostError;

/// Installs host packages. Idempotent: installing an already-present
/// package is a no-op. Unreachable repositories are fatal.
pub trait PackageManager {
    /// Install the named packages.
    fn install(&self, packages: &[&str]) -> Result<(), HostError>;
}

/// Production implementation shelling out to apt.
#[derive(Debug, Default)]
pub struct AptPackages;

impl AptPackages {
    fn run(&self, args: &[&str]) -> Result<(), HostError> {
        let output = Command::new("apt-get")
            .args(args)
            .env("DEBIAN_FRONTEND", "noninteractive")
            .output()?;
        if !output.status.success() {
            return Err(HostError::PackageInstall {
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

impl PackageManager for AptPackages {
    fn install(&self, packages: &[&str]) -> Result<(), HostError> {
        info!(?packages, "installing packages");
        self.run(&["update"])?;
        let mut args = vec!["install", "-y"];
        args.extend_from_slice(packages);
        self.run(&args)
    }
}
