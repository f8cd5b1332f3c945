//! Host-facing collaborator contracts for warden.
//!
//! The reconciliation engine treats everything that touches the host as a
//! black box behind a trait: package installation, process control,
//! template rendering, artifact validation, port management, and the
//! dashboard consumer. This crate defines those contracts, their
//! production implementations (apt, systemd, promtool, on-disk templates,
//! hook tools), and recording fakes for tests.

mod dashboard;
mod error;
pub mod fake;
mod packages;
mod ports;
mod render;
mod service;
mod validate;

pub use dashboard::{DashboardSink, JsonDashboard};
pub use error::HostError;
pub use packages::{AptPackages, PackageManager};
pub use ports::{HookPorts, PortControl};
pub use render::{RenderContext, Renderer, TemplateDir, sha256_hex};
pub use service::{ServiceControl, SystemdControl};
pub use validate::{Promtool, Validator};
