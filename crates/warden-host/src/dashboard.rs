//! Dashboard consumer integration.

use std::fs;
use std::path::PathBuf;

use serde::Serialize;
use tracing::info;

use crate::HostError;

/// Receives the daemon's address so a dashboard peer can add it as a
/// data source.
pub trait DashboardSink {
    /// Publish a data source of `source_type` listening on `port`.
    fn provide(&self, source_type: &str, port: u16, description: &str) -> Result<(), HostError>;
}

#[derive(Debug, Serialize)]
struct SourceRecord<'a> {
    source_type: &'a str,
    port: u16,
    description: &'a str,
}

/// File-based sink: writes the data-source record as JSON for the peer
/// relation transport to pick up.
#[derive(Debug)]
pub struct JsonDashboard {
    path: PathBuf,
}

impl JsonDashboard {
    /// Publish records to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DashboardSink for JsonDashboard {
    fn provide(&self, source_type: &str, port: u16, description: &str) -> Result<(), HostError> {
        let record = SourceRecord {
            source_type,
            port,
            description,
        };
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(&record).map_err(std::io::Error::other)?;
        fs::write(&self.path, body)?;
        info!(source_type, port, path = %self.path.display(), "published dashboard source");
        Ok(())
    }
}
