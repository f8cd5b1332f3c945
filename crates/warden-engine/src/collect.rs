//! Input collectors.
//!
//! Collectors translate external events into facts. They never touch the
//! host and never generate artifacts; they only record what the world
//! looks like now and let the planner decide whether anything needs
//! regenerating.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use warden_host::DashboardSink;
use warden_store::{StoreError, TargetJob};

use crate::engine::Engine;
use crate::peers::{PeerView, RelationSnapshot};
use crate::EngineError;

/// An external event that starts a convergence pass.
///
/// Serialized form matches the spool-file payloads the daemon reads, so
/// a trigger can be dropped as a JSON file and picked up verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "hook", content = "data", rename_all = "kebab-case")]
pub enum Trigger {
    /// Declared options were edited. Carries no payload; the new option
    /// values arrive via [`Engine::set_options`].
    ConfigChanged,
    /// Persistent storage became available at `location`.
    StorageAttached { location: String },
    /// Peer services exporting per-service scrape jobs joined or moved.
    TargetsChanged { peers: RelationSnapshot },
    /// All per-service scrape peers left.
    TargetsDeparted,
    /// Peers exporting bare scrape targets joined or moved.
    ScrapeTargetsChanged { peers: RelationSnapshot },
    /// All bare scrape-target peers left.
    ScrapeTargetsDeparted,
    /// An alert-router peer joined or moved.
    AlertmanagerChanged { peers: RelationSnapshot },
    /// All alert-router peers left.
    AlertmanagerDeparted,
    /// Periodic re-check with no new inputs.
    UpdateStatus,
}

impl Trigger {
    /// Stable name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Trigger::ConfigChanged => "config-changed",
            Trigger::StorageAttached { .. } => "storage-attached",
            Trigger::TargetsChanged { .. } => "targets-changed",
            Trigger::TargetsDeparted => "targets-departed",
            Trigger::ScrapeTargetsChanged { .. } => "scrape-targets-changed",
            Trigger::ScrapeTargetsDeparted => "scrape-targets-departed",
            Trigger::AlertmanagerChanged { .. } => "alertmanager-changed",
            Trigger::AlertmanagerDeparted => "alertmanager-departed",
            Trigger::UpdateStatus => "update-status",
        }
    }
}

impl Engine {
    pub(crate) fn collect(&mut self, trigger: &Trigger) -> Result<(), EngineError> {
        match trigger {
            Trigger::ConfigChanged | Trigger::UpdateStatus => Ok(()),
            Trigger::StorageAttached { location } => self.on_storage_attached(location),
            Trigger::TargetsChanged { peers } => self.on_targets_changed(peers),
            Trigger::TargetsDeparted => self.on_targets_departed(),
            Trigger::ScrapeTargetsChanged { peers } => self.on_scrape_targets_changed(peers),
            Trigger::ScrapeTargetsDeparted => self.on_scrape_targets_departed(),
            Trigger::AlertmanagerChanged { peers } => self.on_alertmanager_changed(peers),
            Trigger::AlertmanagerDeparted => self.on_alertmanager_departed(),
        }
    }

    /// Record per-service scrape jobs for every related target exporter.
    pub fn on_targets_changed(&mut self, peer: &dyn PeerView) -> Result<(), EngineError> {
        let mut jobs = Vec::new();
        for service in peer.list_services() {
            let mut targets = Vec::new();
            for unit in &service.hosts {
                info!(
                    service = %service.service_name,
                    target = %unit.target(),
                    "discovered scrape unit"
                );
                targets.push(unit.target());
            }
            jobs.push(TargetJob {
                job_name: service.service_name.clone(),
                targets,
            });
        }
        self.facts.set_target_jobs(&jobs)?;
        Ok(())
    }

    /// Forget all per-service scrape jobs.
    pub fn on_targets_departed(&mut self) -> Result<(), EngineError> {
        self.facts.set_target_jobs(&[])?;
        Ok(())
    }

    /// Record the flat list of bare scrape targets.
    pub fn on_scrape_targets_changed(&mut self, peer: &dyn PeerView) -> Result<(), EngineError> {
        let targets = peer.list_targets();
        debug!(count = targets.len(), "collected bare scrape targets");
        self.facts.set_scrape_jobs(&targets)?;
        Ok(())
    }

    /// Forget all bare scrape targets.
    pub fn on_scrape_targets_departed(&mut self) -> Result<(), EngineError> {
        self.facts.set_scrape_jobs(&[])?;
        Ok(())
    }

    /// Point the daemon's alert-router flag at a related alertmanager.
    pub fn on_alertmanager_changed(&mut self, peer: &dyn PeerView) -> Result<(), EngineError> {
        let services = peer.list_services();
        let membership = serde_json::to_value(&services).map_err(StoreError::from)?;
        if !self
            .facts
            .changed("alertmanager.related_services", &membership)?
        {
            return Ok(());
        }
        // The daemon takes a single alert-router URL; with several
        // related units the last one in iteration order wins.
        for service in &services {
            for unit in &service.hosts {
                info!(
                    service = %service.service_name,
                    target = %unit.target(),
                    "routing alerts"
                );
                self.facts.set_runtime_arg(
                    "-alertmanager.url",
                    Some(&format!("http://{}", unit.target())),
                )?;
            }
        }
        Ok(())
    }

    /// Drop the alert-router flag once no alertmanager remains related.
    pub fn on_alertmanager_departed(&mut self) -> Result<(), EngineError> {
        self.facts.set_runtime_arg("-alertmanager.url", None)?;
        self.facts
            .changed("alertmanager.related_services", &Value::Array(Vec::new()))?;
        Ok(())
    }

    /// Persist metric storage under the attached location.
    pub fn on_storage_attached(&mut self, location: &str) -> Result<(), EngineError> {
        info!(location = %location, "storage attached");
        self.facts.set_storage_path(location)?;
        self.facts
            .set_runtime_arg("-storage.local.path", Some(location))?;
        Ok(())
    }

    /// Announce the scrape endpoint to a dashboard consumer.
    ///
    /// Uses the reconciled (tracked) port when one exists, falling back
    /// to the declared option before the first pass has run.
    pub fn publish_dashboard(&mut self, sink: &dyn DashboardSink) -> Result<(), EngineError> {
        let port = match self.facts.tracked_port()? {
            Some(port) => port,
            None => self.options.port()?,
        };
        sink.provide(crate::engine::SERVICE_NAME, port, "metrics scrape endpoint")?;
        Ok(())
    }
}
