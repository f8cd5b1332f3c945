//! The engine: owned state, collaborators, and the per-pass driver loop.

use std::path::PathBuf;

use tracing::{debug, error, info, warn};

use warden_host::{PackageManager, PortControl, Renderer, ServiceControl, Validator};
use warden_store::{FactStore, KvStore};

use crate::{Action, Artifact, EngineError, Options, PendingActions, Status, Trigger};

/// Name of the managed service.
pub const SERVICE_NAME: &str = "prometheus";

/// Packages the daemon needs installed.
pub const PACKAGES: &[&str] = &["prometheus"];

/// Template for the primary artifact (scrape configuration document).
pub const PRIMARY_TEMPLATE: &str = "prometheus.yml.tmpl";

/// Template for the secondary artifact (runtime-flags file).
pub const SECONDARY_TEMPLATE: &str = "prometheus.defaults.tmpl";

/// Rule evaluation order for one pass.
///
/// The planner runs first so that actions it raises (install, regenerate)
/// execute within the same pass; the restart driver runs last so every
/// generator's restart request coalesces into one start/restart.
const RULE_ORDER: &[Action] = &[
    Action::CheckReconfig,
    Action::Install,
    Action::Regenerate(Artifact::ScrapeConfig),
    Action::Regenerate(Artifact::RuntimeDefaults),
    Action::Restart,
];

/// Identity of the unit this engine manages.
#[derive(Debug, Clone)]
pub struct UnitInfo {
    /// Unit name; also the default stem for the monitor label.
    pub name: String,
    /// Address reachable from inside the deployment.
    pub private_address: String,
    /// Address reachable from outside, for the external URL.
    pub public_address: String,
}

impl Default for UnitInfo {
    fn default() -> Self {
        Self {
            name: SERVICE_NAME.to_string(),
            private_address: "localhost".to_string(),
            public_address: "localhost".to_string(),
        }
    }
}

/// Where generated artifacts land on the host.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    /// The scrape configuration document.
    pub scrape_config: PathBuf,
    /// The runtime-flags file read by the daemon at startup.
    pub runtime_defaults: PathBuf,
    /// Verbatim destination for operator-supplied rule text.
    pub custom_rules: PathBuf,
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self {
            scrape_config: PathBuf::from("/etc/prometheus/prometheus.yml"),
            runtime_defaults: PathBuf::from("/etc/default/prometheus"),
            custom_rules: PathBuf::from("/etc/prometheus/custom.rules"),
        }
    }
}

impl ArtifactPaths {
    /// All artifacts under one directory, for tests and sandboxed runs.
    pub fn under(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            scrape_config: dir.join("prometheus.yml"),
            runtime_defaults: dir.join("default_prometheus"),
            custom_rules: dir.join("custom.rules"),
        }
    }
}

/// External collaborators the engine drives.
pub struct Collaborators {
    pub renderer: Box<dyn Renderer>,
    pub validator: Box<dyn Validator>,
    pub services: Box<dyn ServiceControl>,
    pub packages: Box<dyn PackageManager>,
    pub ports: Box<dyn PortControl>,
}

/// The reconciliation engine.
///
/// Owns the fact store and the pending-action set; everything that
/// touches the host goes through [`Collaborators`]. One instance per
/// managed unit; the caller serializes passes.
pub struct Engine {
    pub(crate) facts: FactStore,
    pub(crate) options: Options,
    pub(crate) previous_options: Option<Options>,
    pub(crate) pending: PendingActions,
    pub(crate) unit: UnitInfo,
    pub(crate) paths: ArtifactPaths,
    pub(crate) renderer: Box<dyn Renderer>,
    pub(crate) validator: Box<dyn Validator>,
    pub(crate) services: Box<dyn ServiceControl>,
    pub(crate) packages: Box<dyn PackageManager>,
    pub(crate) ports: Box<dyn PortControl>,
}

impl Engine {
    /// Build an engine over a kv backend, restoring the pending actions
    /// and option snapshot a previous invocation left behind.
    pub fn new(
        kv: Box<dyn KvStore>,
        options: Options,
        unit: UnitInfo,
        paths: ArtifactPaths,
        collaborators: Collaborators,
    ) -> Result<Self, EngineError> {
        let facts = FactStore::new(kv);
        let pending: PendingActions = facts.get("pending_actions")?.unwrap_or_default();
        let previous_options: Option<Options> = facts.get("options_previous")?;
        Ok(Self {
            facts,
            options,
            previous_options,
            pending,
            unit,
            paths,
            renderer: collaborators.renderer,
            validator: collaborators.validator,
            services: collaborators.services,
            packages: collaborators.packages,
            ports: collaborators.ports,
        })
    }

    /// Replace the declared options before the next pass.
    pub fn set_options(&mut self, options: Options) {
        self.options = options;
    }

    /// Read access to the fact store, for inspection commands.
    pub fn facts(&self) -> &FactStore {
        &self.facts
    }

    /// Currently pending actions.
    pub fn pending(&self) -> &PendingActions {
        &self.pending
    }

    /// Last recorded status.
    pub fn status(&self) -> Result<Option<Status>, EngineError> {
        Ok(self.facts.get("status")?)
    }

    /// Run one full convergence pass for `trigger`.
    ///
    /// A fatal error aborts the pass, records a blocked status, and
    /// leaves unprocessed pending actions persisted for the next
    /// trigger. Repeated invocation with unchanged inputs is a no-op.
    pub fn run_pass(&mut self, trigger: &Trigger) -> Result<Status, EngineError> {
        match self.converge(trigger) {
            Ok(status) => Ok(status),
            Err(e) => {
                error!(error = %e, "convergence pass failed");
                let blocked = Status::Blocked(format!("configuration error: {}", e));
                if let Err(status_err) = self.set_status(blocked) {
                    warn!(error = %status_err, "failed to record blocked status");
                }
                Err(e)
            }
        }
    }

    fn converge(&mut self, trigger: &Trigger) -> Result<Status, EngineError> {
        info!(trigger = trigger.name(), "convergence pass");
        self.collect(trigger)?;

        if !self.facts.started()? {
            self.set_status(Status::Maintenance("configuring software".into()))?;
        }

        // Every pass re-evaluates the plan; the planner is idempotent
        // and clears this flag itself.
        self.raise(Action::CheckReconfig)?;

        for action in RULE_ORDER {
            if self.pending.is_pending(*action) {
                self.dispatch(*action)?;
            }
        }

        // Option snapshots commit only on success so an aborted pass
        // re-detects the same option changes next time.
        self.commit_options()?;

        Ok(self
            .status()?
            .unwrap_or_else(|| Status::Maintenance("waiting for first convergence".into())))
    }

    fn dispatch(&mut self, action: Action) -> Result<(), EngineError> {
        debug!(?action, "dispatching action");
        match action {
            Action::CheckReconfig => self.plan(),
            Action::Install => self.install_packages(),
            Action::Regenerate(Artifact::ScrapeConfig) => self.generate_scrape_config(),
            Action::Regenerate(Artifact::RuntimeDefaults) => self.generate_runtime_defaults(),
            Action::Restart => self.apply_restart(),
        }
    }

    pub(crate) fn install_packages(&mut self) -> Result<(), EngineError> {
        self.set_status(Status::Maintenance("installing software".into()))?;
        self.packages.install(PACKAGES)?;
        self.clear(Action::Install)?;
        Ok(())
    }

    pub(crate) fn raise(&mut self, action: Action) -> Result<(), EngineError> {
        if self.pending.raise(action) {
            debug!(?action, "action raised");
            self.persist_pending()?;
        }
        Ok(())
    }

    pub(crate) fn clear(&mut self, action: Action) -> Result<(), EngineError> {
        if self.pending.clear(action) {
            self.persist_pending()?;
        }
        Ok(())
    }

    fn persist_pending(&mut self) -> Result<(), EngineError> {
        let pending = self.pending.clone();
        self.facts.set("pending_actions", &pending)?;
        Ok(())
    }

    /// Whether a declared option differs from the last committed
    /// snapshot. Before any snapshot exists, every option reads as
    /// changed.
    pub(crate) fn option_changed(&self, name: &str) -> bool {
        self.options.changed_from(self.previous_options.as_ref(), name)
    }

    fn commit_options(&mut self) -> Result<(), EngineError> {
        let current = self.options.clone();
        self.facts.set("options_previous", &current)?;
        self.previous_options = Some(current);
        Ok(())
    }

    /// Whether a template's content digest differs from the one recorded
    /// at last generation.
    pub(crate) fn template_changed(&mut self, template: &str) -> Result<bool, EngineError> {
        let digest = self.renderer.digest(template)?;
        Ok(self.facts.template_changed(template, &digest)?)
    }

    pub(crate) fn set_status(&mut self, status: Status) -> Result<(), EngineError> {
        info!(status = %status, "status");
        self.facts.set("status", &status)?;
        Ok(())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("pending", &self.pending)
            .field("unit", &self.unit)
            .field("paths", &self.paths)
            .finish_non_exhaustive()
    }
}
