//! The convergence planner.
//!
//! One evaluation per pass: compare every input class against its last
//! fingerprint and raise the narrowest set of regeneration actions. Each
//! detector is consulted exactly once so its fingerprint advances even
//! when another detector already forced the same action.

use tracing::debug;

use warden_store::StoreError;

use crate::engine::{Engine, PRIMARY_TEMPLATE, SECONDARY_TEMPLATE};
use crate::options::INSTALL_OPTIONS;
use crate::{Action, Artifact, EngineError};

impl Engine {
    pub(crate) fn plan(&mut self) -> Result<(), EngineError> {
        let target_jobs =
            serde_json::to_value(self.facts.target_jobs()?).map_err(StoreError::from)?;
        let scrape_jobs =
            serde_json::to_value(self.facts.scrape_jobs()?).map_err(StoreError::from)?;
        let args = serde_json::to_value(self.facts.args_list()?).map_err(StoreError::from)?;
        let option_set = serde_json::to_value(&self.options).map_err(StoreError::from)?;

        let primary_template = self.template_changed(PRIMARY_TEMPLATE)?;
        let secondary_template = self.template_changed(SECONDARY_TEMPLATE)?;

        if INSTALL_OPTIONS.iter().any(|name| self.option_changed(name)) {
            self.raise(Action::Install)?;
        }

        // Any edit to the declared option set can affect both artifacts.
        if self.facts.changed("config", &option_set)? {
            self.raise(Action::Regenerate(Artifact::ScrapeConfig))?;
            self.raise(Action::Regenerate(Artifact::RuntimeDefaults))?;
        }

        let targets_changed = self.facts.changed("target_jobs", &target_jobs)?;
        let scrape_changed = self.facts.changed("scrape_jobs", &scrape_jobs)?;
        let args_changed = self.facts.changed("args", &args)?;
        debug!(
            targets_changed,
            scrape_changed, args_changed, primary_template, secondary_template, "planner inputs"
        );

        if targets_changed || scrape_changed || primary_template {
            self.raise(Action::Regenerate(Artifact::ScrapeConfig))?;
        }
        if args_changed || secondary_template {
            self.raise(Action::Regenerate(Artifact::RuntimeDefaults))?;
        }

        self.clear(Action::CheckReconfig)?;
        Ok(())
    }
}
