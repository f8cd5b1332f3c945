//! Supervisor driver.
//!
//! A single restart flag coalesces every regeneration in a pass into at
//! most one service bounce, applied after all artifacts are in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::{Engine, SERVICE_NAME};
use crate::{Action, EngineError, Status};

/// Record of the service cycle applied by the last restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningCycle {
    /// Digest of the scrape configuration in effect, when one has been
    /// generated.
    pub config_version: Option<String>,
    pub restarted_at: DateTime<Utc>,
}

impl Engine {
    pub(crate) fn apply_restart(&mut self) -> Result<(), EngineError> {
        if self.services.is_running(SERVICE_NAME)? {
            info!(service = SERVICE_NAME, "restarting with new configuration");
            self.services.restart(SERVICE_NAME)?;
        } else {
            info!(service = SERVICE_NAME, "starting service");
            self.services.start(SERVICE_NAME)?;
        }

        let cycle = RunningCycle {
            config_version: self.facts.get("config_version")?,
            restarted_at: Utc::now(),
        };
        self.facts.set("running", &cycle)?;
        self.facts.set_started(true)?;

        self.set_status(Status::Active("Ready".into()))?;
        self.clear(Action::Restart)?;
        Ok(())
    }
}
