//! Artifact generators.
//!
//! Generators read facts and options, render an artifact to disk, and
//! raise the restart flag. They clear their own pending flag only after
//! the artifact is written and (for the scrape configuration) validated,
//! so a failed generation is retried on the next pass.

use std::collections::BTreeMap;
use std::fs;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use warden_host::{sha256_hex, RenderContext};
use warden_store::StoreError;

use crate::engine::{Engine, PRIMARY_TEMPLATE, SECONDARY_TEMPLATE, SERVICE_NAME};
use crate::{Action, Artifact, EngineError};

/// Label applied to jobs discovered through per-service peers.
const GROUP_JUJU: &str = "promoagents-juju";
/// Label applied to the statically declared target job.
const GROUP_STATIC: &str = "promoagents-static";
/// Label applied to the bare scrape-target job.
const GROUP_SCRAPE: &str = "promoagents-scrape";

static URL_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z_]+)\}").unwrap());

/// The structured block substituted into the primary template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeDocument {
    pub scrape_configs: Vec<ScrapeJob>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeJob {
    pub job_name: String,
    pub target_groups: Vec<TargetGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroup {
    pub targets: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl TargetGroup {
    fn plain(targets: Vec<String>) -> Self {
        Self {
            targets,
            labels: BTreeMap::new(),
        }
    }

    fn grouped(targets: Vec<String>, group: &str) -> Self {
        Self {
            targets,
            labels: BTreeMap::from([("group".to_string(), group.to_string())]),
        }
    }
}

#[derive(Serialize)]
struct RuleFiles {
    rule_files: Vec<String>,
}

impl Engine {
    /// Regenerate and validate the scrape configuration document.
    pub(crate) fn generate_scrape_config(&mut self) -> Result<(), EngineError> {
        let document = self.scrape_document()?;

        let mut context = RenderContext::new();
        context.insert("scrape_interval".into(), self.options.scrape_interval());
        context.insert(
            "evaluation_interval".into(),
            self.options.evaluation_interval(),
        );
        context.insert("monitor_name".into(), self.options.monitor_name(&self.unit.name));
        context.insert("rule_files".into(), self.rule_files_block()?);
        context.insert("scrape_configs".into(), serde_yaml::to_string(&document)?);

        let target = self.paths.scrape_config.clone();
        self.renderer.render(PRIMARY_TEMPLATE, &target, &context)?;
        self.validator.validate(&target)?;

        let version = sha256_hex(&fs::read(&target)?);
        info!(path = %target.display(), version = %version, "scrape configuration written");
        self.facts.set("config_version", &version)?;

        self.raise(Action::Restart)?;
        self.clear(Action::Regenerate(Artifact::ScrapeConfig))?;
        Ok(())
    }

    fn scrape_document(&mut self) -> Result<ScrapeDocument, EngineError> {
        let port = self.options.port()?;
        let mut jobs = vec![ScrapeJob {
            job_name: SERVICE_NAME.to_string(),
            target_groups: vec![TargetGroup::plain(vec![format!("localhost:{}", port)])],
        }];

        let static_targets = self.options.static_targets();
        if !static_targets.is_empty() {
            jobs.push(ScrapeJob {
                job_name: "static-targets".to_string(),
                target_groups: vec![TargetGroup::grouped(static_targets, GROUP_STATIC)],
            });
        }

        for job in self.facts.target_jobs()? {
            jobs.push(ScrapeJob {
                job_name: job.job_name,
                target_groups: vec![TargetGroup::grouped(job.targets, GROUP_JUJU)],
            });
        }

        let scrape_targets = self.facts.scrape_jobs()?;
        if !scrape_targets.is_empty() {
            jobs.push(ScrapeJob {
                job_name: "scrape-targets".to_string(),
                target_groups: vec![TargetGroup::grouped(scrape_targets, GROUP_SCRAPE)],
            });
        }

        Ok(ScrapeDocument {
            scrape_configs: jobs,
        })
    }

    /// Write the operator's rule text verbatim and return the YAML block
    /// referencing it, or an empty block when no rules are declared.
    fn rule_files_block(&mut self) -> Result<String, EngineError> {
        match self.options.custom_rules() {
            Some(rules) => {
                let path = self.paths.custom_rules.clone();
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&path, rules)?;
                debug!(path = %path.display(), "custom rules written");
                Ok(serde_yaml::to_string(&RuleFiles {
                    rule_files: vec![path.display().to_string()],
                })?)
            }
            None => Ok(String::new()),
        }
    }

    /// Regenerate the runtime-flags file and reconcile the listening
    /// port.
    pub(crate) fn generate_runtime_defaults(&mut self) -> Result<(), EngineError> {
        let port = self.options.port()?;
        self.check_ports(port)?;

        if let Some(format) = self.options.external_url() {
            let url = self.expand_external_url(&format, port)?;
            self.facts.set_runtime_arg("-web.external-url", Some(&url))?;
        }

        let args = self.facts.args_list()?;
        debug!(?args, "runtime arguments");
        if !args.is_empty() {
            let mut context = RenderContext::new();
            context.insert("args".into(), args.join(" "));
            let target = self.paths.runtime_defaults.clone();
            self.renderer
                .render(SECONDARY_TEMPLATE, &target, &context)?;
            info!(path = %target.display(), "runtime defaults written");
        }

        // The external-url flag above may have changed the arg set after
        // the planner fingerprinted it; advance the fingerprint so the
        // next pass does not regenerate again.
        let args_value = serde_json::to_value(&args).map_err(StoreError::from)?;
        self.facts.changed("args", &args_value)?;

        self.raise(Action::Restart)?;
        self.clear(Action::Regenerate(Artifact::RuntimeDefaults))?;
        Ok(())
    }

    /// Open the newly configured port and close the previous one.
    ///
    /// Only a port this engine opened is ever closed: on the very first
    /// configuration there is no tracked port and nothing to close.
    fn check_ports(&mut self, new_port: u16) -> Result<(), EngineError> {
        let tracked = self.facts.tracked_port()?;
        if tracked == Some(new_port) {
            return Ok(());
        }
        info!(port = new_port, previous = ?tracked, "reconciling listening port");
        self.ports.open_port(new_port)?;
        if let Some(old) = tracked {
            self.ports.close_port(old)?;
        }
        self.facts.set_tracked_port(new_port)?;
        Ok(())
    }

    /// Expand `{private_address}`, `{public_address}` and `{port}` in the
    /// configured external URL format.
    fn expand_external_url(&self, format: &str, port: u16) -> Result<String, EngineError> {
        let mut unknown = None;
        let expanded = URL_PLACEHOLDER.replace_all(format, |caps: &regex::Captures<'_>| {
            match &caps[1] {
                "private_address" => self.unit.private_address.clone(),
                "public_address" => self.unit.public_address.clone(),
                "port" => port.to_string(),
                other => {
                    unknown = Some(other.to_string());
                    String::new()
                }
            }
        });
        if let Some(key) = unknown {
            return Err(EngineError::MalformedUrl {
                format: format.to_string(),
                detail: format!("unknown key {:?}", key),
            });
        }
        if expanded.contains('{') || expanded.contains('}') {
            return Err(EngineError::MalformedUrl {
                format: format.to_string(),
                detail: "unbalanced braces".to_string(),
            });
        }
        Ok(expanded.into_owned())
    }
}
