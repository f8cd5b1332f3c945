//! Settings file and engine assembly.
//!
//! The settings file is the operator-edited YAML document carrying the
//! unit's identity, declared options, and host paths. The daemon re-reads
//! it on every poll tick and synthesizes a config-changed trigger when it
//! was modified.

use std::path::{Path, PathBuf};

use miette::{IntoDiagnostic, Result, WrapErr};
use serde::Deserialize;

use warden_engine::{ArtifactPaths, Collaborators, Engine, Options, UnitInfo};
use warden_host::{AptPackages, HookPorts, Promtool, SystemdControl, TemplateDir};
use warden_store::FileKv;

fn default_templates_dir() -> PathBuf {
    PathBuf::from("/usr/share/warden/templates")
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UnitSettings {
    pub name: Option<String>,
    pub private_address: Option<String>,
    pub public_address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathSettings {
    pub scrape_config: Option<PathBuf>,
    pub runtime_defaults: Option<PathBuf>,
    pub custom_rules: Option<PathBuf>,
}

/// Parsed settings document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub unit: UnitSettings,
    #[serde(default)]
    pub options: Options,
    #[serde(default)]
    pub paths: PathSettings,
    #[serde(default = "default_templates_dir")]
    pub templates_dir: PathBuf,
    /// Path to the configuration checker binary; defaults to `promtool`
    /// on PATH.
    #[serde(default)]
    pub promtool: Option<PathBuf>,
    /// When set, the scrape endpoint is announced here as a JSON record
    /// after each successful pass.
    #[serde(default)]
    pub dashboard: Option<PathBuf>,
}

impl Settings {
    /// Read and parse the settings file. A missing file yields defaults,
    /// so a freshly installed unit converges before the operator writes
    /// any settings.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => serde_yaml::from_str(&text)
                .into_diagnostic()
                .wrap_err_with(|| format!("malformed settings file {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to read settings file {}", path.display())),
        }
    }

    pub fn unit_info(&self) -> UnitInfo {
        let defaults = UnitInfo::default();
        UnitInfo {
            name: self.unit.name.clone().unwrap_or(defaults.name),
            private_address: self
                .unit
                .private_address
                .clone()
                .unwrap_or(defaults.private_address),
            public_address: self
                .unit
                .public_address
                .clone()
                .unwrap_or(defaults.public_address),
        }
    }

    pub fn artifact_paths(&self) -> ArtifactPaths {
        let defaults = ArtifactPaths::default();
        ArtifactPaths {
            scrape_config: self
                .paths
                .scrape_config
                .clone()
                .unwrap_or(defaults.scrape_config),
            runtime_defaults: self
                .paths
                .runtime_defaults
                .clone()
                .unwrap_or(defaults.runtime_defaults),
            custom_rules: self
                .paths
                .custom_rules
                .clone()
                .unwrap_or(defaults.custom_rules),
        }
    }

    /// Assemble an engine over the persistent state in `state_dir`, with
    /// production host collaborators.
    pub fn build_engine(&self, state_dir: &Path) -> Result<Engine> {
        let kv = FileKv::open(state_dir.join("facts.json"))
            .into_diagnostic()
            .wrap_err("failed to open fact store")?;

        let validator = match &self.promtool {
            Some(binary) => Promtool::with_binary(binary.clone()),
            None => Promtool::new(),
        };

        Engine::new(
            Box::new(kv),
            self.options.clone(),
            self.unit_info(),
            self.artifact_paths(),
            Collaborators {
                renderer: Box::new(TemplateDir::new(&self.templates_dir)),
                validator: Box::new(validator),
                services: Box::new(SystemdControl),
                packages: Box::new(AptPackages),
                ports: Box::new(HookPorts),
            },
        )
        .into_diagnostic()
        .wrap_err("failed to initialize engine")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("settings.yaml")).unwrap();
        assert_eq!(settings.unit_info().name, "prometheus");
        assert_eq!(settings.options.port().unwrap(), 9090);
    }

    #[test]
    fn parses_a_full_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(
            &path,
            "unit:\n  name: prometheus/0\n  public_address: 203.0.113.5\n\
             options:\n  port: 9091\n  static-targets: \"db:9100\"\n\
             templates_dir: /opt/warden/templates\n",
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.unit_info().name, "prometheus/0");
        assert_eq!(settings.unit_info().public_address, "203.0.113.5");
        assert_eq!(settings.options.port().unwrap(), 9091);
        assert_eq!(settings.options.static_targets(), vec!["db:9100"]);
        assert_eq!(
            settings.templates_dir,
            PathBuf::from("/opt/warden/templates")
        );
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(&path, "options: [not, a, map").unwrap();
        assert!(Settings::load(&path).is_err());
    }
}
