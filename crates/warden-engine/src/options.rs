//! Declared configuration options.
//!
//! Options are the human-facing side of the engine's inputs: a mapping of
//! option name to current value, edited by operators and handed to the
//! engine on every pass. Per-option change queries compare against the
//! snapshot taken at the end of the last successful pass; this mechanism
//! is deliberately distinct from the fact-fingerprint change detector,
//! which tracks derived values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::EngineError;

/// Options that require reinstalling packages when they change.
pub const INSTALL_OPTIONS: &[&str] = &["install_sources", "install_keys"];

/// The declared option set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options {
    values: BTreeMap<String, Value>,
}

impl Options {
    /// Empty option set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from name/value pairs, mainly for tests.
    pub fn from_pairs(pairs: &[(&str, Value)]) -> Self {
        Self {
            values: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    /// Raw value of an option, if set.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Set an option value.
    pub fn insert(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// String value of an option. A missing, null, empty, or `false`
    /// value is unset, not an error (option schemas use `false` as the
    /// unset default for textual options); other scalars are rendered to
    /// text.
    pub fn text(&self, name: &str) -> Option<String> {
        match self.values.get(name)? {
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            Value::Bool(false) => None,
            other => Some(other.to_string()),
        }
    }

    /// The daemon's listening port (defaults to 9090).
    pub fn port(&self) -> Result<u16, EngineError> {
        match self.values.get("port") {
            None | Some(Value::Null) => Ok(9090),
            Some(Value::Number(n)) => {
                n.as_u64()
                    .and_then(|n| u16::try_from(n).ok())
                    .ok_or_else(|| EngineError::InvalidOption {
                        name: "port".into(),
                        detail: format!("{} is not a valid port number", n),
                    })
            }
            Some(Value::String(s)) => s.parse().map_err(|_| EngineError::InvalidOption {
                name: "port".into(),
                detail: format!("{:?} is not a valid port number", s),
            }),
            Some(other) => Err(EngineError::InvalidOption {
                name: "port".into(),
                detail: format!("unexpected value {}", other),
            }),
        }
    }

    /// Scrape interval for the generated configuration.
    pub fn scrape_interval(&self) -> String {
        self.text("scrape-interval").unwrap_or_else(|| "15s".into())
    }

    /// Rule evaluation interval for the generated configuration.
    pub fn evaluation_interval(&self) -> String {
        self.text("evaluation-interval")
            .unwrap_or_else(|| "15s".into())
    }

    /// Statically declared scrape targets: a comma-separated string of
    /// `host:port` entries, whitespace-trimmed. Empty when unset.
    pub fn static_targets(&self) -> Vec<String> {
        match self.text("static-targets") {
            Some(raw) => raw
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Free-form alerting/recording rule text, written verbatim to the
    /// rules file.
    pub fn custom_rules(&self) -> Option<String> {
        self.text("custom-rules")
    }

    /// Externally reachable URL format string. Only included in the
    /// runtime flags when explicitly configured.
    pub fn external_url(&self) -> Option<String> {
        self.text("external-url")
    }

    /// Monitor label for the generated configuration.
    pub fn monitor_name(&self, unit_name: &str) -> String {
        self.text("monitor-name")
            .unwrap_or_else(|| format!("{}-monitor", unit_name))
    }

    /// Whether `name` differs from its value in `previous`.
    ///
    /// With no previous snapshot (first pass ever) every option counts
    /// as changed.
    pub fn changed_from(&self, previous: Option<&Options>, name: &str) -> bool {
        match previous {
            Some(prev) => prev.get(name) != self.get(name),
            None => true,
        }
    }
}
