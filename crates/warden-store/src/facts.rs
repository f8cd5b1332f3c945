//! Typed fact accessors over the kv store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{KvStore, StoreError};

/// One scrape job derived from a related peer service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetJob {
    /// Job name, taken from the peer's service name.
    pub job_name: String,
    /// Scrape targets as `host:port` strings, in peer iteration order.
    pub targets: Vec<String>,
}

/// The engine's single source of truth for derived facts.
///
/// Each fact is a named value with at most one current version;
/// writes are last-write-wins and no history is retained beyond the
/// fingerprints used for change detection (see `detect`).
pub struct FactStore {
    kv: Box<dyn KvStore>,
}

impl FactStore {
    /// Wrap a kv backend.
    pub fn new(kv: Box<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Read a fact, deserializing into `T`. Absent facts return `None`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.kv.get(key)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Write a fact, replacing any previous value.
    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), StoreError> {
        self.kv.set(key, serde_json::to_value(value)?)
    }

    /// Remove a fact.
    pub fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        self.kv.delete(key)
    }

    pub(crate) fn raw(&self) -> &dyn KvStore {
        self.kv.as_ref()
    }

    pub(crate) fn raw_mut(&mut self) -> &mut dyn KvStore {
        self.kv.as_mut()
    }

    /// Scrape jobs discovered from target peers. Absent means none related.
    pub fn target_jobs(&self) -> Result<Vec<TargetJob>, StoreError> {
        Ok(self.get("target_jobs")?.unwrap_or_default())
    }

    /// Replace the discovered target-job list.
    pub fn set_target_jobs(&mut self, jobs: &[TargetJob]) -> Result<(), StoreError> {
        self.set("target_jobs", &jobs)
    }

    /// Flat list of fully-qualified scrape targets from scrape peers.
    pub fn scrape_jobs(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.get("scrape_jobs")?.unwrap_or_default())
    }

    /// Replace the flat scrape-target list.
    pub fn set_scrape_jobs(&mut self, targets: &[String]) -> Result<(), StoreError> {
        self.set("scrape_jobs", &targets)
    }

    /// Runtime flags for the managed daemon, flag name to value.
    pub fn runtime_args(&self) -> Result<BTreeMap<String, String>, StoreError> {
        Ok(self.get("runtime_args")?.unwrap_or_default())
    }

    /// Set or clear one runtime flag. `None` removes the flag.
    pub fn set_runtime_arg(&mut self, flag: &str, value: Option<&str>) -> Result<(), StoreError> {
        let mut args = self.runtime_args()?;
        match value {
            Some(v) => {
                args.insert(flag.to_string(), v.to_string());
            }
            None => {
                args.remove(flag);
            }
        }
        self.set("runtime_args", &args)
    }

    /// Runtime flags as `"flag value"` pair strings.
    ///
    /// The list is sorted so change detection does not fire on map
    /// iteration order.
    pub fn args_list(&self) -> Result<Vec<String>, StoreError> {
        let mut list: Vec<String> = self
            .runtime_args()?
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| format!("{} {}", k, v))
            .collect();
        list.sort();
        Ok(list)
    }

    /// Attached storage location, if any. Absent means the packaged
    /// default is in use.
    pub fn storage_path(&self) -> Result<Option<String>, StoreError> {
        self.get("storage_path")
    }

    /// Record the attached storage location.
    pub fn set_storage_path(&mut self, path: &str) -> Result<(), StoreError> {
        self.set("storage_path", &path)
    }

    /// Last network port opened for the daemon. Absent before the first
    /// configuration ever applied.
    pub fn tracked_port(&self) -> Result<Option<u16>, StoreError> {
        self.get("port")
    }

    /// Record the currently open port.
    pub fn set_tracked_port(&mut self, port: u16) -> Result<(), StoreError> {
        self.set("port", &port)
    }

    /// Whether the managed service has been started by a previous pass.
    pub fn started(&self) -> Result<bool, StoreError> {
        Ok(self.get("started")?.unwrap_or(false))
    }

    /// Mark the managed service as started.
    pub fn set_started(&mut self, started: bool) -> Result<(), StoreError> {
        self.set("started", &started)
    }
}

impl std::fmt::Debug for FactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactStore").finish_non_exhaustive()
    }
}
