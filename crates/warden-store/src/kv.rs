//! Key-value persistence backends.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::StoreError;

/// Durable key-value storage.
///
/// Values live across process invocations. Writes are last-write-wins; no
/// history is retained. The engine is the single writer, so implementations
/// need no locking discipline beyond sequential access.
pub trait KvStore {
    /// Look up the current value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Remove the value stored under `key`, if any.
    fn delete(&mut self, key: &str) -> Result<(), StoreError>;
}

/// In-memory store, used in tests and as a scratch backend.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: BTreeMap<String, Value>,
}

impl MemoryKv {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// File-backed store persisting all entries as a single JSON document.
///
/// The whole map is rewritten on every `set`/`delete` through a temporary
/// file followed by a rename, so a crash mid-write leaves the previous
/// state intact.
#[derive(Debug)]
pub struct FileKv {
    path: PathBuf,
    entries: BTreeMap<String, Value>,
}

impl FileKv {
    /// Open (or create) the store at `path`.
    ///
    /// A missing file is treated as an empty store; the file is created on
    /// the first write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), entries = entries.len(), "opened kv store");
        Ok(Self { path, entries })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            serde_json::to_writer_pretty(&mut file, &self.entries)?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KvStore for FileKv {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        self.flush()
    }

    fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn memory_kv_roundtrip() {
        let mut kv = MemoryKv::new();
        assert!(kv.get("port").unwrap().is_none());

        kv.set("port", json!(9090)).unwrap();
        assert_eq!(kv.get("port").unwrap(), Some(json!(9090)));

        kv.set("port", json!(9091)).unwrap();
        assert_eq!(kv.get("port").unwrap(), Some(json!(9091)));

        kv.delete("port").unwrap();
        assert!(kv.get("port").unwrap().is_none());
    }

    #[test]
    fn file_kv_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let kv = FileKv::open(dir.path().join("state.json")).unwrap();
        assert!(kv.get("anything").unwrap().is_none());
    }

    #[test]
    fn file_kv_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        {
            let mut kv = FileKv::open(&path).unwrap();
            kv.set("storage_path", json!("/srv/metrics")).unwrap();
            kv.set("runtime_args", json!({"-web.listen-port": "9090"}))
                .unwrap();
        }

        let kv = FileKv::open(&path).unwrap();
        assert_eq!(
            kv.get("storage_path").unwrap(),
            Some(json!("/srv/metrics"))
        );
        assert_eq!(
            kv.get("runtime_args").unwrap(),
            Some(json!({"-web.listen-port": "9090"}))
        );
    }

    #[test]
    fn file_kv_delete_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        {
            let mut kv = FileKv::open(&path).unwrap();
            kv.set("a", json!(1)).unwrap();
            kv.delete("a").unwrap();
        }

        let kv = FileKv::open(&path).unwrap();
        assert!(kv.get("a").unwrap().is_none());
    }
}
