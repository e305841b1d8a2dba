//! Per-service value store
//!
//! Stateful computations (rates, trend averages) keep their state between
//! check cycles in a key-value store scoped to one service on one host. The
//! store is always passed in explicitly; nothing in the engine holds global
//! state.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::constants::store as store_const;
use crate::error::{CheckmkError, Result};

/// Key-value state of a single check instance
pub trait ValueStore {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&mut self, key: &str, value: Value);
    fn remove(&mut self, key: &str) -> Option<Value>;
}

/// In-memory store, used by tests and one-shot evaluations
#[derive(Debug, Default, Clone)]
pub struct MemoryValueStore {
    values: HashMap<String, Value>,
}

impl MemoryValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ValueStore for MemoryValueStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }
}

/// On-disk layout of a value store file
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    values: BTreeMap<String, Value>,
}

impl StoreFile {
    const CURRENT_VERSION: u32 = 1;
}

/// Value store persisted as one JSON file per host and service
#[derive(Debug)]
pub struct JsonFileValueStore {
    path: PathBuf,
    values: BTreeMap<String, Value>,
    dirty: bool,
}

impl JsonFileValueStore {
    /// Load the store at `path`; a missing file yields an empty store
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            debug!("No value store at {:?}, starting empty", path);
            return Ok(Self {
                path,
                values: BTreeMap::new(),
                dirty: false,
            });
        }

        let content = fs::read_to_string(&path).map_err(|e| CheckmkError::FileRead {
            path: path.clone(),
            source: e,
        })?;
        let file: StoreFile = serde_json::from_str(&content)?;
        if file.version > StoreFile::CURRENT_VERSION {
            warn!(
                "Value store {:?} has newer version {}, reading anyway",
                path, file.version
            );
        }

        debug!("Loaded {} values from {:?}", file.values.len(), path);
        Ok(Self {
            path,
            values: file.values,
            dirty: false,
        })
    }

    /// Open the store of `service` on `host` below `dir`
    pub fn for_service(dir: &Path, host: &str, service: &str) -> Result<Self> {
        Self::open(service_store_path(dir, host, service)?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write the store back atomically (temp file, then rename)
    pub fn save(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| CheckmkError::FileWrite {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let file = StoreFile {
            version: StoreFile::CURRENT_VERSION,
            values: self.values.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        let temp_path = self.path.with_extension("json.tmp");
        let write_err = |e| CheckmkError::FileWrite {
            path: temp_path.clone(),
            source: e,
        };
        let mut handle = fs::File::create(&temp_path).map_err(write_err)?;
        handle.write_all(json.as_bytes()).map_err(write_err)?;
        handle.sync_all().map_err(write_err)?;
        drop(handle);

        fs::rename(&temp_path, &self.path).map_err(|e| CheckmkError::FileWrite {
            path: self.path.clone(),
            source: e,
        })?;

        self.dirty = false;
        debug!("Saved {} values to {:?}", self.values.len(), self.path);
        Ok(())
    }
}

impl ValueStore for JsonFileValueStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
        self.dirty = true;
    }

    fn remove(&mut self, key: &str) -> Option<Value> {
        let removed = self.values.remove(key);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }
}

lazy_static! {
    static ref UNSAFE_PATH_CHARS: Regex =
        Regex::new(r"[^A-Za-z0-9_.\-]").expect("valid regex");
}

/// Replace anything outside `[A-Za-z0-9_.-]` so names are safe as path components
pub fn sanitize_component(name: &str) -> Result<String> {
    let cleaned = UNSAFE_PATH_CHARS.replace_all(name, "_").to_string();
    // "." and ".." would escape the directory
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        return Err(CheckmkError::invalid_params(
            "name",
            format!("'{}' is not usable as a file name", name),
        ));
    }
    Ok(cleaned)
}

/// Path of the store file for `service` on `host`
pub fn service_store_path(dir: &Path, host: &str, service: &str) -> Result<PathBuf> {
    Ok(dir
        .join(sanitize_component(host)?)
        .join(format!("{}.json", sanitize_component(service)?)))
}

/// Default directory holding value store files
pub fn default_store_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(store_const::DATA_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(store_const::FALLBACK_DIR))
        .join(store_const::COUNTERS_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store() {
        let mut store = MemoryValueStore::new();
        assert!(store.get("a").is_none());
        store.set("a", json!([1.0, 2.0]));
        assert_eq!(store.get("a"), Some(json!([1.0, 2.0])));
        assert_eq!(store.remove("a"), Some(json!([1.0, 2.0])));
        assert!(store.is_empty());
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileValueStore::open(dir.path().join("absent.json")).unwrap();
        assert!(store.get("anything").is_none());
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = service_store_path(dir.path(), "switch 1", "Temperature CPU").unwrap();

        let mut store = JsonFileValueStore::open(&path).unwrap();
        store.set("temp.CPU.delta", json!([900.0, 10.0]));
        assert!(store.is_dirty());
        store.save().unwrap();
        assert!(!store.is_dirty());
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());

        let reloaded = JsonFileValueStore::open(&path).unwrap();
        assert_eq!(reloaded.get("temp.CPU.delta"), Some(json!([900.0, 10.0])));
    }

    #[test]
    fn test_file_store_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            JsonFileValueStore::open(&path),
            Err(CheckmkError::JsonParse(_))
        ));
    }

    #[test]
    fn test_sanitize_component() {
        assert_eq!(sanitize_component("switch 1").unwrap(), "switch_1");
        assert_eq!(sanitize_component("a/b").unwrap(), "a_b");
        assert_eq!(sanitize_component("host-1.example").unwrap(), "host-1.example");
        assert!(sanitize_component("..").is_err());
        assert!(sanitize_component("").is_err());
        for _ in 0..3 {
            assert_eq!(sanitize_component("Küche/1").unwrap(), "K_che_1");
        }
    }
}
