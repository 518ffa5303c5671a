//! Single-file JSON store.
//!
//! The whole store is one pretty-printed JSON object on disk, loaded once
//! at open and cached in memory. Every mutation rewrites the file through
//! a temp file + rename so a crash mid-write never leaves a truncated
//! store behind.

use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};
use tracing::debug;

use frpdesk_core::ports::{KvStore, StoreError};

/// File-backed [`KvStore`].
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    cache: Mutex<Map<String, Value>>,
}

impl JsonFileStore {
    /// Open the store at `path`, loading existing content.
    ///
    /// A missing file is an empty store. A file that exists but fails to
    /// parse is surfaced as [`StoreError::Malformed`] rather than silently
    /// replaced, so user data is never clobbered by a typo'd edit.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let cache = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| StoreError::Malformed(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(StoreError::Io(e.to_string())),
        };
        debug!(path = %path.display(), keys = cache.len(), "store opened");
        Ok(Self {
            path,
            cache: Mutex::new(cache),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_cache(&self) -> MutexGuard<'_, Map<String, Value>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map_or_else(|| OsString::from("store"), OsStr::to_os_string);
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Write the whole map to disk: temp file, then atomic rename.
    fn persist(&self, map: &Map<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        let contents =
            serde_json::to_string_pretty(map).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let temp = self.temp_path();
        fs::write(&temp, contents).map_err(|e| StoreError::Io(e.to_string()))?;
        fs::rename(&temp, &self.path).map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(())
    }
}

impl KvStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.lock_cache().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut cache = self.lock_cache();
        cache.insert(key.to_string(), value);
        self.persist(&cache)
    }

    fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut cache = self.lock_cache();
        if cache.remove(key).is_none() {
            return Ok(false);
        }
        self.persist(&cache)?;
        Ok(true)
    }

    fn has(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.lock_cache().contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> JsonFileStore {
        JsonFileStore::open(dir.path().join("frpdesk.json")).expect("open failed")
    }

    #[test]
    fn missing_file_opens_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.get("tunnels").unwrap(), None);
        assert!(!store.has("tunnels").unwrap());
    }

    #[test]
    fn set_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frpdesk.json");

        let store = JsonFileStore::open(&path).unwrap();
        store.set("tunnels", json!([{"id": 1}])).unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get("tunnels").unwrap(), Some(json!([{"id": 1}])));
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deeper").join("frpdesk.json");

        let store = JsonFileStore::open(&path).unwrap();
        store.set("servers", json!([])).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn malformed_file_is_surfaced_not_clobbered() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frpdesk.json");
        fs::write(&path, "{ not json").unwrap();

        let err = JsonFileStore::open(&path).unwrap_err();
        assert!(matches!(err, StoreError::Malformed(_)));
        // the broken file is still there for the user to fix
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn delete_reports_presence_and_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frpdesk.json");

        let store = JsonFileStore::open(&path).unwrap();
        store.set("tunnels", json!([])).unwrap();
        assert!(store.delete("tunnels").unwrap());
        assert!(!store.delete("tunnels").unwrap());
        drop(store);

        let reopened = JsonFileStore::open(&path).unwrap();
        assert!(!reopened.has("tunnels").unwrap());
    }

    #[test]
    fn writes_leave_no_temp_file_behind() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.set("tunnels", json!([])).unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().and_then(OsStr::to_str) == Some("tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn output_is_pretty_printed() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.set("tunnels", json!([{"id": 1}])).unwrap();

        let contents = fs::read_to_string(store.path()).unwrap();
        assert!(contents.contains('\n'));
        assert!(contents.starts_with('{'));
    }
}
