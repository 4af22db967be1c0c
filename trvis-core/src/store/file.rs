//! File-backed key-value store.
//!
//! Storage layout:
//! ```text
//! ~/.local/share/trvis/
//! ├── trvis-projects.json
//! └── <other-key>.json
//! ```

use std::fs;
use std::io;
use std::path::PathBuf;

use super::{validate_key, KeyValueStore, StoreError};

const VALUE_EXTENSION: &str = "json";

/// Stores each key as `<key>.json` in a data directory.
#[derive(Clone, Debug)]
pub struct FileStore {
    data_dir: PathBuf,
}

impl FileStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    /// Returns the full path backing a key.
    pub fn path(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.data_dir.join(format!("{}.{}", key, VALUE_EXTENSION)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path(key)?;

        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(path, e)),
        }
    }

    /// Writes to a sibling temp file and renames it over the target, so a
    /// reader never sees a half-written value.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path(key)?;

        fs::create_dir_all(&self.data_dir)
            .map_err(|e| StoreError::Io(self.data_dir.clone(), e))?;

        let tmp_path = path.with_extension(format!("{}.tmp", VALUE_EXTENSION));
        fs::write(&tmp_path, value).map_err(|e| StoreError::Io(tmp_path.clone(), e))?;
        fs::rename(&tmp_path, &path).map_err(|e| StoreError::Io(path, e))?;

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path(key)?;

        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (FileStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path().to_path_buf());
        (store, temp_dir)
    }

    #[test]
    fn test_path_uses_json_extension() {
        let (store, _temp) = test_store();
        let path = store.path("trvis-projects").unwrap();
        assert!(path.ends_with("trvis-projects.json"));
    }

    #[test]
    fn test_get_missing_returns_none() {
        let (store, _temp) = test_store();
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_set_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("nested").join("data");
        let store = FileStore::new(nested.clone());

        store.set("key", "{}").unwrap();

        assert!(nested.join("key.json").exists());
        assert!(!nested.join("key.json.tmp").exists());
    }

    #[test]
    fn test_set_overwrites() {
        let (store, _temp) = test_store();
        store.set("key", "first").unwrap();
        store.set("key", "second").unwrap();
        assert_eq!(store.get("key").unwrap().as_deref(), Some("second"));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let (store, _temp) = test_store();
        store.set("key", "value").unwrap();
        store.remove("key").unwrap();
        store.remove("key").unwrap();
        assert!(store.get("key").unwrap().is_none());
    }

    #[test]
    fn test_rejects_path_like_keys() {
        let (store, _temp) = test_store();
        assert!(matches!(
            store.set("../escape", "x"),
            Err(StoreError::InvalidKey(_))
        ));
    }
}
