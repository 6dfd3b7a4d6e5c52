//! JSON-file storage backend.
//!
//! The whole key space lives in one JSON object that is rewritten on every
//! mutation, the same durability model as browser local storage.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::Storage;
use crate::error::{CacheError, Result};

/// Storage persisted to a single JSON file
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    items: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open (or create on first write) the file at `path`.
    ///
    /// A file that cannot be parsed is treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let items = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Corrupt cache file, starting empty");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), entries = items.len(), "Opened file storage");

        Ok(Self {
            path,
            items: Mutex::new(items),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, String>>> {
        self.items
            .lock()
            .map_err(|_| CacheError::Storage("file storage lock poisoned".into()))
    }

    fn persist(&self, items: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec(items)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: String) -> Result<()> {
        let mut items = self.lock()?;
        let previous = items.insert(key.to_string(), value);

        if let Err(e) = self.persist(&items) {
            match previous {
                Some(old) => items.insert(key.to_string(), old),
                None => items.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<bool> {
        self.remove_items(&[key.to_string()]).map(|n| n > 0)
    }

    fn remove_items(&self, keys: &[String]) -> Result<usize> {
        let mut items = self.lock()?;
        let removed: Vec<(String, String)> = keys
            .iter()
            .filter_map(|key| items.remove_entry(key.as_str()))
            .collect();

        if removed.is_empty() {
            return Ok(0);
        }

        // Memory and file must agree, so restore on a failed write
        if let Err(e) = self.persist(&items) {
            items.extend(removed);
            return Err(e);
        }
        Ok(removed.len())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let storage = FileStorage::open(&path).unwrap();
        storage.set_item("fieldops-cache:teams", "[]".into()).unwrap();
        drop(storage);

        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(
            reopened.get_item("fieldops-cache:teams").unwrap().as_deref(),
            Some("[]")
        );
    }

    #[test]
    fn test_corrupt_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "{not json").unwrap();

        let storage = FileStorage::open(&path).unwrap();
        assert!(storage.keys().unwrap().is_empty());
    }

    #[test]
    fn test_remove_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");

        let storage = FileStorage::open(&path).unwrap();
        storage.set_item("a", "1".into()).unwrap();
        storage.set_item("b", "2".into()).unwrap();
        assert!(storage.remove_item("a").unwrap());

        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(reopened.keys().unwrap(), vec!["b".to_string()]);
    }

    #[test]
    fn test_failed_remove_keeps_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let storage = FileStorage::open(&path).unwrap();
        storage.set_item("a", "1".into()).unwrap();

        // A directory where the temp file goes makes the write fail
        let tmp = path.with_extension("tmp");
        fs::create_dir(&tmp).unwrap();

        assert!(storage.remove_item("a").is_err());
        assert_eq!(storage.get_item("a").unwrap().as_deref(), Some("1"));

        fs::remove_dir(&tmp).unwrap();
        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(reopened.get_item("a").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn test_batch_remove_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let storage = FileStorage::open(&path).unwrap();
        for key in ["a", "b", "c"] {
            storage.set_item(key, "1".into()).unwrap();
        }

        let doomed = vec!["a".to_string(), "c".to_string(), "missing".to_string()];
        assert_eq!(storage.remove_items(&doomed).unwrap(), 2);

        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(reopened.keys().unwrap(), vec!["b".to_string()]);
    }

    #[test]
    fn test_failed_batch_remove_restores_all() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let storage = FileStorage::open(&path).unwrap();
        storage.set_item("a", "1".into()).unwrap();
        storage.set_item("b", "2".into()).unwrap();
        fs::create_dir(path.with_extension("tmp")).unwrap();

        let doomed = vec!["a".to_string(), "b".to_string()];
        assert!(storage.remove_items(&doomed).is_err());
        assert_eq!(storage.keys().unwrap(), vec!["a".to_string(), "b".to_string()]);
    }
}
