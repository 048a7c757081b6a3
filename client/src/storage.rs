//! File-backed storage for the local cache.
//!
//! Persists the cache as a single JSON object mapping storage keys to
//! their serialized collections. Reads are served from an in-memory
//! copy; every write rewrites the file through a temp-file rename so a
//! crash mid-write never leaves a truncated cache behind.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tirestock_engine::StorageBackend;
use uuid::Uuid;

pub struct FileBackend {
    path: PathBuf,
    values: Mutex<HashMap<String, String>>,
}

impl FileBackend {
    /// Opens the cache file at `path`, creating an empty cache when the
    /// file is missing or unreadable.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = Self::read_file(&path).unwrap_or_default();
        Self {
            path,
            values: Mutex::new(values),
        }
    }

    fn read_file(path: &Path) -> Option<HashMap<String, String>> {
        let raw = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(map) => Some(map),
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "cache file unparseable, starting empty");
                None
            }
        }
    }

    fn write_file(&self, values: &HashMap<String, String>) {
        let raw = match serde_json::to_string(values) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::error!(%err, "failed to serialize cache");
                return;
            }
        };
        let tmp = self
            .path
            .with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        if let Err(err) = fs::write(&tmp, raw).and_then(|_| fs::rename(&tmp, &self.path)) {
            tracing::error!(path = %self.path.display(), %err, "failed to persist cache");
            let _ = fs::remove_file(&tmp);
        }
    }
}

impl StorageBackend for FileBackend {
    fn load(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn store(&self, key: &str, value: String) {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value);
        self.write_file(&values);
    }
}
