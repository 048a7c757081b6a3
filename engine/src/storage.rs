//! Pluggable key-value backend for the local cache.
//!
//! The cache persists one JSON-encoded entry per collection under a stable
//! key. The backend is deliberately tiny - load and store strings - so the
//! same cache logic runs over an in-memory map in tests and over a file in
//! the daemon.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Key-value storage for JSON-encoded collections.
///
/// Implementations must tolerate keys they have never seen (returning
/// `None`) and values written by unrelated software (the cache treats
/// unparseable values as empty collections).
pub trait StorageBackend: Send + Sync {
    /// Load the raw value stored under `key`, if any.
    fn load(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous value.
    fn store(&self, key: &str, value: String);
}

/// In-memory backend, used by tests and as a scratch cache.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn load(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn store(&self, key: &str, value: String) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
    }
}
