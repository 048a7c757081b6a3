//! Local Cache Store - typed accessors over the key-value backend.
//!
//! Each of the six collections is persisted as one JSON-encoded sequence
//! under a stable key. Reads preserve insertion order and never fail: a
//! missing or unparseable value is an empty collection, favoring
//! availability over surfacing corruption. Writes replace the whole
//! collection and then emit exactly one change notification.
//!
//! Change notifications use an explicit observer interface rather than an
//! ambient event bus, so the sync scheduler and any UI layer can subscribe
//! without coupling to a host framework.

use crate::model::{
    Collection, Container, StockEntry, TireConsumption, TireModel, TireMovement, TireStatusDef,
};
use crate::storage::{MemoryBackend, StorageBackend};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::{Mutex, PoisonError};

/// Callback invoked after a collection changes.
///
/// Listeners run synchronously on the mutating call, under the listener
/// registry lock; they must not call back into the cache.
pub type ChangeListener = Box<dyn Fn(Collection) + Send + Sync>;

/// The local cache store owning the on-disk representation of all six
/// collections.
pub struct CacheStore {
    backend: Box<dyn StorageBackend>,
    listeners: Mutex<Vec<ChangeListener>>,
}

impl CacheStore {
    /// Create a cache store over the given backend.
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self {
            backend,
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Create a cache store over a fresh in-memory backend.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryBackend::new()))
    }

    /// Register a change listener. Fired once per mutating call with the
    /// collection that changed.
    pub fn on_change(&self, listener: ChangeListener) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    fn notify(&self, collection: Collection) {
        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for listener in listeners.iter() {
            listener(collection);
        }
    }

    /// Read a collection. Missing or corrupt values read as empty.
    pub fn get<T: DeserializeOwned>(&self, collection: Collection) -> Vec<T> {
        match self.backend.load(collection.storage_key()) {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            None => Vec::new(),
        }
    }

    /// Replace a collection atomically and emit one change notification.
    pub fn set<T: Serialize>(&self, collection: Collection, records: &[T]) {
        // Serialization of our own record types cannot fail; fall back to
        // an empty list rather than poisoning the stored value.
        let raw = serde_json::to_string(records).unwrap_or_else(|_| "[]".to_string());
        self.backend.store(collection.storage_key(), raw);
        self.notify(collection);
    }

    // Typed accessors, one pair per collection.

    pub fn tire_models(&self) -> Vec<TireModel> {
        self.get(Collection::TireModels)
    }

    pub fn set_tire_models(&self, records: &[TireModel]) {
        self.set(Collection::TireModels, records);
    }

    pub fn containers(&self) -> Vec<Container> {
        self.get(Collection::Containers)
    }

    pub fn set_containers(&self, records: &[Container]) {
        self.set(Collection::Containers, records);
    }

    pub fn stock_entries(&self) -> Vec<StockEntry> {
        self.get(Collection::StockEntries)
    }

    pub fn set_stock_entries(&self, records: &[StockEntry]) {
        self.set(Collection::StockEntries, records);
    }

    pub fn tire_movements(&self) -> Vec<TireMovement> {
        self.get(Collection::TireMovements)
    }

    pub fn set_tire_movements(&self, records: &[TireMovement]) {
        self.set(Collection::TireMovements, records);
    }

    pub fn tire_consumption(&self) -> Vec<TireConsumption> {
        self.get(Collection::TireConsumption)
    }

    pub fn set_tire_consumption(&self, records: &[TireConsumption]) {
        self.set(Collection::TireConsumption, records);
    }

    pub fn tire_status(&self) -> Vec<TireStatusDef> {
        self.get(Collection::TireStatus)
    }

    pub fn set_tire_status(&self, records: &[TireStatusDef]) {
        self.set(Collection::TireStatus, records);
    }
}
