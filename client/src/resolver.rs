//! Natural-Key Resolver.
//!
//! The remote store keys rows by surrogate ids; the local cache keys the
//! same records by natural keys (model name/code, container name). Before
//! pushing stock entries the resolver maps those natural keys back to the
//! remote ids. The maps are built fresh from the rows pulled in the same
//! cycle - remote state may have changed, so nothing is cached across
//! cycles.
//!
//! Policy: an entry whose model cannot be resolved is excluded from the
//! push batch (logged, not fatal); an entry whose container cannot be
//! resolved is still pushed with `container_id = null`.

use crate::error::SyncError;
use crate::rows::{ContainerRow, StockEntryUpsert, TireModelRow};
use chrono::Utc;
use std::collections::HashMap;
use tirestock_engine::StockEntry;

/// Natural-key to remote-id maps for one push cycle.
#[derive(Debug, Default)]
pub struct KeyMaps {
    models: HashMap<String, String>,
    containers: HashMap<String, String>,
}

impl KeyMaps {
    /// Build maps from the remote rows pulled this cycle. Both the model
    /// name and its code map to the model id.
    pub fn build(models: &[TireModelRow], containers: &[ContainerRow]) -> Self {
        let mut model_map = HashMap::with_capacity(models.len() * 2);
        for row in models {
            model_map.insert(row.name.clone(), row.id.clone());
            model_map.insert(row.code.clone(), row.id.clone());
        }

        let container_map = containers
            .iter()
            .map(|row| (row.name.clone(), row.id.clone()))
            .collect();

        Self {
            models: model_map,
            containers: container_map,
        }
    }

    /// Resolve a model by name or code.
    pub fn model_id(&self, key: &str) -> Option<&str> {
        self.models.get(key).map(String::as_str)
    }

    /// Resolve a container by name.
    pub fn container_id(&self, name: &str) -> Option<&str> {
        self.containers.get(name).map(String::as_str)
    }

    /// Translate a local entry into its remote upsert payload.
    ///
    /// A resolvable model is mandatory; a resolvable container is
    /// optional.
    pub fn resolve_entry(&self, entry: &StockEntry) -> Result<StockEntryUpsert, SyncError> {
        let model_id = self
            .model_id(&entry.model_name)
            .or_else(|| self.model_id(&entry.model_id))
            .ok_or_else(|| SyncError::UnresolvedModel {
                barcode: entry.barcode.clone(),
                model: entry.model_name.clone(),
            })?;

        let container_id = entry
            .container_name
            .as_deref()
            .and_then(|name| self.container_id(name))
            .map(str::to_string);

        Ok(StockEntryUpsert {
            barcode: entry.barcode.clone(),
            model_id: model_id.to_string(),
            container_id,
            status: entry.status.to_string(),
            pilot: entry.pilot.clone(),
            team: entry.team.clone(),
            notes: entry.notes.clone(),
            discard_reason: entry.discard_reason.clone(),
            consumption_date: entry.consumption_date,
            updated_at: Utc::now(),
        })
    }
}
