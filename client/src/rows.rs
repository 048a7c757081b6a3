//! Remote row shapes and translation to/from the local records.
//!
//! The remote store uses snake_case columns and surrogate ids; the local
//! cache uses camelCase fields and natural keys. Pull translation turns a
//! row into a local record (denormalizing model and container names via
//! id lookups); push translation is done by the resolver, which maps
//! natural keys back to surrogate ids.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tirestock_engine::{
    Container, EntryStatus, StockEntry, TireConsumption, TireModel, TireMovement, TireStatusDef,
    TireType,
};

// ────────────────────────────────────────────────────────────────────────
// Rows as pulled from the remote store
// ────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TireModelRow {
    pub id: String,
    pub name: String,
    pub code: String,
    #[serde(rename = "type")]
    pub tire_type: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerRow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    pub capacity: i64,
    pub current_stock: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockEntryRow {
    pub id: String,
    pub barcode: String,
    pub model_id: String,
    #[serde(default)]
    pub container_id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub pilot: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub discard_reason: Option<String>,
    #[serde(default)]
    pub consumption_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementRow {
    pub id: String,
    pub barcode: String,
    pub from_container: String,
    pub to_container: String,
    pub moved_by: String,
    pub reason: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumptionRow {
    pub id: String,
    pub barcode: String,
    pub pilot: String,
    pub team: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub registered_by: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRow {
    pub id: String,
    pub name: String,
    pub color: String,
    pub is_default: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

// ────────────────────────────────────────────────────────────────────────
// Payloads pushed to the remote store
// ────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TireModelUpsert {
    pub name: String,
    pub code: String,
    #[serde(rename = "type")]
    pub tire_type: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerUpsert {
    pub name: String,
    pub location: String,
    pub capacity: i64,
    pub current_stock: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockEntryUpsert {
    pub barcode: String,
    pub model_id: String,
    pub container_id: Option<String>,
    pub status: String,
    pub pilot: Option<String>,
    pub team: Option<String>,
    pub notes: Option<String>,
    pub discard_reason: Option<String>,
    pub consumption_date: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementInsert {
    pub barcode: String,
    pub from_container: String,
    pub to_container: String,
    pub moved_by: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionInsert {
    pub barcode: String,
    pub pilot: String,
    pub team: String,
    pub notes: Option<String>,
    pub registered_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpsert {
    pub name: String,
    pub color: String,
    pub is_default: bool,
    pub updated_at: DateTime<Utc>,
}

// ────────────────────────────────────────────────────────────────────────
// Pull translation (remote row -> local record)
// ────────────────────────────────────────────────────────────────────────

impl TireModelRow {
    pub fn into_local(self) -> TireModel {
        TireModel {
            local_id: self.id,
            name: self.name,
            code: self.code,
            tire_type: self.tire_type.parse().unwrap_or_default(),
        }
    }
}

impl ContainerRow {
    pub fn into_local(self) -> Container {
        Container {
            local_id: self.id,
            name: self.name,
            location: self.location.unwrap_or_default(),
            capacity: self.capacity.max(0) as u32,
            current: self.current_stock.max(0) as u32,
        }
    }
}

impl StockEntryRow {
    /// Denormalize a remote entry row back into the local shape.
    ///
    /// Model name/type come from the model rows fetched in the same
    /// cycle; if the model row is missing (stale foreign key) the fields
    /// fall back to whatever the pre-existing local entry carried.
    pub fn into_local(
        self,
        models_by_id: &HashMap<String, TireModelRow>,
        containers_by_id: &HashMap<String, ContainerRow>,
        local_by_barcode: &HashMap<String, StockEntry>,
    ) -> StockEntry {
        let previous = local_by_barcode.get(&self.barcode);

        let (model_name, model_type) = match models_by_id.get(&self.model_id) {
            Some(model) => (
                model.name.clone(),
                model.tire_type.parse().unwrap_or_default(),
            ),
            None => match previous {
                Some(local) => (local.model_name.clone(), local.model_type),
                None => (self.model_id.clone(), TireType::default()),
            },
        };

        let container_name = self
            .container_id
            .as_ref()
            .and_then(|id| containers_by_id.get(id))
            .map(|c| c.name.clone())
            .or_else(|| previous.and_then(|local| local.container_name.clone()));

        StockEntry {
            local_id: self.id,
            barcode: self.barcode,
            model_id: self.model_id,
            model_name,
            model_type,
            container_id: self.container_id,
            container_name,
            status: self.status.parse().unwrap_or(EntryStatus::Novo),
            timestamp: self.created_at.unwrap_or_else(Utc::now),
            pilot: self.pilot,
            team: self.team,
            notes: self.notes,
            discard_reason: self.discard_reason,
            consumption_date: self.consumption_date,
        }
    }
}

impl MovementRow {
    pub fn into_local(self) -> TireMovement {
        TireMovement {
            remote_id: Some(self.id),
            barcode: self.barcode,
            from_container: self.from_container,
            to_container: self.to_container,
            moved_by: self.moved_by,
            reason: self.reason,
            timestamp: self.created_at.unwrap_or_else(Utc::now),
        }
    }
}

impl ConsumptionRow {
    pub fn into_local(self) -> TireConsumption {
        TireConsumption {
            remote_id: Some(self.id),
            barcode: self.barcode,
            pilot: self.pilot,
            team: self.team,
            notes: self.notes,
            registered_by: self.registered_by,
            timestamp: self.created_at.unwrap_or_else(Utc::now),
        }
    }
}

impl StatusRow {
    pub fn into_local(self) -> TireStatusDef {
        TireStatusDef {
            name: self.name,
            color: self.color,
            is_default: self.is_default,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────
// Push translation (local record -> payload)
// ────────────────────────────────────────────────────────────────────────

impl TireModelUpsert {
    pub fn from_local(model: &TireModel) -> Self {
        Self {
            name: model.name.clone(),
            code: model.code.clone(),
            tire_type: model.tire_type.to_string(),
            updated_at: Utc::now(),
        }
    }
}

impl ContainerUpsert {
    pub fn from_local(container: &Container) -> Self {
        Self {
            name: container.name.clone(),
            location: container.location.clone(),
            capacity: i64::from(container.capacity),
            current_stock: i64::from(container.current),
            updated_at: Utc::now(),
        }
    }
}

impl MovementInsert {
    pub fn from_local(movement: &TireMovement) -> Self {
        Self {
            barcode: movement.barcode.clone(),
            from_container: movement.from_container.clone(),
            to_container: movement.to_container.clone(),
            moved_by: movement.moved_by.clone(),
            reason: movement.reason.clone(),
            created_at: movement.timestamp,
        }
    }
}

impl ConsumptionInsert {
    pub fn from_local(consumption: &TireConsumption) -> Self {
        Self {
            barcode: consumption.barcode.clone(),
            pilot: consumption.pilot.clone(),
            team: consumption.team.clone(),
            notes: consumption.notes.clone(),
            registered_by: consumption.registered_by.clone(),
            created_at: consumption.timestamp,
        }
    }
}

impl StatusUpsert {
    pub fn from_local(status: &TireStatusDef) -> Self {
        Self {
            name: status.name.clone(),
            color: status.color.clone(),
            is_default: status.is_default,
            updated_at: Utc::now(),
        }
    }
}
