//! Domain records held by the local cache.
//!
//! Local records serialize as camelCase JSON, matching the cache entries
//! the dashboard reads and writes. Remote rows use snake_case columns and
//! live in the client crate; translation between the two shapes happens
//! there.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tire compound family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TireType {
    Slick,
    Wet,
}

impl Default for TireType {
    fn default() -> Self {
        TireType::Slick
    }
}

impl fmt::Display for TireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TireType::Slick => write!(f, "Slick"),
            TireType::Wet => write!(f, "Wet"),
        }
    }
}

impl FromStr for TireType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Slick" => Ok(TireType::Slick),
            "Wet" => Ok(TireType::Wet),
            other => Err(format!("unknown tire type: {other}")),
        }
    }
}

/// Lifecycle status of a stock entry.
///
/// `Novo` on intake, `Ativo` once deployed, `Descarte` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryStatus {
    Novo,
    Ativo,
    Descarte,
}

impl Default for EntryStatus {
    fn default() -> Self {
        EntryStatus::Novo
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryStatus::Novo => write!(f, "Novo"),
            EntryStatus::Ativo => write!(f, "Ativo"),
            EntryStatus::Descarte => write!(f, "Descarte"),
        }
    }
}

impl FromStr for EntryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Novo" => Ok(EntryStatus::Novo),
            "Ativo" => Ok(EntryStatus::Ativo),
            "Descarte" => Ok(EntryStatus::Descarte),
            other => Err(format!("unknown entry status: {other}")),
        }
    }
}

/// A tire model. Natural keys: `name` and the unique `code`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TireModel {
    pub local_id: String,
    pub name: String,
    pub code: String,
    #[serde(rename = "type")]
    pub tire_type: TireType,
}

/// A storage container. Natural key: unique `name`.
///
/// `current` is derived - it must equal the count of active entries
/// referencing the container. `current <= capacity` is advisory only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub local_id: String,
    pub name: String,
    pub location: String,
    pub capacity: u32,
    pub current: u32,
}

/// A stock entry. Natural key: globally unique 8-digit `barcode`.
///
/// Model fields are denormalized so the entry renders without a join;
/// the resolver maps them back to the remote surrogate id on push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockEntry {
    pub local_id: String,
    pub barcode: String,
    pub model_id: String,
    pub model_name: String,
    pub model_type: TireType,
    #[serde(default)]
    pub container_id: Option<String>,
    #[serde(default)]
    pub container_name: Option<String>,
    pub status: EntryStatus,
    pub timestamp: DateTime<Utc>,
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
}

impl StockEntry {
    /// An entry counts against its container until it is discarded.
    pub fn is_active(&self) -> bool {
        self.status != EntryStatus::Descarte
    }
}

/// Append-only audit record of a container-to-container transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TireMovement {
    /// Remote surrogate id, present once the row has been seen remotely.
    /// Rows without one are pending insert.
    #[serde(default)]
    pub remote_id: Option<String>,
    pub barcode: String,
    pub from_container: String,
    pub to_container: String,
    pub moved_by: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Append-only audit record of tire usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TireConsumption {
    #[serde(default)]
    pub remote_id: Option<String>,
    pub barcode: String,
    pub pilot: String,
    pub team: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub registered_by: String,
    pub timestamp: DateTime<Utc>,
}

/// Admin-managed status vocabulary entry. Natural key: unique `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TireStatusDef {
    pub name: String,
    pub color: String,
    pub is_default: bool,
}

/// The six record collections held by the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    TireModels,
    Containers,
    StockEntries,
    TireMovements,
    TireConsumption,
    TireStatus,
}

impl Collection {
    /// All collections, in the order the sync cycle processes them.
    pub const ALL: [Collection; 6] = [
        Collection::TireModels,
        Collection::Containers,
        Collection::StockEntries,
        Collection::TireMovements,
        Collection::TireConsumption,
        Collection::TireStatus,
    ];

    /// Key under which the collection is persisted in the backing store.
    pub fn storage_key(&self) -> &'static str {
        match self {
            Collection::TireModels => "tirestock.tire-models",
            Collection::Containers => "tirestock.containers",
            Collection::StockEntries => "tirestock.stock-entries",
            Collection::TireMovements => "tirestock.tire-movements",
            Collection::TireConsumption => "tirestock.tire-consumption",
            Collection::TireStatus => "tirestock.tire-status",
        }
    }

    /// Name of the change notification emitted after a mutation.
    pub fn event_name(&self) -> &'static str {
        match self {
            Collection::TireModels => "tire-models-updated",
            Collection::Containers => "containers-updated",
            Collection::StockEntries => "stock-entries-updated",
            Collection::TireMovements => "tire-movements-updated",
            Collection::TireConsumption => "tire-consumption-updated",
            Collection::TireStatus => "tire-status-updated",
        }
    }

    /// Remote table backing this collection.
    pub fn table(&self) -> &'static str {
        match self {
            Collection::TireModels => "tire_models",
            Collection::Containers => "containers",
            Collection::StockEntries => "stock_entries",
            Collection::TireMovements => "tire_movements",
            Collection::TireConsumption => "tire_consumption",
            Collection::TireStatus => "tire_status",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// Check that a barcode is exactly eight ASCII digits.
pub fn is_valid_barcode(barcode: &str) -> bool {
    barcode.len() == 8 && barcode.bytes().all(|b| b.is_ascii_digit())
}
