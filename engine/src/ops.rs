//! Optimistic local domain operations.
//!
//! Every operation here applies to the local cache synchronously and
//! returns before any network activity; the reconciliation engine pushes
//! the result to the remote store in the background. Failures on this
//! path are local validation failures only.
//!
//! Container occupancy is derived state: after any entry mutation the
//! affected containers are recounted from the active entries referencing
//! them.

use crate::cache::CacheStore;
use crate::error::{Error, Result};
use crate::model::{is_valid_barcode, EntryStatus, StockEntry, TireConsumption, TireMovement};
use chrono::Utc;

/// Register a new stock entry (intake). The entry starts as `Novo`.
pub fn register_entry(cache: &CacheStore, entry: StockEntry) -> Result<()> {
    if !is_valid_barcode(&entry.barcode) {
        return Err(Error::InvalidBarcode(entry.barcode));
    }

    let mut entries = cache.stock_entries();
    if entries.iter().any(|e| e.barcode == entry.barcode) {
        return Err(Error::DuplicateBarcode(entry.barcode));
    }

    entries.push(entry);
    cache.set_stock_entries(&entries);
    recount_containers(cache);
    Ok(())
}

/// Move an entry to another container, recording a movement audit row.
pub fn move_entry(
    cache: &CacheStore,
    barcode: &str,
    to_container: &str,
    moved_by: &str,
    reason: &str,
) -> Result<TireMovement> {
    let containers = cache.containers();
    let target = containers
        .iter()
        .find(|c| c.name == to_container)
        .ok_or_else(|| Error::ContainerNotFound(to_container.to_string()))?;

    let mut entries = cache.stock_entries();
    let entry = entries
        .iter_mut()
        .find(|e| e.barcode == barcode)
        .ok_or_else(|| Error::EntryNotFound(barcode.to_string()))?;
    if entry.status == EntryStatus::Descarte {
        return Err(Error::AlreadyDiscarded(barcode.to_string()));
    }

    let movement = TireMovement {
        remote_id: None,
        barcode: barcode.to_string(),
        from_container: entry.container_name.clone().unwrap_or_default(),
        to_container: target.name.clone(),
        moved_by: moved_by.to_string(),
        reason: reason.to_string(),
        timestamp: Utc::now(),
    };

    entry.container_id = Some(target.local_id.clone());
    entry.container_name = Some(target.name.clone());
    cache.set_stock_entries(&entries);

    let mut movements = cache.tire_movements();
    movements.push(movement.clone());
    cache.set_tire_movements(&movements);

    recount_containers(cache);
    Ok(movement)
}

/// Register usage of a tire, marking the entry `Ativo` and appending a
/// consumption audit row.
pub fn register_consumption(
    cache: &CacheStore,
    barcode: &str,
    pilot: &str,
    team: &str,
    notes: Option<&str>,
    registered_by: &str,
) -> Result<TireConsumption> {
    let mut entries = cache.stock_entries();
    let entry = entries
        .iter_mut()
        .find(|e| e.barcode == barcode)
        .ok_or_else(|| Error::EntryNotFound(barcode.to_string()))?;
    if entry.status == EntryStatus::Descarte {
        return Err(Error::AlreadyDiscarded(barcode.to_string()));
    }

    let now = Utc::now();
    entry.status = EntryStatus::Ativo;
    entry.pilot = Some(pilot.to_string());
    entry.team = Some(team.to_string());
    if let Some(notes) = notes {
        entry.notes = Some(notes.to_string());
    }
    entry.consumption_date = Some(now);
    cache.set_stock_entries(&entries);

    let consumption = TireConsumption {
        remote_id: None,
        barcode: barcode.to_string(),
        pilot: pilot.to_string(),
        team: team.to_string(),
        notes: notes.map(str::to_string),
        registered_by: registered_by.to_string(),
        timestamp: now,
    };
    let mut records = cache.tire_consumption();
    records.push(consumption.clone());
    cache.set_tire_consumption(&records);

    recount_containers(cache);
    Ok(consumption)
}

/// Discard an entry. Terminal: the container is cleared and a second
/// discard of the same barcode is rejected without mutating anything.
pub fn discard_entry(cache: &CacheStore, barcode: &str, reason: &str) -> Result<()> {
    let mut entries = cache.stock_entries();
    let entry = entries
        .iter_mut()
        .find(|e| e.barcode == barcode)
        .ok_or_else(|| Error::EntryNotFound(barcode.to_string()))?;
    if entry.status == EntryStatus::Descarte {
        return Err(Error::AlreadyDiscarded(barcode.to_string()));
    }

    entry.status = EntryStatus::Descarte;
    entry.container_id = None;
    entry.container_name = None;
    entry.discard_reason = Some(reason.to_string());
    cache.set_stock_entries(&entries);

    recount_containers(cache);
    Ok(())
}

/// Recompute every container's `current` from the active entries
/// referencing it.
pub fn recount_containers(cache: &CacheStore) {
    let entries = cache.stock_entries();
    let mut containers = cache.containers();
    let mut changed = false;

    for container in containers.iter_mut() {
        let current = entries
            .iter()
            .filter(|e| e.is_active() && e.container_name.as_deref() == Some(&container.name))
            .count() as u32;
        if container.current != current {
            container.current = current;
            changed = true;
        }
    }

    if changed {
        cache.set_containers(&containers);
    }
}
