//! Union-merge of remote and local record collections.
//!
//! The pull phase must not discard records this node created but has not
//! pushed yet (offline intake). The merged collection is the remote set,
//! in remote order, followed by every local record whose natural key the
//! remote set does not contain. On key overlap the remote version is
//! authoritative.

use crate::model::{Container, StockEntry, TireModel, TireStatusDef};
use std::collections::HashSet;
use std::hash::Hash;

/// Merge a remote collection with the pre-existing local one, keyed by
/// the collection's natural key.
pub fn union_merge_by_key<T, K, F>(remote: Vec<T>, local: &[T], key: F) -> Vec<T>
where
    T: Clone,
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let remote_keys: HashSet<K> = remote.iter().map(&key).collect();

    let mut merged = Vec::with_capacity(remote.len() + local.len());
    merged.extend(remote);
    merged.extend(
        local
            .iter()
            .filter(|r| !remote_keys.contains(&key(r)))
            .cloned(),
    );
    merged
}

/// Merge remote stock entries with the pre-existing local set, keyed by
/// barcode.
pub fn union_merge_entries(remote: Vec<StockEntry>, local: &[StockEntry]) -> Vec<StockEntry> {
    union_merge_by_key(remote, local, |e| e.barcode.clone())
}

/// Merge tire models, keyed by code.
pub fn union_merge_models(remote: Vec<TireModel>, local: &[TireModel]) -> Vec<TireModel> {
    union_merge_by_key(remote, local, |m| m.code.clone())
}

/// Merge containers, keyed by name.
pub fn union_merge_containers(remote: Vec<Container>, local: &[Container]) -> Vec<Container> {
    union_merge_by_key(remote, local, |c| c.name.clone())
}

/// Merge status definitions, keyed by name.
pub fn union_merge_status(
    remote: Vec<TireStatusDef>,
    local: &[TireStatusDef],
) -> Vec<TireStatusDef> {
    union_merge_by_key(remote, local, |s| s.name.clone())
}
