//! # TireStock Engine
//!
//! Local cache store and merge logic for the TireStock inventory sync.
//!
//! This crate is the pure half of the system: it knows nothing about the
//! network, the remote relational store, or timers. It owns the on-disk
//! representation of the six domain collections, the optimistic local
//! operations the dashboard performs, and the union-merge the
//! reconciliation cycle applies when remote rows arrive.
//!
//! ## Design Principles
//!
//! - **No IO**: persistence goes through the [`StorageBackend`] trait;
//!   the crate ships only an in-memory implementation
//! - **Availability over strictness**: a corrupt stored value reads as an
//!   empty collection, never as an error
//! - **Explicit observers**: collection change notifications are a
//!   subscription interface on the cache, not an ambient event bus
//!
//! ## Core Concepts
//!
//! ### Collections
//!
//! Six record collections ([`Collection`]): tire models, containers,
//! stock entries, movements, consumption and status definitions. Each is
//! persisted as one JSON-encoded sequence, insertion order preserved.
//!
//! ### Natural keys
//!
//! Records are identified locally by an opaque local id and reconciled
//! remotely by a natural key: the model `code`, the container `name`, the
//! entry `barcode` (exactly 8 digits). The client crate translates these
//! into remote surrogate ids before upload.
//!
//! ### Union-merge
//!
//! [`union_merge_entries`] keeps every remote entry plus every local
//! entry whose barcode the remote set does not contain, so entries
//! created offline survive a pull. The same merge applies to models,
//! containers and status definitions via their own natural keys.
//!
//! ### Activity log
//!
//! [`SyncLog`] is a bounded in-memory ring buffer (50 entries) of
//! per-table sync outcomes, read on demand by the UI.

pub mod cache;
pub mod error;
pub mod log;
pub mod merge;
pub mod model;
pub mod ops;
pub mod storage;

// Re-export main types at crate root
pub use cache::{CacheStore, ChangeListener};
pub use error::Error;
pub use log::{LogOperation, SyncLog, SyncLogEntry, MAX_LOG_ENTRIES};
pub use merge::{
    union_merge_by_key, union_merge_containers, union_merge_entries, union_merge_models,
    union_merge_status,
};
pub use model::{
    is_valid_barcode, Collection, Container, EntryStatus, StockEntry, TireConsumption, TireModel,
    TireMovement, TireStatusDef, TireType,
};
pub use storage::{MemoryBackend, StorageBackend};
