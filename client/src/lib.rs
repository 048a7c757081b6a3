//! Tirestock client: connects the pure engine to a remote inventory
//! backend.
//!
//! The engine owns the local cache and the merge/operation logic; this
//! crate supplies everything that touches the outside world:
//!
//! - [`gateway`]: HTTP access to the remote REST tables
//! - [`session`]: who the current user is and whether they are an admin
//! - [`resolver`]: natural-key resolution of local records to remote ids
//! - [`sync`]: the two-phase pull/push reconciliation cycle
//! - [`scheduler`]: periodic and change-driven cycle triggering
//! - [`storage`]: the file-backed cache the engine persists into

pub mod config;
pub mod error;
pub mod gateway;
pub mod resolver;
pub mod rows;
pub mod scheduler;
pub mod session;
pub mod storage;
pub mod sync;

pub use config::Config;
pub use error::{Result, SyncError};
pub use gateway::{HttpRemoteStore, RemoteStore};
pub use resolver::KeyMaps;
pub use scheduler::{SchedulerConfig, SyncScheduler, SyncStatus};
pub use session::{FixedIdentity, HttpIdentityProvider, Identity, IdentityProvider, Role};
pub use storage::FileBackend;
pub use sync::{SyncEngine, SyncReport};
