//! Error types for the TireStock engine.

use thiserror::Error;

/// All possible errors from local domain operations.
///
/// Cache reads never error: an unparseable stored value is treated as an
/// empty collection. These variants cover the local write paths only.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid barcode '{0}': expected exactly 8 digits")]
    InvalidBarcode(String),

    #[error("barcode already registered: {0}")]
    DuplicateBarcode(String),

    #[error("stock entry not found: {0}")]
    EntryNotFound(String),

    #[error("barcode already discarded: {0}")]
    AlreadyDiscarded(String),

    #[error("container not found: {0}")]
    ContainerNotFound(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
