//! Unified error handling for the sync client.

use thiserror::Error;

/// Errors from the remote gateway and the reconciliation engine.
///
/// Per-table failures never abort sibling tables; they surface as a
/// `false` in the cycle report and a sync log entry, not as a propagated
/// error. These variants exist for the points where a caller does need
/// the cause.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Transport or constraint failure talking to one remote table.
    #[error("remote error on {table}: {message}")]
    Remote { table: &'static str, message: String },

    /// HTTP transport failure outside any table-scoped call.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The operation required an authenticated identity.
    #[error("not authenticated")]
    Unauthenticated,

    /// A local record's foreign key could not be resolved remotely.
    #[error("unresolved model '{model}' for entry {barcode}")]
    UnresolvedModel { barcode: String, model: String },

    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl SyncError {
    /// Tag a failure with the remote table it belongs to.
    pub fn remote(table: &'static str, message: impl Into<String>) -> Self {
        SyncError::Remote {
            table,
            message: message.into(),
        }
    }
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, SyncError>;
