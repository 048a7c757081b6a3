//! Bounded activity log for sync cycles.
//!
//! Process-lifetime only, never persisted. Holds at most
//! [`MAX_LOG_ENTRIES`] entries; the oldest is evicted first. The UI reads
//! it on demand through the log panel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// Maximum number of retained log entries.
pub const MAX_LOG_ENTRIES: usize = 50;

/// Kind of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOperation {
    Sync,
    Error,
}

/// One per-table outcome recorded during a sync cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncLogEntry {
    pub table: String,
    pub operation: LogOperation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Append-only ring buffer of sync outcomes.
#[derive(Debug, Default)]
pub struct SyncLog {
    entries: Mutex<VecDeque<SyncLogEntry>>,
}

impl SyncLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful table sync with the number of rows pushed.
    pub fn record_sync(&self, table: &str, count: usize) {
        self.push(SyncLogEntry {
            table: table.to_string(),
            operation: LogOperation::Sync,
            count: Some(count),
            message: format!("synced {count} rows"),
            timestamp: Utc::now(),
        });
    }

    /// Record a per-table failure.
    pub fn record_error(&self, table: &str, message: impl Into<String>) {
        self.push(SyncLogEntry {
            table: table.to_string(),
            operation: LogOperation::Error,
            count: None,
            message: message.into(),
            timestamp: Utc::now(),
        });
    }

    fn push(&self, entry: SyncLogEntry) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() == MAX_LOG_ENTRIES {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Snapshot of the log in insertion order (oldest first).
    pub fn entries(&self) -> Vec<SyncLogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
