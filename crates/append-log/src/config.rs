//! Append log configuration

use serde::{Deserialize, Serialize};

/// Per-stream configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Flush file data to disk before a new tail is published (default: false)
    pub sync_writes: bool,
}

impl StreamConfig {
    /// Create a new configuration with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable `sync_data` before each tail update
    #[must_use]
    pub const fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }
}
