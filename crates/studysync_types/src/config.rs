//! Persisted sync configuration.

use serde::{Deserialize, Serialize};

/// Default interval between automatic sync runs.
pub const DEFAULT_SYNC_INTERVAL_MS: u64 = 30_000;

/// User-facing sync configuration.
///
/// Owned by the state store: read once at startup and kept in memory, with
/// every mutation flushed to durable storage before it is considered
/// committed. Serialized with camelCase field names, matching the on-disk
/// format the application has always used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    /// Master switch; when false no sync runs at all, manual or automatic.
    pub enabled: bool,
    /// Whether the periodic timer is armed.
    pub auto_sync: bool,
    /// Interval between automatic runs, in milliseconds.
    pub sync_interval_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_sync: true,
            sync_interval_ms: DEFAULT_SYNC_INTERVAL_MS,
        }
    }
}

impl SyncConfig {
    /// Applies a partial update, returning the merged configuration.
    #[must_use]
    pub fn merged(self, update: SyncConfigUpdate) -> Self {
        Self {
            enabled: update.enabled.unwrap_or(self.enabled),
            auto_sync: update.auto_sync.unwrap_or(self.auto_sync),
            sync_interval_ms: update.sync_interval_ms.unwrap_or(self.sync_interval_ms),
        }
    }
}

/// A partial update to [`SyncConfig`]; `None` fields are left unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfigUpdate {
    /// New value for `enabled`, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// New value for `auto_sync`, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_sync: Option<bool>,
    /// New value for `sync_interval_ms`, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_interval_ms: Option<u64>,
}

impl SyncConfigUpdate {
    /// Sets `enabled`.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Sets `auto_sync`.
    #[must_use]
    pub fn auto_sync(mut self, auto_sync: bool) -> Self {
        self.auto_sync = Some(auto_sync);
        self
    }

    /// Sets `sync_interval_ms`.
    #[must_use]
    pub fn sync_interval_ms(mut self, interval: u64) -> Self {
        self.sync_interval_ms = Some(interval);
        self
    }
}
