//! The sync state store.

use crate::backend::StateBackend;
use crate::error::{StateError, StateResult};
use parking_lot::RwLock;
use studysync_types::{SyncConfig, SyncConfigUpdate};
use tracing::debug;

const CONFIG_KEY: &str = "config";
const LAST_SYNC_AT_KEY: &str = "lastSyncAt";

/// Durable holder of the sync configuration and last-sync timestamp.
///
/// The configuration is loaded once when the store is opened and cached in
/// memory. Every mutation persists the full merged value through the backend
/// *before* the cache is updated, so a `save_config` that returns `Ok` is
/// durable and a failed write leaves the cache on the previous committed
/// value.
pub struct SyncStateStore {
    backend: Box<dyn StateBackend>,
    config: RwLock<SyncConfig>,
    last_sync_at: RwLock<Option<u64>>,
}

impl SyncStateStore {
    /// Opens the store, loading persisted state.
    ///
    /// On first boot (no persisted config) the defaults are written out
    /// immediately so later boots see the same values.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or a persisted value is corrupt.
    pub fn open(backend: impl StateBackend + 'static) -> StateResult<Self> {
        let backend = Box::new(backend);

        let config = match backend.read(CONFIG_KEY)? {
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|e| StateError::corrupt(CONFIG_KEY, e.to_string()))?,
            None => {
                let defaults = SyncConfig::default();
                let raw = serde_json::to_string(&defaults)
                    .map_err(|e| StateError::corrupt(CONFIG_KEY, e.to_string()))?;
                backend.write(CONFIG_KEY, &raw)?;
                debug!("no persisted sync config, wrote defaults");
                defaults
            }
        };

        let last_sync_at = match backend.read(LAST_SYNC_AT_KEY)? {
            Some(raw) => Some(
                raw.trim()
                    .parse::<u64>()
                    .map_err(|e| StateError::corrupt(LAST_SYNC_AT_KEY, e.to_string()))?,
            ),
            None => None,
        };

        Ok(Self {
            backend,
            config: RwLock::new(config),
            last_sync_at: RwLock::new(last_sync_at),
        })
    }

    /// Returns the current configuration.
    pub fn config(&self) -> SyncConfig {
        *self.config.read()
    }

    /// Merges a partial update into the configuration and persists it.
    ///
    /// Returns the merged configuration. On return the new value is durable.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting fails; the in-memory configuration is
    /// left unchanged in that case.
    pub fn save_config(&self, update: SyncConfigUpdate) -> StateResult<SyncConfig> {
        let mut config = self.config.write();
        let merged = config.merged(update);

        let raw = serde_json::to_string(&merged)
            .map_err(|e| StateError::corrupt(CONFIG_KEY, e.to_string()))?;
        self.backend.write(CONFIG_KEY, &raw)?;

        *config = merged;
        debug!(?merged, "sync config saved");
        Ok(merged)
    }

    /// Returns the time the last successful run finished, epoch milliseconds.
    pub fn last_sync_at(&self) -> Option<u64> {
        *self.last_sync_at.read()
    }

    /// Records the time a successful run finished.
    ///
    /// Called once per successful run, not per domain.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting fails.
    pub fn set_last_sync_at(&self, timestamp_ms: u64) -> StateResult<()> {
        let mut last = self.last_sync_at.write();
        self.backend
            .write(LAST_SYNC_AT_KEY, &timestamp_ms.to_string())?;
        *last = Some(timestamp_ms);
        Ok(())
    }
}

impl std::fmt::Debug for SyncStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncStateStore")
            .field("config", &self.config())
            .field("last_sync_at", &self.last_sync_at())
            .finish()
    }
}
