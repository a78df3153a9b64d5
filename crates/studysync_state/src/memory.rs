//! In-memory state backend for testing.

use crate::backend::StateBackend;
use crate::error::StateResult;
use parking_lot::RwLock;
use std::collections::HashMap;

/// An in-memory state backend.
///
/// Values live for the lifetime of the process. Suitable for unit tests
/// and for simulating restarts by handing the same backend to a fresh
/// [`super::SyncStateStore`].
///
/// # Example
///
/// ```rust
/// use studysync_state::{MemoryBackend, StateBackend};
///
/// let backend = MemoryBackend::new();
/// backend.write("lastSyncAt", "1724500000000").unwrap();
/// assert_eq!(
///     backend.read("lastSyncAt").unwrap().as_deref(),
///     Some("1724500000000")
/// );
/// ```
#[derive(Debug, Default)]
pub struct MemoryBackend {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored keys.
    ///
    /// Useful for testing.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// Returns true if no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl StateBackend for MemoryBackend {
    fn read(&self, key: &str) -> StateResult<Option<String>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> StateResult<()> {
        self.values.write().insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}
