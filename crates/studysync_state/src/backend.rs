//! State backend trait definition.

use crate::error::StateResult;

/// A durable store of keyed string values.
///
/// Backends are **whole-value** stores: a `write` replaces the value for a
/// key atomically, and a subsequent `read` returns exactly the last value
/// written. The state layer owns all value interpretation - backends do not
/// understand configuration or timestamps.
///
/// # Invariants
///
/// - `read` after a successful `write` returns the written value, even
///   across process restarts for persistent backends
/// - a `write` that returns `Ok` is durable
/// - backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::MemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
pub trait StateBackend: Send + Sync {
    /// Reads the value for `key`, or `None` if it was never written.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn read(&self, key: &str) -> StateResult<Option<String>>;

    /// Replaces the value for `key`.
    ///
    /// After this returns successfully, the value is guaranteed to survive
    /// process termination (for persistent backends).
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or an I/O error occurs.
    fn write(&self, key: &str, value: &str) -> StateResult<()>;
}
