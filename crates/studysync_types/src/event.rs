//! Observer events.

/// An event emitted at the end of a sync run for external observers,
/// typically a status indicator in the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A run finished and at least one domain reconciled successfully.
    Completed {
        /// Time the aggregate run finished, epoch milliseconds.
        last_sync_at: u64,
    },
    /// A run finished with no successful domain, or was aborted.
    Error {
        /// Description of the dominant failure.
        message: String,
    },
}
