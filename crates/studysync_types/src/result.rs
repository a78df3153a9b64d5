//! Per-run reconciliation results.

use crate::domain::Domain;

/// A record that failed to upload or download during a run.
///
/// One failing record never aborts the rest of its batch; it is recorded
/// here and the batch continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    /// The failing record's id.
    pub id: String,
    /// Human-readable description of the failure.
    pub error: String,
}

impl RecordFailure {
    /// Creates a new record failure.
    pub fn new(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            error: error.into(),
        }
    }
}

/// The outcome of reconciling one domain.
///
/// Produced once per domain per run, consumed by eventing and logging;
/// never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainSyncResult {
    /// The domain that was reconciled.
    pub domain: Domain,
    /// Ids of records uploaded to the remote side.
    pub uploaded_ids: Vec<String>,
    /// Ids of records downloaded into the local store.
    pub downloaded_ids: Vec<String>,
    /// Records that failed in either direction.
    pub failures: Vec<RecordFailure>,
}

impl DomainSyncResult {
    /// Creates an empty result for a domain.
    pub fn empty(domain: Domain) -> Self {
        Self {
            domain,
            uploaded_ids: Vec::new(),
            downloaded_ids: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Returns true if nothing moved and nothing failed.
    pub fn is_noop(&self) -> bool {
        self.uploaded_ids.is_empty() && self.downloaded_ids.is_empty() && self.failures.is_empty()
    }

    /// Total number of records transferred in either direction.
    pub fn transferred(&self) -> usize {
        self.uploaded_ids.len() + self.downloaded_ids.len()
    }
}
