//! Syncable records.

use crate::domain::Domain;
use serde::{Deserialize, Serialize};

/// A record that participates in presence-based replication.
///
/// The `id` is assigned by the creating client at record-creation time and
/// is globally unique within its domain. It is the sole key used for
/// presence comparison: a record whose id exists on both sides is considered
/// synced and is never re-examined for content drift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncableRecord {
    /// Client-assigned record id, unique within the domain.
    pub id: String,
    /// The domain this record belongs to.
    pub domain: Domain,
    /// Opaque record contents; the engine never inspects these.
    pub payload: serde_json::Value,
}

impl SyncableRecord {
    /// Creates a new record.
    pub fn new(id: impl Into<String>, domain: Domain, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            domain,
            payload,
        }
    }
}
