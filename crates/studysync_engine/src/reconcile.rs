//! Presence-based reconciliation.

use crate::error::{SyncError, SyncResult};
use crate::store::{LocalStore, RemoteClient};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use studysync_types::{Domain, DomainSyncResult, RecordFailure};
use tracing::{debug, warn};

/// Page size for remote snapshot fetches.
const REMOTE_PAGE_SIZE: u32 = 500;

struct DomainStores {
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteClient>,
}

/// Computes and applies the presence-based merge for registered domains.
///
/// For each domain the engine snapshots both record sets *before* mutating
/// either side, uploads the records missing remotely, and downloads the
/// records missing locally. Comparison is by record id only: a record
/// present on both sides is considered synced.
///
/// The engine makes no pause or retry decisions; it reports what happened
/// and leaves policy to the [`crate::FailureGovernor`].
pub struct ReconciliationEngine {
    domains: HashMap<Domain, DomainStores>,
}

impl ReconciliationEngine {
    /// Creates an engine with no registered domains.
    pub fn new() -> Self {
        Self {
            domains: HashMap::new(),
        }
    }

    /// Registers the store/client pair for a domain, replacing any previous
    /// registration.
    pub fn register(
        &mut self,
        domain: Domain,
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteClient>,
    ) -> &mut Self {
        self.domains.insert(domain, DomainStores { local, remote });
        self
    }

    /// Returns the registered domains in reconciliation order.
    pub fn domains(&self) -> Vec<Domain> {
        Domain::ALL
            .into_iter()
            .filter(|d| self.domains.contains_key(d))
            .collect()
    }

    /// Reconciles one domain.
    ///
    /// A failing snapshot fetch fails the whole domain (wrapped as
    /// [`SyncError::Domain`]). Per-record upload/download failures are
    /// recorded in the result and never abort the rest of the batch, with
    /// one exception: an auth failure aborts the domain so the governor
    /// can pause the scheduler instead of burying the signal in the
    /// failure list.
    ///
    /// # Errors
    ///
    /// Returns an error if the domain is unregistered, a snapshot fetch
    /// fails, or an auth failure surfaces mid-batch.
    pub async fn reconcile(&self, domain: Domain) -> SyncResult<DomainSyncResult> {
        let stores = self
            .domains
            .get(&domain)
            .ok_or(SyncError::UnknownDomain(domain))?;

        // Snapshot both sides before mutating either, so the diff never
        // sees a partially-mutated remote set.
        let local_records = stores
            .local
            .get_all()
            .await
            .map_err(|e| SyncError::for_domain(domain, e))?;
        let remote_records = Self::fetch_remote_snapshot(stores.remote.as_ref())
            .await
            .map_err(|e| SyncError::for_domain(domain, e))?;

        let local_ids: HashSet<&str> = local_records.iter().map(|r| r.id.as_str()).collect();
        let remote_ids: HashSet<&str> = remote_records.iter().map(|r| r.id.as_str()).collect();

        let to_upload: Vec<_> = local_records
            .iter()
            .filter(|r| !remote_ids.contains(r.id.as_str()))
            .collect();
        let to_download: Vec<_> = remote_records
            .iter()
            .filter(|r| !local_ids.contains(r.id.as_str()))
            .collect();

        debug!(
            %domain,
            local = local_records.len(),
            remote = remote_records.len(),
            to_upload = to_upload.len(),
            to_download = to_download.len(),
            "computed presence diff"
        );

        let mut result = DomainSyncResult::empty(domain);

        for record in to_upload {
            match stores.remote.create(record).await {
                Ok(()) => result.uploaded_ids.push(record.id.clone()),
                Err(e) if e.is_auth() => return Err(SyncError::for_domain(domain, e)),
                Err(e) => {
                    warn!(%domain, id = %record.id, error = %e, "record upload failed");
                    result.failures.push(RecordFailure::new(&record.id, e.to_string()));
                }
            }
        }

        for record in to_download {
            match stores.local.save(record.clone()).await {
                Ok(()) => result.downloaded_ids.push(record.id.clone()),
                Err(e) => {
                    warn!(%domain, id = %record.id, error = %e, "record download failed");
                    result.failures.push(RecordFailure::new(&record.id, e.to_string()));
                }
            }
        }

        Ok(result)
    }

    /// Fetches the full remote set, page by page.
    async fn fetch_remote_snapshot(
        remote: &dyn RemoteClient,
    ) -> SyncResult<Vec<studysync_types::SyncableRecord>> {
        let mut records = Vec::new();
        let mut offset = 0u32;

        loop {
            let page = remote.get_all(REMOTE_PAGE_SIZE, offset).await?;
            let len = page.len();
            records.extend(page);

            if len < REMOTE_PAGE_SIZE as usize {
                return Ok(records);
            }
            offset += REMOTE_PAGE_SIZE;
        }
    }
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new()
    }
}
