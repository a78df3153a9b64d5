//! Store, client, and clock seams for the sync engine.
//!
//! These traits abstract the browser-local persistence layer, the remote
//! HTTP API, and wall-clock time, allowing the reconciliation logic to be
//! unit-tested with fakes and a controllable clock.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use studysync_types::SyncableRecord;

/// Durable local CRUD over one domain's record collection.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Returns every record in the collection.
    async fn get_all(&self) -> SyncResult<Vec<SyncableRecord>>;

    /// Saves a record downloaded from the remote side.
    async fn save(&self, record: SyncableRecord) -> SyncResult<()>;
}

/// Network CRUD over one domain's record collection.
///
/// Errors carry an optional HTTP-style status; a 401-class status is the
/// signal the [`crate::FailureGovernor`] classifies as an auth failure.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Returns up to `limit` records starting at `offset`.
    async fn get_all(&self, limit: u32, offset: u32) -> SyncResult<Vec<SyncableRecord>>;

    /// Creates a record on the remote side.
    async fn create(&self, record: &SyncableRecord) -> SyncResult<()>;
}

/// A source of wall-clock time, injected so `last_sync_at` is testable.
pub trait Clock: Send + Sync {
    /// Current time as epoch milliseconds.
    fn now_epoch_ms(&self) -> u64;
}

/// The system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// A manually-advanced clock for tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    /// Creates a clock starting at the given epoch-millisecond time.
    pub fn starting_at(now_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(now_ms),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, delta_ms: u64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_epoch_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// An in-memory local store for testing.
#[derive(Debug, Default)]
pub struct MemoryLocalStore {
    records: RwLock<HashMap<String, SyncableRecord>>,
    save_failures: RwLock<HashSet<String>>,
}

impl MemoryLocalStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with records.
    pub fn with_records(records: impl IntoIterator<Item = SyncableRecord>) -> Self {
        let store = Self::new();
        store.seed(records);
        store
    }

    /// Inserts records directly, bypassing sync.
    pub fn seed(&self, records: impl IntoIterator<Item = SyncableRecord>) {
        let mut map = self.records.write();
        for record in records {
            map.insert(record.id.clone(), record);
        }
    }

    /// Makes `save` fail for the given record id.
    pub fn fail_save_for(&self, id: impl Into<String>) {
        self.save_failures.write().insert(id.into());
    }

    /// Returns the stored record ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.records.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Returns true if a record with this id is stored.
    pub fn contains(&self, id: &str) -> bool {
        self.records.read().contains_key(id)
    }
}

#[async_trait]
impl LocalStore for MemoryLocalStore {
    async fn get_all(&self) -> SyncResult<Vec<SyncableRecord>> {
        Ok(self.records.read().values().cloned().collect())
    }

    async fn save(&self, record: SyncableRecord) -> SyncResult<()> {
        if self.save_failures.read().contains(&record.id) {
            return Err(SyncError::local(format!(
                "simulated save failure for {}",
                record.id
            )));
        }
        self.records.write().insert(record.id.clone(), record);
        Ok(())
    }
}

/// A scripted failure for the in-memory remote client.
#[derive(Debug, Clone)]
struct ScriptedFailure {
    status: Option<u16>,
    message: String,
}

impl ScriptedFailure {
    fn to_error(&self) -> SyncError {
        SyncError::remote(self.status, self.message.clone())
    }
}

/// An in-memory remote client for testing.
///
/// Failures are scripted per record id (for `create`) or globally (for
/// `get_all`), in the style of a mock transport: set a response, run the
/// engine, assert on what happened.
#[derive(Debug, Default)]
pub struct MemoryRemoteClient {
    records: RwLock<HashMap<String, SyncableRecord>>,
    create_failures: RwLock<HashMap<String, ScriptedFailure>>,
    get_all_failure: RwLock<Option<ScriptedFailure>>,
    calls: AtomicU64,
}

impl MemoryRemoteClient {
    /// Creates a new empty client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a client seeded with records.
    pub fn with_records(records: impl IntoIterator<Item = SyncableRecord>) -> Self {
        let client = Self::new();
        client.seed(records);
        client
    }

    /// Inserts records directly, bypassing sync.
    pub fn seed(&self, records: impl IntoIterator<Item = SyncableRecord>) {
        let mut map = self.records.write();
        for record in records {
            map.insert(record.id.clone(), record);
        }
    }

    /// Makes `create` fail for the given record id with an HTTP-style status.
    pub fn fail_create_for(&self, id: impl Into<String>, status: Option<u16>, message: &str) {
        self.create_failures.write().insert(
            id.into(),
            ScriptedFailure {
                status,
                message: message.to_owned(),
            },
        );
    }

    /// Makes every `get_all` fail with an HTTP-style status.
    pub fn fail_get_all(&self, status: Option<u16>, message: &str) {
        *self.get_all_failure.write() = Some(ScriptedFailure {
            status,
            message: message.to_owned(),
        });
    }

    /// Clears a scripted `get_all` failure.
    pub fn clear_get_all_failure(&self) {
        *self.get_all_failure.write() = None;
    }

    /// Total number of network calls made against this client.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Returns the stored record ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.records.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Returns true if a record with this id is stored.
    pub fn contains(&self, id: &str) -> bool {
        self.records.read().contains_key(id)
    }
}

#[async_trait]
impl RemoteClient for MemoryRemoteClient {
    async fn get_all(&self, limit: u32, offset: u32) -> SyncResult<Vec<SyncableRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.get_all_failure.read().as_ref() {
            return Err(failure.to_error());
        }

        // Deterministic paging order for tests.
        let mut records: Vec<SyncableRecord> = self.records.read().values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn create(&self, record: &SyncableRecord) -> SyncResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.create_failures.read().get(&record.id) {
            return Err(failure.to_error());
        }
        self.records
            .write()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }
}
