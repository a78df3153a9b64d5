//! The sync scheduler.

use crate::governor::FailureGovernor;
use crate::reconcile::ReconciliationEngine;
use crate::store::{Clock, SystemClock};
use crate::SyncError;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use studysync_state::SyncStateStore;
use studysync_types::{Domain, DomainSyncResult, SyncEvent};
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Capacity of the observer event channel.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// The observable state of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No run in progress.
    Idle,
    /// A reconciliation run is in progress.
    Running,
    /// Automatic runs are suspended until [`SyncScheduler::resume`].
    Paused,
}

impl SchedulerState {
    /// Returns true if a run is in progress.
    pub fn is_running(&self) -> bool {
        matches!(self, SchedulerState::Running)
    }

    /// Returns true if automatic runs are suspended.
    pub fn is_paused(&self) -> bool {
        matches!(self, SchedulerState::Paused)
    }
}

struct Driver {
    shutdown: watch::Sender<bool>,
}

struct SchedulerInner {
    engine: ReconciliationEngine,
    state: Arc<SyncStateStore>,
    clock: Arc<dyn Clock>,
    online_rx: watch::Receiver<bool>,
    events: broadcast::Sender<SyncEvent>,
    /// The Idle/Running flag; checked-and-set atomically so concurrent
    /// triggers collapse into a single run.
    running: AtomicBool,
    paused: RwLock<Option<String>>,
    /// Whether `start()` armed the periodic driver; `resume()` uses this
    /// to rearm after an auth pause.
    auto_started: AtomicBool,
    driver: Mutex<Option<Driver>>,
}

/// Coordinates timer, connectivity, and manual triggers into a single
/// safely-serialized reconciliation run.
///
/// All trigger sources funnel into the same guarded entry point; a run
/// proceeds only when sync is enabled, the device is online, no run is
/// already in progress, and (for automatic triggers) the scheduler is not
/// paused. A failing guard makes the trigger a silent no-op.
///
/// The scheduler is cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct SyncScheduler {
    inner: Arc<SchedulerInner>,
}

impl SyncScheduler {
    /// Creates a scheduler using the system clock.
    ///
    /// `online_rx` is the platform connectivity signal: `true` while the
    /// device is online. The sender side is owned by the embedding
    /// application.
    pub fn new(
        engine: ReconciliationEngine,
        state: Arc<SyncStateStore>,
        online_rx: watch::Receiver<bool>,
    ) -> Self {
        Self::with_clock(engine, state, online_rx, Arc::new(SystemClock))
    }

    /// Creates a scheduler with an injected clock.
    pub fn with_clock(
        engine: ReconciliationEngine,
        state: Arc<SyncStateStore>,
        online_rx: watch::Receiver<bool>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(SchedulerInner {
                engine,
                state,
                clock,
                online_rx,
                events,
                running: AtomicBool::new(false),
                paused: RwLock::new(None),
                auto_started: AtomicBool::new(false),
                driver: Mutex::new(None),
            }),
        }
    }

    /// Arms the periodic driver.
    ///
    /// Requires `enabled` and `auto_sync`; a no-op otherwise, and while
    /// paused. The driver ticks at `sync_interval_ms` (read at arm time;
    /// settings changes restart the scheduler) and also attempts a run
    /// whenever connectivity transitions to online.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let config = self.inner.state.config();
        if !config.enabled || !config.auto_sync {
            debug!("auto sync disabled, scheduler not started");
            return;
        }
        if self.inner.paused.read().is_some() {
            debug!("scheduler is paused, not starting");
            return;
        }

        self.inner.auto_started.store(true, Ordering::SeqCst);
        self.inner.arm_driver();
    }

    /// Cancels the periodic driver.
    ///
    /// A run already in progress finishes normally.
    pub fn stop(&self) {
        self.inner.auto_started.store(false, Ordering::SeqCst);
        self.inner.shutdown_driver();
    }

    /// Manual trigger; the explicit retry path.
    ///
    /// Bypasses the paused guard (pause only suspends *automatic* runs)
    /// but still requires `enabled`, connectivity, and no run in progress.
    /// Returns `None` when a guard made the call a no-op.
    pub async fn sync_now(&self) -> Option<Vec<DomainSyncResult>> {
        self.inner.run_guarded(true).await
    }

    /// Automatic-trigger entry point, honoring every guard.
    ///
    /// Returns `None` when a guard made the call a no-op.
    pub async fn run_all(&self) -> Option<Vec<DomainSyncResult>> {
        self.inner.run_guarded(false).await
    }

    /// Suspends automatic runs and cancels the periodic driver.
    pub fn pause(&self, reason: impl Into<String>) {
        self.inner.pause(reason.into());
    }

    /// Clears the paused state, rearming the periodic driver if `start()`
    /// had armed it before the pause.
    pub fn resume(&self) {
        if self.inner.paused.write().take().is_some() {
            info!("automatic sync resumed");
        }
        if self.inner.auto_started.load(Ordering::SeqCst) {
            self.inner.arm_driver();
        }
    }

    /// Subscribes to completion/error events.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    /// Returns the current scheduler state.
    pub fn state(&self) -> SchedulerState {
        if self.inner.running.load(Ordering::SeqCst) {
            SchedulerState::Running
        } else if self.inner.paused.read().is_some() {
            SchedulerState::Paused
        } else {
            SchedulerState::Idle
        }
    }

    /// Returns the reason automatic runs are paused, if they are.
    pub fn paused_reason(&self) -> Option<String> {
        self.inner.paused.read().clone()
    }
}

impl SchedulerInner {
    fn pause(&self, reason: String) {
        warn!(%reason, "pausing automatic sync");
        *self.paused.write() = Some(reason);
        self.shutdown_driver();
    }

    fn shutdown_driver(&self) {
        if let Some(driver) = self.driver.lock().take() {
            // The driver exits at its next select poll; an in-flight run
            // completes first.
            let _ = driver.shutdown.send(true);
        }
    }

    fn arm_driver(self: &Arc<Self>) {
        let mut driver = self.driver.lock();
        if driver.is_some() {
            return;
        }

        let interval = Duration::from_millis(self.state.config().sync_interval_ms.max(1));
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let inner = Arc::clone(self);

        tokio::spawn(async move {
            let mut online_rx = inner.online_rx.clone();
            let mut online_open = true;
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick resolves immediately; arming is not a trigger.
            ticker.tick().await;

            debug!(interval_ms = interval.as_millis() as u64, "sync driver armed");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        inner.run_guarded(false).await;
                    }
                    changed = online_rx.changed(), if online_open => match changed {
                        Ok(()) => {
                            if *online_rx.borrow_and_update() {
                                debug!("connectivity restored, attempting sync");
                                inner.run_guarded(false).await;
                            }
                        }
                        Err(_) => online_open = false,
                    },
                    _ = shutdown_rx.changed() => break,
                }
            }
            debug!("sync driver stopped");
        });

        *driver = Some(Driver {
            shutdown: shutdown_tx,
        });
    }

    /// The guarded entry point shared by every trigger source.
    async fn run_guarded(&self, manual: bool) -> Option<Vec<DomainSyncResult>> {
        let config = self.state.config();
        if !config.enabled {
            debug!("sync disabled, skipping run");
            return None;
        }
        if !*self.online_rx.borrow() {
            debug!("offline, skipping run");
            return None;
        }
        if !manual && self.paused.read().is_some() {
            debug!("scheduler paused, skipping automatic run");
            return None;
        }
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("run already in progress, skipping");
            return None;
        }

        let results = self.run_domains().await;
        self.running.store(false, Ordering::SeqCst);
        Some(results)
    }

    /// Reconciles every registered domain with all-settled semantics and
    /// reports the aggregate outcome.
    async fn run_domains(&self) -> Vec<DomainSyncResult> {
        let domains = self.engine.domains();
        info!(domains = domains.len(), "sync run started");

        let mut results: Vec<DomainSyncResult> = Vec::new();
        let mut errors: Vec<(Domain, SyncError)> = Vec::new();

        for domain in domains {
            match self.engine.reconcile(domain).await {
                Ok(result) => {
                    debug!(
                        %domain,
                        uploaded = result.uploaded_ids.len(),
                        downloaded = result.downloaded_ids.len(),
                        failures = result.failures.len(),
                        "domain reconciled"
                    );
                    results.push(result);
                }
                Err(e) => {
                    warn!(%domain, error = %e, "domain sync failed");
                    errors.push((domain, e));
                }
            }
        }

        let pause_reason = FailureGovernor::pause_reason(&errors);
        if let Some(reason) = &pause_reason {
            self.pause(reason.clone());
        }

        let event = self.finish_run(&results, &errors, pause_reason);
        // No receivers is fine; events are best-effort.
        let _ = self.events.send(event);

        results
    }

    /// Updates `last_sync_at` and chooses the event to emit.
    fn finish_run(
        &self,
        results: &[DomainSyncResult],
        errors: &[(Domain, SyncError)],
        pause_reason: Option<String>,
    ) -> SyncEvent {
        // Any successfully-reconciled domain counts as a successful exchange,
        // even if other domains failed or single records did.
        let any_success = !results.is_empty();

        let completed_at = if any_success {
            let now = self.clock.now_epoch_ms();
            match self.state.set_last_sync_at(now) {
                Ok(()) => Some(now),
                Err(e) => {
                    error!(error = %e, "failed to persist last sync time");
                    return SyncEvent::Error {
                        message: e.to_string(),
                    };
                }
            }
        } else {
            None
        };

        if let Some(reason) = pause_reason {
            return SyncEvent::Error { message: reason };
        }

        match completed_at {
            Some(last_sync_at) => {
                info!(last_sync_at, "sync run completed");
                SyncEvent::Completed { last_sync_at }
            }
            None => {
                let message = errors
                    .first()
                    .map(|(_, e)| e.to_string())
                    .unwrap_or_else(|| "no domains registered".to_owned());
                warn!(%message, "sync run failed");
                SyncEvent::Error { message }
            }
        }
    }
}

impl std::fmt::Debug for SyncScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncScheduler")
            .field("state", &self.state())
            .field("paused_reason", &self.paused_reason())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{
        LocalStore, ManualClock, MemoryLocalStore, MemoryRemoteClient, RemoteClient,
    };
    use crate::SyncResult;
    use async_trait::async_trait;
    use serde_json::json;
    use studysync_state::MemoryBackend;
    use studysync_types::{SyncConfigUpdate, SyncableRecord};
    use tokio::sync::broadcast::error::TryRecvError;
    use tokio::sync::Notify;

    const INTERVAL_MS: u64 = 30_000;

    fn record(id: &str, domain: Domain) -> SyncableRecord {
        SyncableRecord::new(id, domain, json!({"body": id}))
    }

    struct Fixture {
        scheduler: SyncScheduler,
        state: Arc<SyncStateStore>,
        local: Arc<MemoryLocalStore>,
        remote: Arc<MemoryRemoteClient>,
        online_tx: watch::Sender<bool>,
        clock: Arc<ManualClock>,
    }

    fn fixture(online: bool) -> Fixture {
        let state = Arc::new(SyncStateStore::open(MemoryBackend::new()).unwrap());
        let local = Arc::new(MemoryLocalStore::new());
        let remote = Arc::new(MemoryRemoteClient::new());
        let clock = Arc::new(ManualClock::starting_at(1_724_500_000_000));

        let mut engine = ReconciliationEngine::new();
        engine.register(
            Domain::Exam,
            Arc::clone(&local) as Arc<dyn LocalStore>,
            Arc::clone(&remote) as Arc<dyn RemoteClient>,
        );

        let (online_tx, online_rx) = watch::channel(online);
        let scheduler = SyncScheduler::with_clock(
            engine,
            Arc::clone(&state),
            online_rx,
            Arc::clone(&clock) as Arc<dyn Clock>,
        );

        Fixture {
            scheduler,
            state,
            local,
            remote,
            online_tx,
            clock,
        }
    }

    /// Remote that blocks its first `get_all` until released, to hold a
    /// run open while other triggers fire.
    struct GatedRemote {
        inner: MemoryRemoteClient,
        entered: Notify,
        release: Notify,
        released: AtomicBool,
    }

    impl GatedRemote {
        fn new() -> Self {
            Self {
                inner: MemoryRemoteClient::new(),
                entered: Notify::new(),
                release: Notify::new(),
                released: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl RemoteClient for GatedRemote {
        async fn get_all(&self, limit: u32, offset: u32) -> SyncResult<Vec<SyncableRecord>> {
            if !self.released.load(Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
                self.released.store(true, Ordering::SeqCst);
            }
            self.inner.get_all(limit, offset).await
        }

        async fn create(&self, record: &SyncableRecord) -> SyncResult<()> {
            self.inner.create(record).await
        }
    }

    #[tokio::test]
    async fn manual_sync_converges_and_emits_completed() {
        let fx = fixture(true);
        fx.local.seed(vec![record("A", Domain::Exam), record("B", Domain::Exam)]);
        fx.remote.seed(vec![record("B", Domain::Exam), record("C", Domain::Exam)]);
        let mut events = fx.scheduler.subscribe();

        let results = fx.scheduler.sync_now().await.expect("guards should pass");

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].uploaded_ids, vec!["A"]);
        assert_eq!(results[0].downloaded_ids, vec!["C"]);
        assert_eq!(fx.local.ids(), vec!["A", "B", "C"]);
        assert_eq!(fx.remote.ids(), vec!["A", "B", "C"]);

        let now = fx.clock.now_epoch_ms();
        assert_eq!(fx.state.last_sync_at(), Some(now));
        assert_eq!(
            events.try_recv().unwrap(),
            SyncEvent::Completed { last_sync_at: now }
        );
        assert_eq!(fx.scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn disabled_sync_is_a_silent_noop() {
        let fx = fixture(true);
        fx.state
            .save_config(SyncConfigUpdate::default().enabled(false))
            .unwrap();
        let mut events = fx.scheduler.subscribe();

        assert!(fx.scheduler.sync_now().await.is_none());
        assert_eq!(fx.remote.call_count(), 0);
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn offline_run_is_a_silent_noop() {
        let fx = fixture(false);
        fx.local.seed(vec![record("A", Domain::Exam)]);

        assert!(fx.scheduler.sync_now().await.is_none());
        assert_eq!(fx.remote.call_count(), 0);
        assert!(fx.state.last_sync_at().is_none());
    }

    #[tokio::test]
    async fn concurrent_triggers_collapse_into_one_run() {
        let state = Arc::new(SyncStateStore::open(MemoryBackend::new()).unwrap());
        let local = Arc::new(MemoryLocalStore::new());
        local.seed(vec![record("A", Domain::Exam)]);
        let remote = Arc::new(GatedRemote::new());

        let mut engine = ReconciliationEngine::new();
        engine.register(
            Domain::Exam,
            Arc::clone(&local) as Arc<dyn LocalStore>,
            Arc::clone(&remote) as Arc<dyn RemoteClient>,
        );
        let (_online_tx, online_rx) = watch::channel(true);
        let scheduler = SyncScheduler::new(engine, state, online_rx);

        let background = scheduler.clone();
        let first_run = tokio::spawn(async move { background.sync_now().await });

        // Wait until the first run is inside its remote fetch.
        remote.entered.notified().await;
        assert_eq!(scheduler.state(), SchedulerState::Running);

        // Every other trigger source must be a no-op while Running.
        assert!(scheduler.sync_now().await.is_none());
        assert!(scheduler.run_all().await.is_none());

        remote.release.notify_one();
        let results = first_run.await.unwrap().expect("first run should proceed");
        assert_eq!(results[0].uploaded_ids, vec!["A"]);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_drives_periodic_runs() {
        let fx = fixture(true);
        fx.local.seed(vec![record("A", Domain::Exam)]);

        fx.scheduler.start();
        tokio::time::sleep(Duration::from_millis(INTERVAL_MS + 50)).await;

        assert!(fx.remote.contains("A"));

        fx.scheduler.stop();
        let calls = fx.remote.call_count();
        tokio::time::sleep(Duration::from_millis(3 * INTERVAL_MS)).await;
        assert_eq!(fx.remote.call_count(), calls, "stop must cancel the timer");
    }

    #[tokio::test(start_paused = true)]
    async fn offline_interval_makes_no_remote_calls() {
        let fx = fixture(false);
        fx.local.seed(vec![record("A", Domain::Exam)]);
        let mut events = fx.scheduler.subscribe();

        fx.scheduler.start();
        tokio::time::sleep(Duration::from_millis(3 * INTERVAL_MS + 50)).await;

        assert_eq!(fx.remote.call_count(), 0);
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_triggers_immediate_run() {
        let fx = fixture(false);
        fx.local.seed(vec![record("A", Domain::Exam)]);

        fx.scheduler.start();
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(fx.remote.call_count(), 0);

        fx.online_tx.send(true).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(fx.remote.contains("A"));
    }

    #[tokio::test(start_paused = true)]
    async fn auth_failure_pauses_until_resume() {
        let fx = fixture(true);
        fx.local.seed(vec![record("A", Domain::Exam)]);
        fx.remote.fail_get_all(Some(401), "token expired");
        let mut events = fx.scheduler.subscribe();

        fx.scheduler.start();
        let results = fx.scheduler.sync_now().await.expect("run should start");
        assert!(results.is_empty());
        assert_eq!(fx.scheduler.state(), SchedulerState::Paused);
        assert!(fx
            .scheduler
            .paused_reason()
            .unwrap()
            .contains("authentication failed"));
        match events.try_recv().unwrap() {
            SyncEvent::Error { message } => assert!(message.contains("token expired")),
            other => panic!("expected error event, got {other:?}"),
        }

        // Ticks while paused must have no side effects.
        let calls = fx.remote.call_count();
        tokio::time::sleep(Duration::from_millis(3 * INTERVAL_MS)).await;
        assert_eq!(fx.remote.call_count(), calls);

        // Resume rearms the timer after the external auth layer recovers.
        fx.remote.clear_get_all_failure();
        fx.scheduler.resume();
        assert_eq!(fx.scheduler.state(), SchedulerState::Idle);
        tokio::time::sleep(Duration::from_millis(INTERVAL_MS + 50)).await;
        assert!(fx.remote.contains("A"));
    }

    #[tokio::test]
    async fn manual_sync_works_while_paused() {
        let fx = fixture(true);
        fx.local.seed(vec![record("A", Domain::Exam)]);
        fx.scheduler.pause("credentials invalid");

        assert!(fx.scheduler.run_all().await.is_none());

        let results = fx.scheduler.sync_now().await;
        assert!(results.is_some(), "manual retry must bypass pause");
        assert!(fx.remote.contains("A"));
        assert_eq!(fx.scheduler.state(), SchedulerState::Paused);
    }

    #[tokio::test]
    async fn failing_domain_does_not_block_others() {
        let state = Arc::new(SyncStateStore::open(MemoryBackend::new()).unwrap());
        let clock = Arc::new(ManualClock::starting_at(1_000));

        let exam_local = Arc::new(MemoryLocalStore::new());
        let exam_remote = Arc::new(MemoryRemoteClient::new());
        exam_remote.fail_get_all(Some(503), "service unavailable");

        let deck_local = Arc::new(MemoryLocalStore::new());
        deck_local.seed(vec![record("deck-1", Domain::FlashcardDeck)]);
        let deck_remote = Arc::new(MemoryRemoteClient::new());

        let mut engine = ReconciliationEngine::new();
        engine.register(
            Domain::Exam,
            Arc::clone(&exam_local) as Arc<dyn LocalStore>,
            Arc::clone(&exam_remote) as Arc<dyn RemoteClient>,
        );
        engine.register(
            Domain::FlashcardDeck,
            Arc::clone(&deck_local) as Arc<dyn LocalStore>,
            Arc::clone(&deck_remote) as Arc<dyn RemoteClient>,
        );

        let (_online_tx, online_rx) = watch::channel(true);
        let scheduler =
            SyncScheduler::with_clock(engine, Arc::clone(&state), online_rx, clock.clone());
        let mut events = scheduler.subscribe();

        let results = scheduler.sync_now().await.unwrap();

        // The deck domain ran to completion despite the exam fetch failure.
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].domain, Domain::FlashcardDeck);
        assert!(deck_remote.contains("deck-1"));
        assert_eq!(state.last_sync_at(), Some(clock.now_epoch_ms()));
        assert!(matches!(
            events.try_recv().unwrap(),
            SyncEvent::Completed { .. }
        ));
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn all_domains_failing_emits_error() {
        let fx = fixture(true);
        fx.remote.fail_get_all(Some(500), "internal error");
        let mut events = fx.scheduler.subscribe();

        let results = fx.scheduler.sync_now().await.unwrap();
        assert!(results.is_empty());
        assert!(fx.state.last_sync_at().is_none());
        assert!(matches!(
            events.try_recv().unwrap(),
            SyncEvent::Error { .. }
        ));
        // A plain server error never pauses the scheduler.
        assert_eq!(fx.scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn start_respects_auto_sync_setting() {
        let fx = fixture(true);
        fx.local.seed(vec![record("A", Domain::Exam)]);
        fx.state
            .save_config(SyncConfigUpdate::default().auto_sync(false))
            .unwrap();

        fx.scheduler.start();
        tokio::time::sleep(Duration::from_millis(3 * INTERVAL_MS)).await;

        assert_eq!(fx.remote.call_count(), 0);
        // Manual sync is unaffected by auto_sync.
        assert!(fx.scheduler.sync_now().await.is_some());
    }

    #[test]
    fn scheduler_state_helpers() {
        assert!(SchedulerState::Running.is_running());
        assert!(!SchedulerState::Idle.is_running());
        assert!(SchedulerState::Paused.is_paused());
        assert!(!SchedulerState::Running.is_paused());
    }
}
