//! Detection Engine
//!
//! Owns the watcher set and drives detection cycles from a candidate source.
//!
//! Lifecycle per user: `start_detection` arms, the first candidate that passes
//! the user's filter claims the user (`Matched`), exactly one purchase attempt
//! is dispatched, then the user is retired whatever the outcome.
//!
//! The driver task exists only while at least one user is present. It is built
//! lazily on the first arm and torn down as soon as the set drains. Cycles never
//! overlap: a batch arriving while a cycle is still running is skipped.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::{
    FilterEvaluator, ProcessedRecord, TokenCandidate, UserCriteria, UserId, WatchState,
    WatcherSet, DEFAULT_PROCESSED_CAPACITY, DEFAULT_TOP_HOLDERS,
};
use crate::ports::{
    CandidateSourceFactory, NotifierPort, PurchasePort, SettingsPort, TokenDataSource,
};

/// Engine tuning
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Mints remembered as already evaluated
    pub processed_capacity: usize,
    /// Holder accounts summed for the concentration filter
    pub top_n: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            processed_capacity: DEFAULT_PROCESSED_CAPACITY,
            top_n: DEFAULT_TOP_HOLDERS,
        }
    }
}

/// Collaborators the engine calls out to
#[derive(Clone)]
pub struct DetectionPorts {
    pub data: Arc<dyn TokenDataSource>,
    pub settings: Arc<dyn SettingsPort>,
    pub purchaser: Arc<dyn PurchasePort>,
    pub notifier: Arc<dyn NotifierPort>,
}

/// Result of a start/stop request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionTransition {
    /// User is now armed
    Armed,
    /// User was already present; nothing changed
    AlreadyArmed,
    /// User removed from the set
    Retired,
    /// User was not present; nothing changed
    NotArmed,
}

/// Counters since construction or the last `reset`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectionStats {
    pub cycles_run: u64,
    /// Batches dropped because a cycle was still processing
    pub cycles_skipped: u64,
    /// New (not previously processed) candidates evaluated
    pub candidates_seen: u64,
    pub matches: u64,
    pub purchases_ok: u64,
    pub purchases_failed: u64,
}

/// Outcome of one cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    /// Another cycle was running; the batch was not looked at
    pub skipped: bool,
    /// New candidates after dedup
    pub candidates: usize,
    /// (user, mint) pairs matched in this cycle, in match order
    pub matched: Vec<(UserId, String)>,
}

#[derive(Default)]
struct Counters {
    cycles_run: AtomicU64,
    cycles_skipped: AtomicU64,
    candidates_seen: AtomicU64,
    matches: AtomicU64,
    purchases_ok: AtomicU64,
    purchases_failed: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> DetectionStats {
        DetectionStats {
            cycles_run: self.cycles_run.load(Ordering::Relaxed),
            cycles_skipped: self.cycles_skipped.load(Ordering::Relaxed),
            candidates_seen: self.candidates_seen.load(Ordering::Relaxed),
            matches: self.matches.load(Ordering::Relaxed),
            purchases_ok: self.purchases_ok.load(Ordering::Relaxed),
            purchases_failed: self.purchases_failed.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        for counter in [
            &self.cycles_run,
            &self.cycles_skipped,
            &self.candidates_seen,
            &self.matches,
            &self.purchases_ok,
            &self.purchases_failed,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// "A cycle is processing" flag, released on drop
struct CycleGuard(Arc<AtomicBool>);

impl CycleGuard {
    fn try_acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CycleGuard(Arc::clone(flag)))
    }
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct EngineState {
    watchers: WatcherSet,
    processed: ProcessedRecord,
    driver: Option<JoinHandle<()>>,
}

struct EngineInner {
    sources: Arc<dyn CandidateSourceFactory>,
    ports: DetectionPorts,
    evaluator: FilterEvaluator,
    state: Mutex<EngineState>,
    processing: Arc<AtomicBool>,
    counters: Counters,
}

/// Detection context: watcher set, processed record, driver and stats
pub struct DetectionEngine {
    inner: Arc<EngineInner>,
}

impl DetectionEngine {
    pub fn new(
        sources: Arc<dyn CandidateSourceFactory>,
        ports: DetectionPorts,
        config: DetectionConfig,
    ) -> Self {
        let inner = EngineInner {
            sources,
            ports,
            evaluator: FilterEvaluator::new(config.top_n),
            state: Mutex::new(EngineState {
                watchers: WatcherSet::new(),
                processed: ProcessedRecord::new(config.processed_capacity),
                driver: None,
            }),
            processing: Arc::new(AtomicBool::new(false)),
            counters: Counters::default(),
        };
        Self { inner: Arc::new(inner) }
    }

    /// Arm a user. Must be called from within a Tokio runtime.
    pub fn start_detection(&self, user: UserId) -> DetectionTransition {
        let mut state = self.inner.lock_state();
        if !state.watchers.arm(user) {
            warn!(user, "Detection already active for user");
            // The source may have ended under a still-armed user
            EngineInner::ensure_driver(&self.inner, &mut state);
            return DetectionTransition::AlreadyArmed;
        }

        info!(user, watchers = state.watchers.len(), "Detection armed");
        EngineInner::ensure_driver(&self.inner, &mut state);
        DetectionTransition::Armed
    }

    /// Remove a user without a match
    pub fn stop_detection(&self, user: UserId) -> DetectionTransition {
        let removed = self.inner.lock_state().watchers.disarm(user);
        if !removed {
            warn!(user, "Detection not active for user");
            return DetectionTransition::NotArmed;
        }

        info!(user, "Detection stopped");
        self.inner.teardown_if_idle();
        DetectionTransition::Retired
    }

    /// Run one cycle over `batch` outside the driver.
    ///
    /// Shares the driver's processing guard, so it reports `skipped` if a cycle
    /// is already running.
    pub async fn process_batch(&self, batch: Vec<TokenCandidate>) -> CycleReport {
        match CycleGuard::try_acquire(&self.inner.processing) {
            Some(_guard) => self.inner.run_cycle(batch).await,
            None => {
                self.inner.counters.cycles_skipped.fetch_add(1, Ordering::Relaxed);
                debug!("Cycle already processing, batch skipped");
                CycleReport { skipped: true, ..CycleReport::default() }
            }
        }
    }

    /// Tear down the driver and forget all watchers, processed mints and stats
    pub fn reset(&self) {
        let mut state = self.inner.lock_state();
        if let Some(driver) = state.driver.take() {
            driver.abort();
        }
        state.watchers.clear();
        state.processed.clear();
        self.inner.counters.reset();
        info!("Detection engine reset");
    }

    pub fn stats(&self) -> DetectionStats {
        self.inner.counters.snapshot()
    }

    pub fn watch_state(&self, user: UserId) -> Option<WatchState> {
        self.inner.lock_state().watchers.state(user)
    }

    /// Users still waiting for a match, in arming order
    pub fn armed_users(&self) -> Vec<UserId> {
        self.inner.lock_state().watchers.snapshot()
    }

    /// Whether a driver task is currently pulling from a source
    pub fn is_driving(&self) -> bool {
        self.inner
            .lock_state()
            .driver
            .as_ref()
            .map(|driver| !driver.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for DetectionEngine {
    fn drop(&mut self) {
        if let Some(driver) = self.inner.lock_state().driver.take() {
            driver.abort();
        }
    }
}

impl EngineInner {
    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_driver(inner: &Arc<EngineInner>, state: &mut EngineState) {
        let running = state
            .driver
            .as_ref()
            .map(|driver| !driver.is_finished())
            .unwrap_or(false);
        if running {
            return;
        }

        debug!("Starting detection driver");
        state.driver = Some(tokio::spawn(Self::drive(Arc::clone(inner))));
    }

    fn teardown_if_idle(&self) {
        let mut state = self.lock_state();
        if !state.watchers.is_empty() {
            return;
        }
        if let Some(driver) = state.driver.take() {
            driver.abort();
            info!("No watchers left, candidate source torn down");
        }
    }

    async fn drive(inner: Arc<EngineInner>) {
        let mut source = inner.sources.create();
        info!(source = source.name(), "Candidate source established");

        while let Some(batch) = source.next_batch().await {
            if batch.is_empty() {
                continue;
            }

            match CycleGuard::try_acquire(&inner.processing) {
                Some(guard) => {
                    let cycle_inner = Arc::clone(&inner);
                    tokio::spawn(async move {
                        let _guard = guard;
                        cycle_inner.run_cycle(batch).await;
                    });
                }
                None => {
                    inner.counters.cycles_skipped.fetch_add(1, Ordering::Relaxed);
                    debug!(dropped = batch.len(), "Cycle still processing, batch skipped");
                }
            }
        }

        warn!(source = source.name(), "Candidate source ended");
    }

    async fn run_cycle(&self, batch: Vec<TokenCandidate>) -> CycleReport {
        self.counters.cycles_run.fetch_add(1, Ordering::Relaxed);
        let mut report = CycleReport::default();

        let (users, fresh) = {
            let mut state = self.lock_state();
            let users = state.watchers.snapshot();
            if users.is_empty() {
                return report;
            }
            let fresh: Vec<TokenCandidate> = batch
                .into_iter()
                .filter(|candidate| state.processed.insert(&candidate.mint))
                .collect();
            (users, fresh)
        };

        report.candidates = fresh.len();
        if fresh.is_empty() {
            return report;
        }
        self.counters
            .candidates_seen
            .fetch_add(fresh.len() as u64, Ordering::Relaxed);
        debug!(users = users.len(), candidates = fresh.len(), "Running detection cycle");

        let mut active = self.load_criteria(&users).await;

        for candidate in &fresh {
            {
                let state = self.lock_state();
                active.retain(|(user, _)| state.watchers.is_armed(*user));
            }
            if active.is_empty() {
                break;
            }

            let verdicts = join_all(active.iter().map(|(_, criteria)| {
                self.evaluator
                    .passes(candidate, criteria, self.ports.data.as_ref())
            }))
            .await;

            let winners: Vec<UserId> = active
                .iter()
                .zip(verdicts)
                .filter(|(_, passed)| *passed)
                .map(|((user, _), _)| *user)
                .collect();

            for user in winners {
                if self.trigger(user, candidate).await {
                    report.matched.push((user, candidate.mint.clone()));
                }
            }
            active.retain(|(user, _)| !report.matched.iter().any(|(matched, _)| matched == user));
        }

        self.teardown_if_idle();
        report
    }

    /// Criteria for each user, read once; unreadable users sit this cycle out
    async fn load_criteria(&self, users: &[UserId]) -> Vec<(UserId, UserCriteria)> {
        let results = join_all(
            users
                .iter()
                .map(|user| self.ports.settings.get_user_criteria(*user)),
        )
        .await;

        users
            .iter()
            .zip(results)
            .filter_map(|(user, result)| match result {
                Ok(criteria) => match criteria.validate() {
                    Ok(()) => Some((*user, criteria)),
                    Err(e) => {
                        warn!(user = *user, error = %e, "Invalid criteria, skipping user this cycle");
                        None
                    }
                },
                Err(e) => {
                    warn!(user = *user, error = %e, "Could not read criteria, skipping user this cycle");
                    None
                }
            })
            .collect()
    }

    /// Claim, purchase once, retire. Returns `false` if the claim was lost.
    async fn trigger(&self, user: UserId, candidate: &TokenCandidate) -> bool {
        let claimed = self.lock_state().watchers.claim(user);
        if !claimed {
            debug!(user, mint = %candidate.mint, "User no longer armed, match dropped");
            return false;
        }

        self.counters.matches.fetch_add(1, Ordering::Relaxed);
        info!(user, mint = %candidate.mint, origin = %candidate.origin, "Candidate matched");
        let matched = self.notify(
            user,
            format!("Matched {}. Attempting purchase.", candidate.label()),
            None,
        );

        let outcome = self.ports.purchaser.attempt_purchase(user, candidate).await;
        self.lock_state().watchers.retire(user);

        let message = match outcome {
            Ok(true) => {
                self.counters.purchases_ok.fetch_add(1, Ordering::Relaxed);
                info!(user, mint = %candidate.mint, "Purchase attempted");
                format!("Purchase attempted for {}", candidate.label())
            }
            Ok(false) => {
                self.counters.purchases_failed.fetch_add(1, Ordering::Relaxed);
                warn!(user, mint = %candidate.mint, "Purchase declined");
                format!("Purchase failed for {}", candidate.label())
            }
            Err(e) => {
                self.counters.purchases_failed.fetch_add(1, Ordering::Relaxed);
                error!(user, mint = %candidate.mint, error = %e, "Purchase failed");
                format!("Purchase failed for {}", candidate.label())
            }
        };
        self.notify(user, message, Some(matched));
        true
    }

    /// Deliver on a detached task. `after` orders a user's messages without
    /// holding up the caller.
    fn notify(&self, user: UserId, message: String, after: Option<JoinHandle<()>>) -> JoinHandle<()> {
        let notifier = Arc::clone(&self.ports.notifier);
        tokio::spawn(async move {
            if let Some(previous) = after {
                previous.await.ok();
            }
            if let Err(e) = notifier.notify(user, &message).await {
                warn!(user, error = %e, "Notification failed");
            }
        })
    }
}
