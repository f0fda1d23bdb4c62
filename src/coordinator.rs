//! Single-Flight Load-and-Handoff Coordinator
//!
//! Given an entity id, fetches the entity with bounded linear-backoff retry and
//! hands the resolved document to the navigation queue, so the destination
//! screen renders from its params without a second fetch.
//!
//! At most one fetch chain runs per entity id. A caller asking for an id that
//! is already loading does not start a second fetch; it is attached as a waiter
//! on the existing load and learns about a terminal failure through its own
//! callback. Per id the lifecycle is `Untracked -> Loading -> (Succeeded |
//! Failed) -> Untracked`.

use crate::error::{FetchError, LoadError};
use crate::fetcher::{Entity, EntityFetcher, EntityId};
use crate::intent::{IntentId, IntentKind, Params};
use crate::queue::NavigationQueue;
use crate::scheduler::Scheduler;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// Called once with the terminal error when a load cannot be completed.
pub type FailureCallback = Box<dyn FnOnce(LoadError) + Send + 'static>;

/// Configuration for entity loading
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Total fetch attempts per load, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff unit; attempt `n` is followed by a wait of `n * base_delay_ms`
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl LoaderConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Delay before the attempt following `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay() * attempt
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }
        if self.base_delay_ms == 0 {
            return Err("base_delay_ms must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Where the resolved entity lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handoff {
    /// Navigate straight to `target`.
    Navigate { target: String },
    /// Reset to `landing` first, then navigate to `target` (deep links).
    ResetThenNavigate { landing: String, target: String },
}

impl Handoff {
    pub fn navigate(target: impl Into<String>) -> Self {
        Handoff::Navigate {
            target: target.into(),
        }
    }

    pub fn deep_link(landing: impl Into<String>, target: impl Into<String>) -> Self {
        Handoff::ResetThenNavigate {
            landing: landing.into(),
            target: target.into(),
        }
    }

    fn intents(&self, entity: &Entity) -> Vec<(IntentKind, String, Params)> {
        match self {
            Handoff::Navigate { target } => {
                vec![(IntentKind::Navigate, target.clone(), handoff_params(entity))]
            }
            Handoff::ResetThenNavigate { landing, target } => vec![
                (IntentKind::Reset, landing.clone(), json!({})),
                (IntentKind::Navigate, target.clone(), handoff_params(entity)),
            ],
        }
    }
}

/// Navigation params carrying a resolved entity.
pub fn handoff_params(entity: &Entity) -> Params {
    json!({
        "entityId": entity.id,
        "entity": entity.document,
    })
}

/// Per-id load lifecycle. Only `Loading` ids are tracked; the terminal states
/// appear in logs as the entry is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Succeeded,
    Failed,
}

/// Loader statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoaderStats {
    /// Entity ids currently loading
    pub in_flight: usize,
    /// Calls made to the fetcher
    pub fetch_attempts: usize,
    /// Loads that resolved an entity
    pub succeeded: usize,
    /// Loads that ended in a terminal failure
    pub failed: usize,
    /// Requests attached to a load already in flight
    pub attached: usize,
    /// Successful loads whose callers had all withdrawn
    pub discarded: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct WaiterId(u64);

impl WaiterId {
    fn next() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        WaiterId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

struct Waiter {
    id: WaiterId,
    on_failure: Option<FailureCallback>,
    completion: Option<oneshot::Sender<Result<IntentId, LoadError>>>,
}

impl Waiter {
    /// A waiter whose only interest was a dropped `load_and_wait` future.
    fn is_abandoned(&self) -> bool {
        self.on_failure.is_none()
            && self
                .completion
                .as_ref()
                .map_or(true, |tx| tx.is_closed())
    }

    fn fail(self, err: &LoadError) {
        if let Some(callback) = self.on_failure {
            callback(err.clone());
        }
        if let Some(tx) = self.completion {
            let _ = tx.send(Err(err.clone()));
        }
    }
}

/// Tracking entry for an id in `Loading`. Dropped on reaching a terminal state.
struct InFlightLoad {
    attempt: u32,
    waiters: Vec<Waiter>,
}

struct CoordinatorInner {
    loads: Mutex<HashMap<EntityId, InFlightLoad>>,
    stats: Mutex<LoaderStats>,
    fetcher: Arc<dyn EntityFetcher>,
    queue: NavigationQueue,
    scheduler: Arc<dyn Scheduler>,
    config: LoaderConfig,
}

/// Returned by [`LoadCoordinator::load_and_handoff`].
///
/// Cancelling withdraws this caller's interest only; the fetch chain for the
/// entity keeps running for any other caller.
pub struct LoadTicket {
    entity_id: EntityId,
    waiter: Option<WaiterId>,
    started: bool,
    inner: Weak<CoordinatorInner>,
}

impl LoadTicket {
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// True when this request started the fetch, false when it attached to
    /// a load already in flight (or was rejected outright).
    pub fn started_fetch(&self) -> bool {
        self.started
    }

    /// Stop receiving the failure callback. Returns false when the load had
    /// already finished or the request was rejected.
    pub fn cancel(&self) -> bool {
        let (Some(waiter), Some(inner)) = (self.waiter, self.inner.upgrade()) else {
            return false;
        };
        let mut loads = inner.loads.lock();
        let Some(load) = loads.get_mut(&self.entity_id) else {
            return false;
        };
        let before = load.waiters.len();
        load.waiters.retain(|w| w.id != waiter);
        let removed = load.waiters.len() < before;
        if removed {
            debug!(
                entity_id = %self.entity_id,
                remaining_waiters = load.waiters.len(),
                "Load caller withdrew"
            );
        }
        removed
    }
}

/// Single-flight entity loader that hands results to the navigation queue.
#[derive(Clone)]
pub struct LoadCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl LoadCoordinator {
    pub fn new(
        fetcher: Arc<dyn EntityFetcher>,
        queue: NavigationQueue,
        scheduler: Arc<dyn Scheduler>,
        config: LoaderConfig,
    ) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                loads: Mutex::new(HashMap::new()),
                stats: Mutex::new(LoaderStats::default()),
                fetcher,
                queue,
                scheduler,
                config,
            }),
        }
    }

    /// Load `entity_id` and enqueue the handoff navigation on success.
    ///
    /// `on_failure` runs at most once, with the terminal error, if the load
    /// cannot complete. An invalid id fails synchronously without a fetch.
    /// When the id is already loading, the first request's `handoff` applies.
    pub fn load_and_handoff<F>(&self, entity_id: &str, handoff: Handoff, on_failure: F) -> LoadTicket
    where
        F: FnOnce(LoadError) + Send + 'static,
    {
        if let Err(err) = validate_entity_id(entity_id) {
            warn!(entity_id = %entity_id, error = %err, "Rejected load request");
            on_failure(err);
            return LoadTicket {
                entity_id: entity_id.to_string(),
                waiter: None,
                started: false,
                inner: Arc::downgrade(&self.inner),
            };
        }

        let waiter = Waiter {
            id: WaiterId::next(),
            on_failure: Some(Box::new(on_failure)),
            completion: None,
        };
        let waiter_id = waiter.id;
        let started = self.register(entity_id, handoff, waiter);
        LoadTicket {
            entity_id: entity_id.to_string(),
            waiter: Some(waiter_id),
            started,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Load `entity_id` and wait until its handoff intent is enqueued.
    ///
    /// Shares the single-flight entry with [`Self::load_and_handoff`].
    /// Dropping the future withdraws interest without stopping the fetch.
    pub async fn load_and_wait(
        &self,
        entity_id: &str,
        handoff: Handoff,
    ) -> Result<IntentId, LoadError> {
        validate_entity_id(entity_id)?;

        let (tx, rx) = oneshot::channel();
        let waiter = Waiter {
            id: WaiterId::next(),
            on_failure: None,
            completion: Some(tx),
        };
        self.register(entity_id, handoff, waiter);
        rx.await
            .map_err(|_| LoadError::Abandoned(entity_id.to_string()))?
    }

    pub fn is_loading(&self, entity_id: &str) -> bool {
        self.inner.loads.lock().contains_key(entity_id)
    }

    /// Fetch attempts made so far for a load in flight.
    pub fn attempt(&self, entity_id: &str) -> Option<u32> {
        self.inner.loads.lock().get(entity_id).map(|l| l.attempt)
    }

    /// Get loader statistics
    pub fn stats(&self) -> LoaderStats {
        let mut stats = self.inner.stats.lock().clone();
        stats.in_flight = self.inner.loads.lock().len();
        stats
    }

    pub fn queue(&self) -> &NavigationQueue {
        &self.inner.queue
    }

    /// Attach to an existing load or start a new one. Returns true when a new
    /// fetch chain was started.
    fn register(&self, entity_id: &str, handoff: Handoff, waiter: Waiter) -> bool {
        {
            let mut loads = self.inner.loads.lock();
            if let Some(load) = loads.get_mut(entity_id) {
                load.waiters.push(waiter);
                let waiters = load.waiters.len();
                drop(loads);
                self.inner.stats.lock().attached += 1;
                debug!(
                    entity_id = %entity_id,
                    waiters,
                    "Load already in flight, attached waiter"
                );
                return false;
            }
            loads.insert(
                entity_id.to_string(),
                InFlightLoad {
                    attempt: 0,
                    waiters: vec![waiter],
                },
            );
        }

        debug!(entity_id = %entity_id, "Starting entity load");
        let inner = Arc::clone(&self.inner);
        let entity_id = entity_id.to_string();
        self.inner
            .scheduler
            .spawn(Box::pin(async move { inner.run_load(entity_id, handoff).await }));
        true
    }
}

impl CoordinatorInner {
    /// Fetch chain for one entity. Runs until the load reaches a terminal state.
    async fn run_load(self: Arc<Self>, entity_id: EntityId, handoff: Handoff) {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.record_attempt(&entity_id, attempt);
            debug!(entity_id = %entity_id, attempt, "Fetching entity");

            match self.fetcher.fetch(&entity_id).await {
                Ok(entity) => {
                    self.complete_success(&entity_id, attempt, entity, &handoff);
                    return;
                }
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = self.config.backoff(attempt);
                    warn!(
                        entity_id = %entity_id,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Entity fetch failed, retrying"
                    );
                    self.scheduler.sleep(delay).await;
                }
                Err(err) => {
                    self.complete_failure(&entity_id, terminal_error(&entity_id, attempt, err));
                    return;
                }
            }
        }
    }

    fn record_attempt(&self, entity_id: &str, attempt: u32) {
        if let Some(load) = self.loads.lock().get_mut(entity_id) {
            load.attempt = attempt;
        }
        self.stats.lock().fetch_attempts += 1;
    }

    fn complete_success(&self, entity_id: &str, attempts: u32, entity: Entity, handoff: &Handoff) {
        let Some(load) = self.loads.lock().remove(entity_id) else {
            return;
        };

        let (abandoned, live): (Vec<_>, Vec<_>) =
            load.waiters.into_iter().partition(Waiter::is_abandoned);
        drop(abandoned);

        if live.is_empty() {
            self.stats.lock().discarded += 1;
            info!(
                entity_id = %entity_id,
                attempts,
                state = ?LoadState::Succeeded,
                "Entity loaded but every caller withdrew, skipping handoff"
            );
            return;
        }

        // The loads lock is released before touching the queue: the surface
        // may start another load from inside a navigation.
        let ids = self.queue.enqueue_all(handoff.intents(&entity));
        self.stats.lock().succeeded += 1;
        let Some(&intent_id) = ids.last() else {
            return;
        };
        info!(
            entity_id = %entity_id,
            attempts,
            intent_id = %intent_id,
            waiters = live.len(),
            state = ?LoadState::Succeeded,
            "Entity loaded, handoff enqueued"
        );

        for waiter in live {
            if let Some(tx) = waiter.completion {
                let _ = tx.send(Ok(intent_id));
            }
        }
    }

    fn complete_failure(&self, entity_id: &str, err: LoadError) {
        let Some(load) = self.loads.lock().remove(entity_id) else {
            return;
        };
        self.stats.lock().failed += 1;
        error!(
            entity_id = %entity_id,
            attempts = load.attempt,
            waiters = load.waiters.len(),
            state = ?LoadState::Failed,
            error = %err,
            "Entity load failed"
        );

        for waiter in load.waiters {
            waiter.fail(&err);
        }
    }
}

fn validate_entity_id(entity_id: &str) -> Result<(), LoadError> {
    if entity_id.trim().is_empty() {
        return Err(LoadError::InvalidRequest("entity id is empty".to_string()));
    }
    if entity_id.contains('/') {
        return Err(LoadError::InvalidRequest(format!(
            "entity id '{}' contains a path separator",
            entity_id
        )));
    }
    Ok(())
}

fn terminal_error(entity_id: &str, attempts: u32, err: FetchError) -> LoadError {
    if err.is_transient() {
        LoadError::Exhausted {
            entity_id: entity_id.to_string(),
            attempts,
            last_error: err,
        }
    } else {
        LoadError::Rejected {
            entity_id: entity_id.to_string(),
            error: err,
        }
    }
}
