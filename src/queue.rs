//! Navigation Intent Queue
//!
//! Accepts navigation intents from anywhere in the app, including before the
//! display surface exists, and replays them against the surface in strict FIFO
//! order once it is marked ready. Consecutive executions start at least
//! `min_interval` apart. An intent the surface rejects is logged and dropped
//! after its single attempt so one bad target can never wedge the queue.

use crate::error::NavigationError;
use crate::intent::{IntentId, IntentKind, NavigationIntent, Params};
use crate::scheduler::{Scheduler, TimerHandle};
use crate::surface::{self, DisplaySurface};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Configuration for the navigation queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Minimum spacing between the starts of two executions (milliseconds)
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Maximum pending intents; the oldest pending intent is evicted past this
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,
}

fn default_min_interval_ms() -> u64 {
    500
}

fn default_max_pending() -> usize {
    256
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
            max_pending: default_max_pending(),
        }
    }
}

impl QueueConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.min_interval_ms == 0 {
            return Err("min_interval_ms must be greater than zero".to_string());
        }
        if self.max_pending == 0 {
            return Err("max_pending must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Queue statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Intents waiting to run
    pub pending: usize,
    /// 1 while the surface is executing an intent
    pub executing: usize,
    /// Intents the surface accepted
    pub completed: usize,
    /// Intents the surface rejected (dropped)
    pub failed: usize,
    /// Intents pushed out by `max_pending`
    pub evicted: usize,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<NavigationIntent>,
    ready: bool,
    /// Set while an intent runs and for `min_interval` after a success.
    draining: bool,
    executing: Option<IntentId>,
    last_started: Option<Instant>,
    /// Deferred drain attempt waiting out the spacing window.
    deferred: Option<TimerHandle>,
    completed: usize,
    failed: usize,
    evicted: usize,
}

struct QueueInner {
    state: Mutex<QueueState>,
    surface: Arc<dyn DisplaySurface>,
    scheduler: Arc<dyn Scheduler>,
    config: QueueConfig,
}

/// Serialized, throttled navigation queue.
///
/// Cheap to clone; clones share the same pending list.
#[derive(Clone)]
pub struct NavigationQueue {
    inner: Arc<QueueInner>,
}

impl NavigationQueue {
    pub fn new(
        surface: Arc<dyn DisplaySurface>,
        scheduler: Arc<dyn Scheduler>,
        config: QueueConfig,
    ) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState::default()),
                surface,
                scheduler,
                config,
            }),
        }
    }

    /// Append an intent to the tail and attempt a drain. Always succeeds.
    pub fn enqueue(&self, kind: IntentKind, target: impl Into<String>, params: Params) -> IntentId {
        let target = target.into();
        let id = {
            let mut state = self.inner.state.lock();
            let intent = NavigationIntent::new(kind, target, params, self.inner.scheduler.now());
            let id = intent.id();
            self.inner.push(&mut state, intent);
            id
        };
        self.inner.drain();
        id
    }

    pub fn enqueue_navigate(&self, target: impl Into<String>, params: Params) -> IntentId {
        self.enqueue(IntentKind::Navigate, target, params)
    }

    pub fn enqueue_reset(&self, target: impl Into<String>, params: Params) -> IntentId {
        self.enqueue(IntentKind::Reset, target, params)
    }

    /// Enqueue several intents back to back, with nothing interleaved between them.
    pub fn enqueue_all<I, T>(&self, intents: I) -> Vec<IntentId>
    where
        I: IntoIterator<Item = (IntentKind, T, Params)>,
        T: Into<String>,
    {
        let ids = {
            let mut state = self.inner.state.lock();
            let now = self.inner.scheduler.now();
            intents
                .into_iter()
                .map(|(kind, target, params)| {
                    let intent = NavigationIntent::new(kind, target, params, now);
                    let id = intent.id();
                    self.inner.push(&mut state, intent);
                    id
                })
                .collect::<Vec<_>>()
        };
        self.inner.drain();
        ids
    }

    /// Mark the display surface as available. Only the first call has an effect.
    pub fn set_ready(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.ready {
                debug!("Navigation queue already ready");
                return;
            }
            state.ready = true;
            info!(pending = state.pending.len(), "Navigation queue ready");
        }
        self.inner.drain();
    }

    /// Drop every pending intent. An intent already executing is unaffected.
    pub fn clear(&self) -> usize {
        let mut state = self.inner.state.lock();
        let cleared = state.pending.len();
        state.pending.clear();
        if let Some(timer) = state.deferred.take() {
            timer.cancel();
        }
        if cleared > 0 {
            info!(cleared, "Cleared navigation queue");
        }
        cleared
    }

    pub fn is_ready(&self) -> bool {
        self.inner.state.lock().ready
    }

    pub fn pending_len(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    /// Get queue statistics
    pub fn stats(&self) -> QueueStats {
        let state = self.inner.state.lock();
        QueueStats {
            pending: state.pending.len(),
            executing: usize::from(state.executing.is_some()),
            completed: state.completed,
            failed: state.failed,
            evicted: state.evicted,
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }
}

impl QueueInner {
    fn push(&self, state: &mut QueueState, intent: NavigationIntent) {
        if state.pending.len() >= self.config.max_pending {
            if let Some(evicted) = state.pending.pop_front() {
                state.evicted += 1;
                warn!(
                    intent_id = %evicted.id(),
                    target = %evicted.target(),
                    max_pending = self.config.max_pending,
                    "Navigation queue is full, evicted oldest pending intent"
                );
            }
        }
        debug!(
            intent_id = %intent.id(),
            kind = %intent.kind(),
            target = %intent.target(),
            ready = state.ready,
            queue_size = state.pending.len() + 1,
            "Enqueued navigation intent"
        );
        state.pending.push_back(intent);
    }

    /// One drain step. Safe to call speculatively: returns immediately when the
    /// queue is not ready, already draining, or empty.
    fn drain(self: &Arc<Self>) {
        let min_interval = self.config.min_interval();
        let intent = {
            let mut state = self.state.lock();
            if !state.ready || state.draining || state.pending.is_empty() {
                return;
            }

            let now = self.scheduler.now();
            if let Some(last_started) = state.last_started {
                let elapsed = now.saturating_duration_since(last_started);
                if elapsed < min_interval {
                    let wait = min_interval - elapsed;
                    debug!(
                        wait_ms = wait.as_millis() as u64,
                        pending = state.pending.len(),
                        "Deferring drain to preserve navigation spacing"
                    );
                    self.defer_drain(&mut state, wait);
                    return;
                }
            }

            // The head only leaves the list once it is about to run.
            let Some(intent) = state.pending.pop_front() else {
                return;
            };
            state.draining = true;
            state.executing = Some(intent.id());
            state.last_started = Some(now);
            debug!(
                intent_id = %intent.id(),
                queued_ms = now.saturating_duration_since(intent.enqueued_at()).as_millis() as u64,
                "Executing navigation intent"
            );
            intent
        };

        // The state lock is released here: the surface may call back into the queue.
        let result = surface::execute(self.surface.as_ref(), &intent);

        let mut state = self.state.lock();
        state.executing = None;
        match result {
            Ok(()) => {
                state.completed += 1;
                info!(
                    intent_id = %intent.id(),
                    kind = %intent.kind(),
                    target = %intent.target(),
                    "Navigation intent executed"
                );
                // Hold the drain flag for the spacing window; the release drains again.
                let weak = Arc::downgrade(self);
                self.scheduler
                    .schedule(min_interval, Box::new(move || Self::release(&weak)));
            }
            Err(source) => {
                state.failed += 1;
                let err = NavigationError {
                    intent_id: intent.id().as_u64(),
                    target: intent.target().to_string(),
                    source,
                };
                warn!(error = %err, "Dropping navigation intent rejected by display surface");
                state.draining = false;
                if !state.pending.is_empty() {
                    self.defer_drain(&mut state, min_interval);
                }
            }
        }
    }

    fn defer_drain(self: &Arc<Self>, state: &mut QueueState, wait: Duration) {
        if let Some(previous) = state.deferred.take() {
            previous.cancel();
        }
        let weak = Arc::downgrade(self);
        let timer = self.scheduler.schedule(
            wait,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.drain();
                }
            }),
        );
        state.deferred = Some(timer);
    }

    fn release(weak: &Weak<Self>) {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        {
            inner.state.lock().draining = false;
        }
        inner.drain();
    }
}
