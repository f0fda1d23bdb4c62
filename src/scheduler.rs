//! Clock and timer source.
//!
//! Every suspension in the queue and the coordinator goes through a
//! [`Scheduler`], so both can be driven on a paused Tokio clock in tests
//! (`#[tokio::test(start_paused = true)]`) instead of sleeping for real.

use futures::future::BoxFuture;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::Instant;

/// Deferred unit of work run by a [`Scheduler`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Abstraction over how to read the clock and wait for a delay.
pub trait Scheduler: Send + Sync + 'static {
    /// Current instant on this scheduler's clock.
    fn now(&self) -> Instant;

    /// Run `task` once after `delay`. Cancelling the returned handle before the
    /// delay elapses guarantees the task never runs.
    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle;

    /// Future that completes after `delay`.
    fn sleep(&self, delay: Duration) -> BoxFuture<'static, ()>;

    /// Drive `future` to completion in the background.
    fn spawn(&self, future: BoxFuture<'static, ()>);
}

/// Handle to a scheduled task.
///
/// Dropping the handle does not cancel the task.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    abort: AbortHandle,
}

impl TimerHandle {
    pub fn cancel(&self) {
        self.abort.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

/// [`Scheduler`] backed by the Tokio timer.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Scheduler bound to the runtime of the calling task.
    ///
    /// Panics when called outside a Tokio runtime; use [`Self::try_current`]
    /// where that is possible.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Scheduler for TokioScheduler {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle {
        let join = self.handle.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            task();
        });
        TimerHandle {
            abort: join.abort_handle(),
        }
    }

    fn sleep(&self, delay: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(delay))
    }

    fn spawn(&self, future: BoxFuture<'static, ()>) {
        self.handle.spawn(future);
    }
}
