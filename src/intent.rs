//! Navigation intents: the unit of work held by the navigation queue.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;

/// Opaque navigation payload. May embed a fully resolved entity.
pub type Params = serde_json::Value;

/// Intent ID, unique for the lifetime of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IntentId(u64);

impl IntentId {
    /// Generate the next intent ID
    pub fn next() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        IntentId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntentKind {
    /// Push `target` on top of the current stack.
    Navigate,
    /// Replace the whole stack with `target`.
    Reset,
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntentKind::Navigate => write!(f, "navigate"),
            IntentKind::Reset => write!(f, "reset"),
        }
    }
}

/// A queued request to move the display surface to `target`.
///
/// Immutable once enqueued: the queue executes the same value it accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationIntent {
    id: IntentId,
    kind: IntentKind,
    target: String,
    params: Params,
    enqueued_at: Instant,
}

impl NavigationIntent {
    pub fn new(kind: IntentKind, target: impl Into<String>, params: Params, now: Instant) -> Self {
        Self {
            id: IntentId::next(),
            kind,
            target: target.into(),
            params,
            enqueued_at: now,
        }
    }

    pub fn id(&self) -> IntentId {
        self.id
    }

    pub fn kind(&self) -> IntentKind {
        self.kind
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn enqueued_at(&self) -> Instant {
        self.enqueued_at
    }
}
