//! Callback registry.
//!
//! Screens that need to hand closures (not data) to another screen register
//! them here under a caller-chosen key on mount and remove them on final
//! unmount. Pure storage: no retry, no dedup.

use crate::intent::Params;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub type Callback = Arc<dyn Fn(Params) + Send + Sync>;

#[derive(Clone, Default)]
pub struct CallbackRegistry {
    callbacks: Arc<RwLock<HashMap<String, Callback>>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` under `key`, replacing any previous one.
    pub fn set<F>(&self, key: impl Into<String>, callback: F)
    where
        F: Fn(Params) + Send + Sync + 'static,
    {
        self.callbacks.write().insert(key.into(), Arc::new(callback));
    }

    pub fn get(&self, key: &str) -> Option<Callback> {
        self.callbacks.read().get(key).cloned()
    }

    /// Returns true if a callback was registered under `key`.
    pub fn remove(&self, key: &str) -> bool {
        self.callbacks.write().remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.read().is_empty()
    }
}
