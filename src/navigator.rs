//! Navigator facade.
//!
//! Owns one navigation queue, the load coordinator feeding it and the
//! callback registry, wired from a single [`NavflowConfig`]. Screens talk to
//! this type instead of assembling the pieces themselves.

use crate::config::NavflowConfig;
use crate::coordinator::{Handoff, LoadCoordinator, LoadTicket};
use crate::error::LoadError;
use crate::fetcher::EntityFetcher;
use crate::intent::{IntentId, Params};
use crate::queue::NavigationQueue;
use crate::registry::CallbackRegistry;
use crate::scheduler::Scheduler;
use crate::surface::DisplaySurface;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct Navigator {
    queue: NavigationQueue,
    coordinator: LoadCoordinator,
    registry: CallbackRegistry,
}

impl Navigator {
    pub fn new(
        surface: Arc<dyn DisplaySurface>,
        fetcher: Arc<dyn EntityFetcher>,
        scheduler: Arc<dyn Scheduler>,
        config: &NavflowConfig,
    ) -> Self {
        let queue = NavigationQueue::new(surface, Arc::clone(&scheduler), config.queue.clone());
        let coordinator =
            LoadCoordinator::new(fetcher, queue.clone(), scheduler, config.loader.clone());
        info!(
            min_interval_ms = config.queue.min_interval_ms,
            max_attempts = config.loader.max_attempts,
            base_delay_ms = config.loader.base_delay_ms,
            "Navigator initialized"
        );
        Self {
            queue,
            coordinator,
            registry: CallbackRegistry::new(),
        }
    }

    pub fn enqueue_navigate(&self, target: impl Into<String>, params: Params) -> IntentId {
        self.queue.enqueue_navigate(target, params)
    }

    pub fn enqueue_reset(&self, target: impl Into<String>, params: Params) -> IntentId {
        self.queue.enqueue_reset(target, params)
    }

    /// Signal that the display surface has mounted.
    pub fn set_ready(&self) {
        self.queue.set_ready();
    }

    pub fn clear_queue(&self) -> usize {
        self.queue.clear()
    }

    pub fn load_and_handoff<F>(&self, entity_id: &str, handoff: Handoff, on_failure: F) -> LoadTicket
    where
        F: FnOnce(LoadError) + Send + 'static,
    {
        self.coordinator.load_and_handoff(entity_id, handoff, on_failure)
    }

    pub async fn load_and_wait(
        &self,
        entity_id: &str,
        handoff: Handoff,
    ) -> Result<IntentId, LoadError> {
        self.coordinator.load_and_wait(entity_id, handoff).await
    }

    pub fn queue(&self) -> &NavigationQueue {
        &self.queue
    }

    pub fn coordinator(&self) -> &LoadCoordinator {
        &self.coordinator
    }

    pub fn registry(&self) -> &CallbackRegistry {
        &self.registry
    }
}
