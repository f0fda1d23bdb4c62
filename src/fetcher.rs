//! Entity fetcher abstraction.
//!
//! The persistent document store, seen through the only operation the
//! coordinator needs: fetch one document by id.

use crate::error::FetchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Key used for single-flight deduplication.
pub type EntityId = String;

/// A fully resolved document, ready to be handed to a screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub document: serde_json::Value,
}

impl Entity {
    pub fn new(id: impl Into<EntityId>, document: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            document,
        }
    }
}

/// Fetches entities by id.
///
/// Implementations must be idempotent and free of side effects on failure;
/// the coordinator calls `fetch` again for the same id on transient errors.
#[async_trait]
pub trait EntityFetcher: Send + Sync {
    async fn fetch(&self, entity_id: &str) -> Result<Entity, FetchError>;
}
