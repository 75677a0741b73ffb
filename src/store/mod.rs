//! Graph state store abstraction
//!
//! Keyed by execution id. The routing worker itself only loads, but the
//! contract carries the full lifecycle so orchestrator-side tooling and
//! tests can share the same trait.

use crate::state::GraphState;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub mod redis;

pub use self::redis::RedisStateStore;

/// State store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state not found for execution {0}")]
    NotFound(String),
    #[error("state payload invalid: {0}")]
    InvalidPayload(String),
    #[error("state store backend error: {0}")]
    Backend(String),
}

/// Contract over the key-value store holding graph state
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn save(&self, execution_id: &str, state: &GraphState) -> Result<(), StoreError>;

    /// Load the state snapshot for an execution; missing keys are `NotFound`
    async fn load(&self, execution_id: &str) -> Result<GraphState, StoreError>;

    async fn delete(&self, execution_id: &str) -> Result<(), StoreError>;

    async fn exists(&self, execution_id: &str) -> Result<bool, StoreError>;

    async fn set_ttl(&self, execution_id: &str, ttl: Duration) -> Result<(), StoreError>;

    /// All execution ids with stored state
    async fn list(&self) -> Result<Vec<String>, StoreError>;
}
