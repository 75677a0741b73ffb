//! Redis implementation of the graph state store
//!
//! States live as JSON strings under `graph:state:<execution_id>`.

use crate::state::GraphState;
use crate::store::{StateStore, StoreError};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

const KEY_PREFIX: &str = "graph:state:";

/// State store over Redis string keys
#[derive(Clone)]
pub struct RedisStateStore {
    conn: ConnectionManager,
}

impl RedisStateStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    fn key(execution_id: &str) -> String {
        format!("{KEY_PREFIX}{execution_id}")
    }
}

#[async_trait]
impl StateStore for RedisStateStore {
    async fn save(&self, execution_id: &str, state: &GraphState) -> Result<(), StoreError> {
        let payload =
            serde_json::to_string(state).map_err(|e| StoreError::InvalidPayload(e.to_string()))?;
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(Self::key(execution_id), payload)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn load(&self, execution_id: &str) -> Result<GraphState, StoreError> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn
            .get(Self::key(execution_id))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let payload = payload.ok_or_else(|| StoreError::NotFound(execution_id.to_string()))?;
        serde_json::from_str(&payload).map_err(|e| StoreError::InvalidPayload(e.to_string()))
    }

    async fn delete(&self, execution_id: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(Self::key(execution_id))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn exists(&self, execution_id: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        conn.exists(Self::key(execution_id))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn set_ttl(&self, execution_id: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.expire::<_, bool>(Self::key(execution_id), ttl.as_secs() as i64)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = conn
            .keys(format!("{KEY_PREFIX}*"))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(keys
            .into_iter()
            .filter_map(|key| key.strip_prefix(KEY_PREFIX).map(str::to_string))
            .collect())
    }
}
