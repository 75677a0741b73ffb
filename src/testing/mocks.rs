//! Mock implementations for testing
//!
//! Provides mock StreamBus, StateStore and LlmProvider implementations to
//! enable comprehensive testing without a broker, a state store or a model
//! endpoint.

use crate::llm::provider::{LlmError, LlmProvider};
use crate::state::GraphState;
use crate::store::{StateStore, StoreError};
use crate::stream::{StreamBus, StreamEntry, StreamError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Mock stream bus recording every interaction
#[derive(Debug, Default)]
pub struct MockStreamBus {
    /// Entries served to `read_group`, in order
    pub queued: Mutex<VecDeque<StreamEntry>>,
    /// (stream, fields) pairs seen by `append`
    pub appended: Mutex<Vec<(String, Vec<(String, String)>)>>,
    /// (stream, group, entry_id) triples seen by `ack`
    pub acked: Mutex<Vec<(String, String, String)>>,
    /// (stream, group) pairs seen by `ensure_group`
    pub ensured_groups: Mutex<Vec<(String, String)>>,
    pub should_fail: bool,
    next_id: AtomicU64,
}

impl MockStreamBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    /// Queue an entry whose `data` field carries the given payload
    pub async fn queue_data(&self, data: &str) -> String {
        let id = format!("{}-0", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.queued.lock().await.push_back(StreamEntry {
            id: id.clone(),
            fields: vec![("data".to_string(), data.to_string())],
        });
        id
    }

    /// Payloads appended to one stream, `data` field only
    pub async fn appended_data(&self, stream: &str) -> Vec<String> {
        self.appended
            .lock()
            .await
            .iter()
            .filter(|(s, _)| s == stream)
            .filter_map(|(_, fields)| {
                fields
                    .iter()
                    .find(|(name, _)| name == "data")
                    .map(|(_, value)| value.clone())
            })
            .collect()
    }

    pub async fn ack_count(&self) -> usize {
        self.acked.lock().await.len()
    }
}

#[async_trait]
impl StreamBus for MockStreamBus {
    async fn ensure_group(
        &self,
        stream: &str,
        group: &str,
        _start_id: &str,
    ) -> Result<(), StreamError> {
        if self.should_fail {
            return Err(StreamError::Group("mock group failure".to_string()));
        }
        self.ensured_groups
            .lock()
            .await
            .push((stream.to_string(), group.to_string()));
        Ok(())
    }

    async fn read_group(
        &self,
        _stream: &str,
        _group: &str,
        _consumer: &str,
        block: Duration,
        count: usize,
    ) -> Result<Vec<StreamEntry>, StreamError> {
        if self.should_fail {
            return Err(StreamError::Read("mock read failure".to_string()));
        }

        let mut queued = self.queued.lock().await;
        if queued.is_empty() {
            drop(queued);
            // Emulate the blocking window elapsing with nothing to deliver
            tokio::time::sleep(block).await;
            return Ok(Vec::new());
        }

        let take = count.min(queued.len());
        Ok(queued.drain(..take).collect())
    }

    async fn ack(&self, stream: &str, group: &str, entry_id: &str) -> Result<(), StreamError> {
        if self.should_fail {
            return Err(StreamError::Ack("mock ack failure".to_string()));
        }
        self.acked.lock().await.push((
            stream.to_string(),
            group.to_string(),
            entry_id.to_string(),
        ));
        Ok(())
    }

    async fn append(
        &self,
        stream: &str,
        fields: Vec<(String, String)>,
    ) -> Result<String, StreamError> {
        if self.should_fail {
            return Err(StreamError::Append("mock append failure".to_string()));
        }
        self.appended.lock().await.push((stream.to_string(), fields));
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("{id}-0"))
    }
}

/// Mock state store over an in-memory map
#[derive(Debug, Default)]
pub struct MockStateStore {
    pub states: Mutex<HashMap<String, GraphState>>,
    pub should_fail: bool,
}

impl MockStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    /// Seed a state snapshot before a test run
    pub async fn put(&self, execution_id: &str, state: GraphState) {
        self.states
            .lock()
            .await
            .insert(execution_id.to_string(), state);
    }
}

#[async_trait]
impl StateStore for MockStateStore {
    async fn save(&self, execution_id: &str, state: &GraphState) -> Result<(), StoreError> {
        if self.should_fail {
            return Err(StoreError::Backend("mock store failure".to_string()));
        }
        self.states
            .lock()
            .await
            .insert(execution_id.to_string(), state.clone());
        Ok(())
    }

    async fn load(&self, execution_id: &str) -> Result<GraphState, StoreError> {
        if self.should_fail {
            return Err(StoreError::Backend("mock store failure".to_string()));
        }
        self.states
            .lock()
            .await
            .get(execution_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(execution_id.to_string()))
    }

    async fn delete(&self, execution_id: &str) -> Result<(), StoreError> {
        self.states.lock().await.remove(execution_id);
        Ok(())
    }

    async fn exists(&self, execution_id: &str) -> Result<bool, StoreError> {
        Ok(self.states.lock().await.contains_key(execution_id))
    }

    async fn set_ttl(&self, _execution_id: &str, _ttl: Duration) -> Result<(), StoreError> {
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.states.lock().await.keys().cloned().collect())
    }
}

/// Mock LLM provider cycling through canned responses
#[derive(Debug)]
pub struct MockLlmProvider {
    pub responses: Vec<String>,
    pub current_response: Arc<Mutex<usize>>,
    pub should_fail: bool,
}

impl MockLlmProvider {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            current_response: Arc::new(Mutex::new(0)),
            should_fail: false,
        }
    }

    pub fn with_failure() -> Self {
        Self {
            responses: vec![],
            current_response: Arc::new(Mutex::new(0)),
            should_fail: true,
        }
    }

    pub fn single_response(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String, LlmError> {
        if self.should_fail {
            return Err(LlmError::RequestFailed("mock llm failure".to_string()));
        }

        let mut current = self.current_response.lock().await;
        let index = *current % self.responses.len().max(1);
        *current += 1;

        Ok(self
            .responses
            .get(index)
            .cloned()
            .unwrap_or_else(|| "mock response".to_string()))
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        if self.should_fail {
            Err(LlmError::RequestFailed(
                "mock health check failure".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}
