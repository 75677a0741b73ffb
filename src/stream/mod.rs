//! Stream broker abstraction
//!
//! A thin contract over the broker's ordered log: ensure a consumer group,
//! read as a group member, acknowledge, append. The trait exists so the
//! consumer loop and processor can run against a mock in tests.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub mod redis;

pub use self::redis::RedisStreamBus;

/// One delivered stream entry
#[derive(Debug, Clone)]
pub struct StreamEntry {
    /// Broker-assigned entry id, used for acknowledgement
    pub id: String,
    /// Entry fields as key/value pairs; work items carry a single `data` field
    pub fields: Vec<(String, String)>,
}

impl StreamEntry {
    /// Value of the `data` field, if present
    pub fn data(&self) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == "data")
            .map(|(_, value)| value.as_str())
    }
}

/// Stream broker errors
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("broker connection error: {0}")]
    Connection(String),
    #[error("stream read failed: {0}")]
    Read(String),
    #[error("stream append failed: {0}")]
    Append(String),
    #[error("acknowledgement failed: {0}")]
    Ack(String),
    #[error("consumer group setup failed: {0}")]
    Group(String),
}

/// Contract over the broker's named streams and consumer groups
#[async_trait]
pub trait StreamBus: Send + Sync {
    /// Create the consumer group if it does not exist; existing groups are fine
    async fn ensure_group(&self, stream: &str, group: &str, start_id: &str)
        -> Result<(), StreamError>;

    /// Read up to `count` new entries for this consumer, blocking up to `block`
    ///
    /// An empty result after the blocking window is normal.
    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        block: Duration,
        count: usize,
    ) -> Result<Vec<StreamEntry>, StreamError>;

    /// Acknowledge one delivered entry by id
    async fn ack(&self, stream: &str, group: &str, entry_id: &str) -> Result<(), StreamError>;

    /// Append an entry and return its broker-assigned id
    async fn append(
        &self,
        stream: &str,
        fields: Vec<(String, String)>,
    ) -> Result<String, StreamError>;
}
