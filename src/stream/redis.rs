//! Redis Streams implementation of the stream bus
//!
//! Work items arrive via `XREADGROUP ... >` on the input stream; decisions
//! and error records leave via `XADD`. The connection manager reconnects on
//! broker restarts, so transient failures surface as errors the consumer
//! loop retries.

use crate::stream::{StreamBus, StreamEntry, StreamError};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use std::time::Duration;
use tracing::debug;

/// Stream bus over Redis Streams
#[derive(Clone)]
pub struct RedisStreamBus {
    conn: ConnectionManager,
}

impl RedisStreamBus {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl StreamBus for RedisStreamBus {
    async fn ensure_group(
        &self,
        stream: &str,
        group: &str,
        start_id: &str,
    ) -> Result<(), StreamError> {
        let mut conn = self.conn.clone();
        match conn
            .xgroup_create_mkstream::<_, _, _, String>(stream, group, start_id)
            .await
        {
            Ok(_) => {
                debug!(stream, group, "created consumer group");
                Ok(())
            }
            Err(e) if is_busygroup(&e) => {
                debug!(stream, group, "consumer group already exists");
                Ok(())
            }
            Err(e) => Err(StreamError::Group(e.to_string())),
        }
    }

    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        block: Duration,
        count: usize,
    ) -> Result<Vec<StreamEntry>, StreamError> {
        let mut conn = self.conn.clone();
        let options = StreamReadOptions::default()
            .group(group, consumer)
            .count(count)
            .block(block.as_millis() as usize);

        let reply: Option<StreamReadReply> = conn
            .xread_options(&[stream], &[">"], &options)
            .await
            .map_err(|e| StreamError::Read(e.to_string()))?;

        let mut entries = Vec::new();
        if let Some(reply) = reply {
            for key in reply.keys {
                for id in key.ids {
                    let fields = id
                        .map
                        .iter()
                        .map(|(name, value)| {
                            let value =
                                redis::from_redis_value::<String>(value).unwrap_or_default();
                            (name.clone(), value)
                        })
                        .collect();
                    entries.push(StreamEntry { id: id.id, fields });
                }
            }
        }
        Ok(entries)
    }

    async fn ack(&self, stream: &str, group: &str, entry_id: &str) -> Result<(), StreamError> {
        let mut conn = self.conn.clone();
        conn.xack::<_, _, _, i64>(stream, group, &[entry_id])
            .await
            .map_err(|e| StreamError::Ack(e.to_string()))?;
        Ok(())
    }

    async fn append(
        &self,
        stream: &str,
        fields: Vec<(String, String)>,
    ) -> Result<String, StreamError> {
        let mut conn = self.conn.clone();
        conn.xadd::<_, _, _, _, String>(stream, "*", &fields)
            .await
            .map_err(|e| StreamError::Append(e.to_string()))
    }
}

// XGROUP CREATE on an existing group fails with BUSYGROUP, which is not an error here
fn is_busygroup(error: &redis::RedisError) -> bool {
    error.code() == Some("BUSYGROUP") || error.to_string().contains("BUSYGROUP")
}
