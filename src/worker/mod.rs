//! Worker lifecycle and consumer loop
//!
//! One worker owns one consumer-loop task reading the input stream through
//! the consumer group under a stable consumer name. Entries are dispatched
//! to the processor and acknowledged exactly once whatever the outcome;
//! redelivery of unacked entries is the broker's job through its
//! pending-entries list, never this worker's.

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::store::StateStore;
use crate::stream::StreamBus;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub mod health;
pub mod processor;

pub use processor::WorkItemProcessor;

/// Baseline: one in-flight item per consumer loop, acked independently
const READ_COUNT: usize = 1;
/// Pause after a transient read error before retrying
const READ_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// The routing worker: consumer loop plus its cancellation scope
pub struct Worker<S: StreamBus + 'static, K: StateStore + 'static> {
    config: WorkerConfig,
    streams: Arc<S>,
    processor: Arc<WorkItemProcessor<S, K>>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl<S: StreamBus + 'static, K: StateStore + 'static> Worker<S, K> {
    pub fn new(
        config: WorkerConfig,
        streams: Arc<S>,
        processor: Arc<WorkItemProcessor<S, K>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            streams,
            processor,
            cancel,
            handle: None,
        }
    }

    /// Ensure the consumer group exists and spawn the consumer loop
    pub async fn start(&mut self) -> WorkerResult<()> {
        info!(
            worker_id = %self.config.worker_id,
            stream_key = %self.config.stream_key,
            consumer_group = %self.config.consumer_group,
            "starting router worker"
        );

        self.streams
            .ensure_group(&self.config.stream_key, &self.config.consumer_group, "0")
            .await?;

        let handle = tokio::spawn(consume_loop(
            self.config.clone(),
            self.streams.clone(),
            self.processor.clone(),
            self.cancel.clone(),
        ));
        self.handle = Some(handle);

        info!(worker_id = %self.config.worker_id, "router worker started");
        Ok(())
    }

    /// Cancel the scope and wait up to `grace` for in-flight work to drain
    pub async fn stop(&mut self, grace: Duration) {
        info!(worker_id = %self.config.worker_id, "stopping router worker");
        self.cancel.cancel();

        if let Some(mut handle) = self.handle.take() {
            if tokio::time::timeout(grace, &mut handle).await.is_err() {
                warn!("shutdown grace period exceeded, aborting consumer loop");
                handle.abort();
            }
        }

        info!(worker_id = %self.config.worker_id, "router worker stopped");
    }
}

/// Pull work items until cancelled
///
/// Empty reads after the blocking window are normal. Transient read errors
/// back off briefly and retry; per-item failures never end the loop.
async fn consume_loop<S: StreamBus, K: StateStore>(
    config: WorkerConfig,
    streams: Arc<S>,
    processor: Arc<WorkItemProcessor<S, K>>,
    cancel: CancellationToken,
) {
    info!("starting work processing loop");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("work processing loop stopped");
                return;
            }
            result = streams.read_group(
                &config.stream_key,
                &config.consumer_group,
                &config.worker_id,
                config.block_time,
                READ_COUNT,
            ) => match result {
                Ok(entries) => {
                    for entry in entries {
                        processor.process(&entry, &cancel).await;

                        if let Err(e) = streams
                            .ack(&config.stream_key, &config.consumer_group, &entry.id)
                            .await
                        {
                            error!(
                                entry_id = %entry.id,
                                error = %e,
                                "failed to acknowledge message"
                            );
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "failed to read from stream");
                    tokio::time::sleep(READ_ERROR_BACKOFF).await;
                }
            },
        }
    }
}
