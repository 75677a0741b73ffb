//! Work item processor
//!
//! Takes one delivered stream entry end to end: parse the work item, load
//! the graph state, run the routing engine, publish the decision record or
//! the error record. The consumer loop acknowledges afterwards regardless of
//! outcome, so every path through here must terminate without propagating.

use crate::engine::RoutingEngine;
use crate::error::{WorkerError, WorkerResult};
use crate::protocol::{DecisionRecord, RoutingConfig, WorkItem};
use crate::store::StateStore;
use crate::stream::{StreamBus, StreamEntry};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Processes routing work items pulled from the input stream
pub struct WorkItemProcessor<S: StreamBus, K: StateStore> {
    engine: RoutingEngine,
    streams: Arc<S>,
    store: Arc<K>,
    result_stream: String,
    error_stream: String,
}

impl<S: StreamBus, K: StateStore> WorkItemProcessor<S, K> {
    pub fn new(
        engine: RoutingEngine,
        streams: Arc<S>,
        store: Arc<K>,
        result_stream: &str,
    ) -> Self {
        Self {
            engine,
            streams,
            store,
            result_stream: result_stream.to_string(),
            error_stream: format!("{result_stream}.errors"),
        }
    }

    /// Handle one delivered entry
    ///
    /// Hard failures are published as error records; entries whose payload
    /// does not parse carry no ids to report against and are only logged.
    pub async fn process(&self, entry: &StreamEntry, cancel: &CancellationToken) {
        info!(entry_id = %entry.id, "processing routing request");

        let item = match parse_work_item(entry) {
            Ok(item) => item,
            Err(e) => {
                error!(entry_id = %entry.id, error = %e, "failed to parse work item");
                return;
            }
        };

        if let Err(e) = self.handle(&item, cancel).await {
            error!(
                entry_id = %entry.id,
                execution_id = %item.execution_id,
                error = %e,
                "failed to process routing request"
            );
            self.publish_error(&item, &e).await;
        }
    }

    async fn handle(&self, item: &WorkItem, cancel: &CancellationToken) -> WorkerResult<()> {
        let mut state = self.store.load(&item.execution_id).await?;
        if state.graph_id.is_empty() {
            state.graph_id = item.execution_id.clone();
        }

        let config: RoutingConfig = serde_json::from_value(item.config.clone())
            .map_err(|e| WorkerError::invalid(format!("failed to parse node config: {e}")))?;

        let decision = self.engine.route(&state, &config, cancel).await?;

        let record = DecisionRecord::new(&item.execution_id, &item.node_id, decision);
        let payload = serde_json::to_string(&record)
            .map_err(|e| WorkerError::invalid(format!("failed to serialize decision: {e}")))?;
        self.streams
            .append(&self.result_stream, vec![("data".to_string(), payload)])
            .await?;

        info!(
            execution_id = %item.execution_id,
            target_node = %record.target_node,
            "published routing decision"
        );
        Ok(())
    }

    async fn publish_error(&self, item: &WorkItem, error: &WorkerError) {
        let record = error.to_error_record(&item.execution_id, &item.node_id);
        let payload = match serde_json::to_string(&record) {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "failed to serialize error record");
                return;
            }
        };

        if let Err(e) = self
            .streams
            .append(&self.error_stream, vec![("data".to_string(), payload)])
            .await
        {
            error!(error = %e, "failed to publish error record");
        }
    }
}

fn parse_work_item(entry: &StreamEntry) -> WorkerResult<WorkItem> {
    let data = entry
        .data()
        .ok_or_else(|| WorkerError::invalid("missing or invalid 'data' field"))?;
    serde_json::from_str(data)
        .map_err(|e| WorkerError::invalid(format!("failed to parse work item: {e}")))
}
