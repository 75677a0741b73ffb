//! Graph execution state loaded from the state store
//!
//! The worker never mutates these records; a `GraphState` is a read-only
//! snapshot taken per work item and dropped once the decision is published.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Lifecycle status of a graph execution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Lifecycle status of a single node within an execution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

/// Per-node execution record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeState {
    #[serde(default)]
    pub status: NodeStatus,
    #[serde(default)]
    pub output: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Snapshot of one graph execution as stored under `graph:state:<execution_id>`
///
/// All fields are defaulted so that partial payloads written by older
/// orchestrators still deserialize. When `graph_id` is empty after a load,
/// the processor fills it in from the work item's execution id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphState {
    #[serde(default)]
    pub graph_id: String,
    #[serde(default)]
    pub status: ExecutionStatus,
    #[serde(default)]
    pub inputs: HashMap<String, Value>,
    #[serde(default)]
    pub node_states: HashMap<String, NodeState>,
}

impl ExecutionStatus {
    /// Wire representation used by the evaluation projections
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Cancelled => "cancelled",
        }
    }
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Pending => "pending",
            NodeStatus::Running => "running",
            NodeStatus::Completed => "completed",
            NodeStatus::Failed => "failed",
            NodeStatus::Skipped => "skipped",
        }
    }
}
