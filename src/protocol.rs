//! Wire types for routing work, decisions and errors
//!
//! Work items arrive on the input stream as a JSON `data` field, decisions
//! leave on the result stream, hard failures on `<result-stream>.errors`.
//! Producers that omit `mode` get it inferred from which config sections are
//! present.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A unit of routing work pulled from the input stream
///
/// `config` is carried as an untyped value; the processor validates it into a
/// [`RoutingConfig`] before any decision is made.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    /// Identifies the graph state to load (`graph:state:<execution_id>`)
    pub execution_id: String,
    /// The routing node being asked for a decision
    pub node_id: String,
    /// Node-specific routing configuration
    pub config: Value,
}

/// Routing strategy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    Deterministic,
    Llm,
    Hybrid,
}

impl RoutingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingMode::Deterministic => "deterministic",
            RoutingMode::Llm => "llm",
            RoutingMode::Hybrid => "hybrid",
        }
    }
}

/// A single condition/target pair evaluated by the deterministic strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// CEL expression over the `state` projection
    pub condition: String,
    /// Node to route to when the condition holds
    pub target: String,
}

/// Semantic-routing configuration: a prompt template plus a label→target map
///
/// `routes` is ordered so the containment pass of response matching walks
/// keys in a stable order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSpec {
    pub prompt_template: String,
    pub routes: BTreeMap<String, String>,
}

/// Routing configuration for one node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<RoutingMode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Rule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fast_rules: Vec<Rule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_config: Option<LlmSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_fallback: Option<LlmSpec>,
    /// Target used when no strategy yields a match
    #[serde(default)]
    pub fallback: String,
}

impl RoutingConfig {
    /// Resolve the effective mode, inferring it when the producer omitted one
    pub fn effective_mode(&self) -> RoutingMode {
        if let Some(mode) = self.mode {
            return mode;
        }
        if !self.fast_rules.is_empty() && self.llm_fallback.is_some() {
            RoutingMode::Hybrid
        } else if self.llm_config.is_some() {
            RoutingMode::Llm
        } else {
            RoutingMode::Deterministic
        }
    }
}

/// Which phase of a strategy produced the decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathTaken {
    /// A rule matched at the first phase
    Fast,
    /// A language-model classification matched
    Slow,
    /// The configured fallback target was taken
    Fallback,
}

impl PathTaken {
    pub fn as_str(&self) -> &'static str {
        match self {
            PathTaken::Fast => "fast",
            PathTaken::Slow => "slow",
            PathTaken::Fallback => "fallback",
        }
    }
}

/// Output of the routing engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub target_node: String,
    pub reasoning: String,
    pub mode: RoutingMode,
    pub path_taken: PathTaken,
}

/// Record appended to the result stream for each successful decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub execution_id: String,
    pub node_id: String,
    pub target_node: String,
    pub reasoning: String,
    pub mode: RoutingMode,
    pub path_taken: PathTaken,
    pub timestamp: DateTime<Utc>,
}

impl DecisionRecord {
    pub fn new(execution_id: &str, node_id: &str, decision: RoutingDecision) -> Self {
        Self {
            execution_id: execution_id.to_string(),
            node_id: node_id.to_string(),
            target_node: decision.target_node,
            reasoning: decision.reasoning,
            mode: decision.mode,
            path_taken: decision.path_taken,
            timestamp: Utc::now(),
        }
    }
}

/// Record appended to the error stream when an item fails hard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub execution_id: String,
    pub node_id: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}
