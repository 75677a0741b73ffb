//! Router Worker
//!
//! A horizontally scalable routing worker for graph-execution workflows. An
//! orchestrator appends routing work items to a broker stream; workers
//! consume them through a consumer group, load the referenced graph state,
//! evaluate the node's routing configuration and publish a decision.
//!
//! # Overview
//!
//! This crate provides:
//! - A routing engine with deterministic (CEL rules), llm (semantic
//!   classification) and hybrid strategies, each with defined fallback
//!   semantics
//! - Cached expression and template evaluation over a read-only state
//!   projection
//! - A consumer loop with at-least-once processing, per-entry
//!   acknowledgement and graceful shutdown
//! - Redis adapters for the work/result streams and the graph state store
//! - LLM provider integrations (Anthropic, OpenAI)
//!
//! # Quick start
//!
//! ```rust
//! use router_worker::protocol::{RoutingConfig, RoutingMode, WorkItem};
//! use serde_json::json;
//!
//! // A work item as the orchestrator publishes it
//! let item: WorkItem = serde_json::from_value(json!({
//!     "execution_id": "exec-1",
//!     "node_id": "triage",
//!     "config": {
//!         "mode": "deterministic",
//!         "rules": [
//!             {"condition": "state.inputs.priority == 'high'", "target": "urgent"}
//!         ],
//!         "fallback": "default"
//!     }
//! }))
//! .unwrap();
//!
//! let config: RoutingConfig = serde_json::from_value(item.config.clone()).unwrap();
//! assert_eq!(config.effective_mode(), RoutingMode::Deterministic);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod eval;
pub mod llm;
pub mod observability;
pub mod protocol;
pub mod state;
pub mod store;
pub mod stream;
pub mod testing;
pub mod worker;

pub use config::{ConfigError, WorkerConfig};
pub use engine::RoutingEngine;
pub use error::{WorkerError, WorkerResult};
pub use protocol::*;
pub use state::{GraphState, NodeState};
