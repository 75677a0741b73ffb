//! Routing decision engine
//!
//! Given a validated routing configuration and a graph state snapshot,
//! produce a decision using one of three strategies: deterministic rule
//! evaluation, semantic classification through a language model, or a hybrid
//! of the two. The engine is stateless and reentrant; the only shared state
//! it touches are the compile caches inside the evaluators.

use crate::error::{WorkerError, WorkerResult};
use crate::eval::{ExpressionEvaluator, TemplateEngine};
use crate::llm::LlmProvider;
use crate::protocol::{RoutingConfig, RoutingDecision, RoutingMode};
use crate::state::GraphState;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod deterministic;
mod hybrid;
mod llm;

/// Completion budget for routing classifications; responses are short labels
const COMPLETION_BUDGET_TOKENS: u32 = 1024;

/// Makes routing decisions for work items
pub struct RoutingEngine {
    expressions: ExpressionEvaluator,
    templates: TemplateEngine,
    llm: Option<Arc<dyn LlmProvider>>,
    llm_timeout: Duration,
}

impl RoutingEngine {
    /// Create an engine; `llm` is optional for deterministic-only workers
    pub fn new(llm: Option<Arc<dyn LlmProvider>>, llm_timeout: Duration) -> Self {
        Self {
            expressions: ExpressionEvaluator::new(),
            templates: TemplateEngine::new(),
            llm,
            llm_timeout,
        }
    }

    /// Produce a routing decision for one graph state and node config
    pub async fn route(
        &self,
        state: &GraphState,
        config: &RoutingConfig,
        cancel: &CancellationToken,
    ) -> WorkerResult<RoutingDecision> {
        let mode = config.effective_mode();
        info!(
            graph_id = %state.graph_id,
            mode = mode.as_str(),
            "routing request"
        );

        self.validate_config(config, mode)?;

        let result = match mode {
            RoutingMode::Deterministic => Ok(self.route_deterministic(state, config)),
            RoutingMode::Llm => self.route_llm(state, config, cancel).await,
            RoutingMode::Hybrid => self.route_hybrid(state, config, cancel).await,
        };

        match result {
            Ok(decision) => {
                info!(
                    graph_id = %state.graph_id,
                    mode = mode.as_str(),
                    target = %decision.target_node,
                    path = decision.path_taken.as_str(),
                    reasoning = %decision.reasoning,
                    "routing decision"
                );
                Ok(decision)
            }
            Err(e) => {
                error!(
                    graph_id = %state.graph_id,
                    mode = mode.as_str(),
                    error = %e,
                    "routing failed"
                );
                Err(e)
            }
        }
    }

    /// Pre-flight validation run on every decision
    fn validate_config(&self, config: &RoutingConfig, mode: RoutingMode) -> WorkerResult<()> {
        if config.fallback.is_empty() {
            return Err(invalid_config("fallback route is required"));
        }

        match mode {
            RoutingMode::Deterministic => {
                if config.rules.is_empty() {
                    return Err(invalid_config("deterministic mode requires rules"));
                }
                validate_rules(&config.rules, "rule")?;
            }
            RoutingMode::Llm => {
                let spec = config
                    .llm_config
                    .as_ref()
                    .ok_or_else(|| invalid_config("llm mode requires llm_config"))?;
                if spec.prompt_template.is_empty() {
                    return Err(invalid_config("llm_config.prompt_template is required"));
                }
                if spec.routes.is_empty() {
                    return Err(invalid_config("llm_config.routes is required"));
                }
            }
            RoutingMode::Hybrid => {
                if config.fast_rules.is_empty() {
                    return Err(invalid_config("hybrid mode requires fast_rules"));
                }
                validate_rules(&config.fast_rules, "fast rule")?;
                let spec = config
                    .llm_fallback
                    .as_ref()
                    .ok_or_else(|| invalid_config("hybrid mode requires llm_fallback"))?;
                if spec.prompt_template.is_empty() {
                    return Err(invalid_config("llm_fallback.prompt_template is required"));
                }
                if spec.routes.is_empty() {
                    return Err(invalid_config("llm_fallback.routes is required"));
                }
            }
        }

        Ok(())
    }

    /// Validate expression and template syntax without routing
    pub fn validate_expression(&self, expression: &str) -> WorkerResult<()> {
        self.expressions.validate(expression)?;
        Ok(())
    }

    pub fn validate_template(&self, template: &str) -> WorkerResult<()> {
        self.templates.validate(template)?;
        Ok(())
    }

    /// Drop both compile caches
    pub fn clear_caches(&self) {
        self.expressions.clear_cache();
        self.templates.clear_cache();
    }
}

fn invalid_config(message: &str) -> WorkerError {
    WorkerError::invalid(format!("invalid config: {message}"))
}

fn validate_rules(rules: &[crate::protocol::Rule], kind: &str) -> WorkerResult<()> {
    for (index, rule) in rules.iter().enumerate() {
        if rule.condition.is_empty() {
            return Err(invalid_config(&format!("{kind} {index}: condition is required")));
        }
        if rule.target.is_empty() {
            return Err(invalid_config(&format!("{kind} {index}: target is required")));
        }
    }
    Ok(())
}

/// Read-only view of graph state exposed to the expression evaluator
///
/// A single top-level binding `state` carrying the projection.
pub(crate) fn eval_projection(state: &GraphState) -> Value {
    json!({ "state": state_view(state) })
}

/// View exposed to the template engine: the same `state`, with each input
/// additionally copied to a top-level field for convenience
pub(crate) fn template_projection(state: &GraphState) -> Value {
    let mut data = serde_json::Map::new();
    data.insert("state".to_string(), state_view(state));
    for (key, value) in &state.inputs {
        data.insert(key.clone(), value.clone());
    }
    Value::Object(data)
}

fn state_view(state: &GraphState) -> Value {
    let node_states: serde_json::Map<String, Value> = state
        .node_states
        .iter()
        .map(|(node_id, node)| {
            (
                node_id.clone(),
                json!({
                    "status": node.status.as_str(),
                    "output": node.output,
                    "error": node.error,
                    "started_at": node.started_at,
                    "completed_at": node.completed_at,
                }),
            )
        })
        .collect();

    json!({
        "graph_id": state.graph_id,
        "status": state.status.as_str(),
        "inputs": state.inputs,
        "node_states": node_states,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{LlmSpec, Rule};
    use crate::state::{NodeState, NodeStatus};
    use std::collections::BTreeMap;

    fn engine() -> RoutingEngine {
        RoutingEngine::new(None, Duration::from_secs(5))
    }

    fn rule(condition: &str, target: &str) -> Rule {
        Rule {
            condition: condition.to_string(),
            target: target.to_string(),
        }
    }

    fn llm_spec() -> LlmSpec {
        LlmSpec {
            prompt_template: "Classify: {{ state.inputs.msg }}".to_string(),
            routes: BTreeMap::from([("technical".to_string(), "T".to_string())]),
        }
    }

    fn base_config() -> RoutingConfig {
        RoutingConfig {
            mode: None,
            rules: Vec::new(),
            fast_rules: Vec::new(),
            llm_config: None,
            llm_fallback: None,
            fallback: "default".to_string(),
        }
    }

    #[test]
    fn test_validate_rejects_empty_fallback() {
        let mut config = base_config();
        config.fallback = String::new();
        config.rules = vec![rule("true", "a")];

        let err = engine()
            .validate_config(&config, RoutingMode::Deterministic)
            .unwrap_err();
        assert!(err.to_string().contains("fallback route is required"));
    }

    #[test]
    fn test_validate_rejects_deterministic_without_rules() {
        let config = base_config();
        let err = engine()
            .validate_config(&config, RoutingMode::Deterministic)
            .unwrap_err();
        assert!(err.to_string().contains("deterministic mode requires rules"));
    }

    #[test]
    fn test_validate_rejects_empty_rule_fields() {
        let mut config = base_config();
        config.rules = vec![rule("", "a")];
        let err = engine()
            .validate_config(&config, RoutingMode::Deterministic)
            .unwrap_err();
        assert!(err.to_string().contains("rule 0: condition is required"));

        config.rules = vec![rule("true", "")];
        let err = engine()
            .validate_config(&config, RoutingMode::Deterministic)
            .unwrap_err();
        assert!(err.to_string().contains("rule 0: target is required"));
    }

    #[test]
    fn test_validate_rejects_llm_without_config() {
        let config = base_config();
        let err = engine()
            .validate_config(&config, RoutingMode::Llm)
            .unwrap_err();
        assert!(err.to_string().contains("llm mode requires llm_config"));
    }

    #[test]
    fn test_validate_rejects_llm_empty_routes() {
        let mut config = base_config();
        let mut spec = llm_spec();
        spec.routes.clear();
        config.llm_config = Some(spec);

        let err = engine()
            .validate_config(&config, RoutingMode::Llm)
            .unwrap_err();
        assert!(err.to_string().contains("llm_config.routes is required"));
    }

    #[test]
    fn test_validate_rejects_hybrid_missing_parts() {
        let mut config = base_config();
        let err = engine()
            .validate_config(&config, RoutingMode::Hybrid)
            .unwrap_err();
        assert!(err.to_string().contains("hybrid mode requires fast_rules"));

        config.fast_rules = vec![rule("true", "a")];
        let err = engine()
            .validate_config(&config, RoutingMode::Hybrid)
            .unwrap_err();
        assert!(err.to_string().contains("hybrid mode requires llm_fallback"));

        config.llm_fallback = Some(llm_spec());
        assert!(engine()
            .validate_config(&config, RoutingMode::Hybrid)
            .is_ok());
    }

    #[test]
    fn test_eval_projection_shape() {
        let mut state = GraphState {
            graph_id: "g1".to_string(),
            ..Default::default()
        };
        state
            .inputs
            .insert("priority".to_string(), json!("high"));
        state.node_states.insert(
            "ingest".to_string(),
            NodeState {
                status: NodeStatus::Completed,
                output: json!({"rows": 10}),
                ..Default::default()
            },
        );

        let projection = eval_projection(&state);
        assert_eq!(projection["state"]["graph_id"], "g1");
        assert_eq!(projection["state"]["status"], "pending");
        assert_eq!(projection["state"]["inputs"]["priority"], "high");
        assert_eq!(
            projection["state"]["node_states"]["ingest"]["status"],
            "completed"
        );
        assert_eq!(
            projection["state"]["node_states"]["ingest"]["output"]["rows"],
            10
        );
    }

    #[test]
    fn test_template_projection_flattens_inputs() {
        let mut state = GraphState::default();
        state.inputs.insert("msg".to_string(), json!("hello"));

        let projection = template_projection(&state);
        assert_eq!(projection["state"]["inputs"]["msg"], "hello");
        assert_eq!(projection["msg"], "hello");
    }
}
