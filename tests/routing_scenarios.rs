//! Routing engine scenarios: strategy semantics, fallback totality and
//! validation refusal, driven through the mock LLM provider.

use router_worker::engine::RoutingEngine;
use router_worker::error::WorkerError;
use router_worker::protocol::{PathTaken, RoutingConfig, RoutingMode};
use router_worker::state::GraphState;
use router_worker::testing::mocks::MockLlmProvider;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn state_with_inputs(inputs: Value) -> GraphState {
    serde_json::from_value(json!({
        "graph_id": "exec-1",
        "status": "running",
        "inputs": inputs
    }))
    .unwrap()
}

fn config(value: Value) -> RoutingConfig {
    serde_json::from_value(value).unwrap()
}

fn engine_without_llm() -> RoutingEngine {
    RoutingEngine::new(None, Duration::from_secs(5))
}

fn engine_with_llm(provider: MockLlmProvider) -> RoutingEngine {
    RoutingEngine::new(Some(Arc::new(provider)), Duration::from_secs(5))
}

#[tokio::test]
async fn deterministic_rule_match_takes_fast_path() {
    let engine = engine_without_llm();
    let state = state_with_inputs(json!({"priority": "high"}));
    let config = config(json!({
        "mode": "deterministic",
        "rules": [{"condition": "state.inputs.priority == 'high'", "target": "urgent"}],
        "fallback": "default"
    }));

    let decision = engine
        .route(&state, &config, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(decision.target_node, "urgent");
    assert_eq!(decision.path_taken, PathTaken::Fast);
    assert_eq!(decision.mode, RoutingMode::Deterministic);
    assert!(decision.reasoning.contains("matched rule 0"));
}

#[tokio::test]
async fn deterministic_no_match_takes_fallback() {
    let engine = engine_without_llm();
    let state = state_with_inputs(json!({"priority": "low"}));
    let config = config(json!({
        "mode": "deterministic",
        "rules": [{"condition": "state.inputs.priority == 'high'", "target": "urgent"}],
        "fallback": "default"
    }));

    let decision = engine
        .route(&state, &config, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(decision.target_node, "default");
    assert_eq!(decision.path_taken, PathTaken::Fallback);
    assert_eq!(decision.reasoning, "no rules matched");
}

#[tokio::test]
async fn broken_rule_skips_to_next_rule() {
    let engine = engine_without_llm();
    let state = state_with_inputs(json!({"n": 1}));
    let config = config(json!({
        "mode": "deterministic",
        "rules": [
            {"condition": "nosuch.x > 1", "target": "A"},
            {"condition": "state.inputs.n > 0", "target": "B"}
        ],
        "fallback": "D"
    }));

    let decision = engine
        .route(&state, &config, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(decision.target_node, "B");
    assert_eq!(decision.path_taken, PathTaken::Fast);
    assert!(decision.reasoning.contains("matched rule 1"));
}

#[tokio::test]
async fn non_boolean_rule_result_is_skipped() {
    let engine = engine_without_llm();
    let state = state_with_inputs(json!({"n": 7}));
    let config = config(json!({
        "mode": "deterministic",
        "rules": [
            {"condition": "state.inputs.n + 1", "target": "A"},
            {"condition": "state.inputs.n == 7", "target": "B"}
        ],
        "fallback": "D"
    }));

    let decision = engine
        .route(&state, &config, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(decision.target_node, "B");
}

#[tokio::test]
async fn order_first_match_wins_over_later_rules() {
    let engine = engine_without_llm();
    let state = state_with_inputs(json!({"n": 5}));
    let config = config(json!({
        "mode": "deterministic",
        "rules": [
            {"condition": "state.inputs.n > 0", "target": "first"},
            {"condition": "state.inputs.n > 0", "target": "second"}
        ],
        "fallback": "D"
    }));

    let decision = engine
        .route(&state, &config, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(decision.target_node, "first");
}

#[tokio::test]
async fn llm_match_with_mixed_case_response() {
    let engine = engine_with_llm(MockLlmProvider::single_response("  Technical \n"));
    let state = state_with_inputs(json!({"msg": "the server is broken"}));
    let config = config(json!({
        "mode": "llm",
        "llm_config": {
            "prompt_template": "Classify: {{state.inputs.msg}}",
            "routes": {"technical": "T", "billing": "B"}
        },
        "fallback": "default"
    }));

    let decision = engine
        .route(&state, &config, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(decision.target_node, "T");
    assert_eq!(decision.path_taken, PathTaken::Slow);
    assert_eq!(decision.mode, RoutingMode::Llm);
    assert!(decision.reasoning.contains("llm classified as"));
}

#[tokio::test]
async fn llm_client_error_recovers_to_fallback() {
    let engine = engine_with_llm(MockLlmProvider::with_failure());
    let state = state_with_inputs(json!({"msg": "anything"}));
    let config = config(json!({
        "mode": "llm",
        "llm_config": {
            "prompt_template": "Classify: {{state.inputs.msg}}",
            "routes": {"technical": "T", "billing": "B"}
        },
        "fallback": "default"
    }));

    let decision = engine
        .route(&state, &config, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(decision.target_node, "default");
    assert_eq!(decision.path_taken, PathTaken::Fallback);
    assert!(decision.reasoning.contains("llm call failed"));
}

#[tokio::test]
async fn llm_unmatched_response_recovers_to_fallback() {
    let engine = engine_with_llm(MockLlmProvider::single_response("no idea"));
    let state = state_with_inputs(json!({"msg": "anything"}));
    let config = config(json!({
        "mode": "llm",
        "llm_config": {
            "prompt_template": "Classify: {{state.inputs.msg}}",
            "routes": {"technical": "T"}
        },
        "fallback": "default"
    }));

    let decision = engine
        .route(&state, &config, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(decision.target_node, "default");
    assert_eq!(decision.path_taken, PathTaken::Fallback);
    assert!(decision.reasoning.contains("did not match any route"));
}

#[tokio::test]
async fn llm_without_client_is_hard_error() {
    let engine = engine_without_llm();
    let state = state_with_inputs(json!({"msg": "x"}));
    let config = config(json!({
        "mode": "llm",
        "llm_config": {
            "prompt_template": "Classify: {{state.inputs.msg}}",
            "routes": {"technical": "T"}
        },
        "fallback": "default"
    }));

    let result = engine.route(&state, &config, &CancellationToken::new()).await;
    assert!(matches!(result, Err(WorkerError::Model(_))));
}

#[tokio::test]
async fn llm_render_failure_is_hard_error() {
    let engine = engine_with_llm(MockLlmProvider::single_response("technical"));
    let state = state_with_inputs(json!({}));
    let config = config(json!({
        "mode": "llm",
        "llm_config": {
            "prompt_template": "Classify: {{ missing_key }}",
            "routes": {"technical": "T"}
        },
        "fallback": "default"
    }));

    let result = engine.route(&state, &config, &CancellationToken::new()).await;
    assert!(matches!(result, Err(WorkerError::Render(_))));
}

#[tokio::test]
async fn hybrid_fast_rule_hits() {
    let engine = engine_with_llm(MockLlmProvider::single_response("unused"));
    let state = state_with_inputs(json!({"amount": 1500}));
    let config = config(json!({
        "mode": "hybrid",
        "fast_rules": [{"condition": "state.inputs.amount > 1000", "target": "big"}],
        "llm_fallback": {
            "prompt_template": "Big? {{state.inputs.amount}}",
            "routes": {"yes": "Y", "no": "N"}
        },
        "fallback": "std"
    }));

    let decision = engine
        .route(&state, &config, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(decision.target_node, "big");
    assert_eq!(decision.path_taken, PathTaken::Fast);
    assert_eq!(decision.mode, RoutingMode::Hybrid);
}

#[tokio::test]
async fn hybrid_falls_through_to_llm() {
    let engine = engine_with_llm(MockLlmProvider::single_response("yes"));
    let state = state_with_inputs(json!({"amount": 100}));
    let config = config(json!({
        "mode": "hybrid",
        "fast_rules": [{"condition": "state.inputs.amount > 1000", "target": "big"}],
        "llm_fallback": {
            "prompt_template": "Big? {{state.inputs.amount}}",
            "routes": {"yes": "Y", "no": "N"}
        },
        "fallback": "std"
    }));

    let decision = engine
        .route(&state, &config, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(decision.target_node, "Y");
    assert_eq!(decision.path_taken, PathTaken::Slow);
    assert_eq!(decision.mode, RoutingMode::Hybrid);
    assert!(decision.reasoning.contains("after fast rules failed"));
}

#[tokio::test]
async fn hybrid_without_llm_client_falls_back() {
    let engine = engine_without_llm();
    let state = state_with_inputs(json!({"amount": 100}));
    let config = config(json!({
        "mode": "hybrid",
        "fast_rules": [{"condition": "state.inputs.amount > 1000", "target": "big"}],
        "llm_fallback": {
            "prompt_template": "Big? {{state.inputs.amount}}",
            "routes": {"yes": "Y"}
        },
        "fallback": "std"
    }));

    let decision = engine
        .route(&state, &config, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(decision.target_node, "std");
    assert_eq!(decision.path_taken, PathTaken::Fallback);
    assert!(decision
        .reasoning
        .contains("llm client not configured"));
}

#[tokio::test]
async fn hybrid_render_failure_falls_back() {
    let engine = engine_with_llm(MockLlmProvider::single_response("yes"));
    let state = state_with_inputs(json!({"amount": 100}));
    let config = config(json!({
        "mode": "hybrid",
        "fast_rules": [{"condition": "state.inputs.amount > 1000", "target": "big"}],
        "llm_fallback": {
            "prompt_template": "Big? {{ missing_key }}",
            "routes": {"yes": "Y"}
        },
        "fallback": "std"
    }));

    let decision = engine
        .route(&state, &config, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(decision.target_node, "std");
    assert_eq!(decision.path_taken, PathTaken::Fallback);
    assert!(decision.reasoning.contains("failed to render prompt"));
}

#[tokio::test]
async fn hybrid_model_error_falls_back() {
    let engine = engine_with_llm(MockLlmProvider::with_failure());
    let state = state_with_inputs(json!({"amount": 100}));
    let config = config(json!({
        "mode": "hybrid",
        "fast_rules": [{"condition": "state.inputs.amount > 1000", "target": "big"}],
        "llm_fallback": {
            "prompt_template": "Big? {{state.inputs.amount}}",
            "routes": {"yes": "Y"}
        },
        "fallback": "std"
    }));

    let decision = engine
        .route(&state, &config, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(decision.target_node, "std");
    assert_eq!(decision.path_taken, PathTaken::Fallback);
    assert!(decision.reasoning.contains("llm call failed"));
}

#[tokio::test]
async fn invalid_configs_never_produce_decisions() {
    let engine = engine_without_llm();
    let state = state_with_inputs(json!({"n": 1}));

    let invalid = vec![
        // Empty fallback
        json!({
            "mode": "deterministic",
            "rules": [{"condition": "true", "target": "a"}],
            "fallback": ""
        }),
        // Deterministic with no rules
        json!({"mode": "deterministic", "fallback": "d"}),
        // Rule with empty condition
        json!({
            "mode": "deterministic",
            "rules": [{"condition": "", "target": "a"}],
            "fallback": "d"
        }),
        // Rule with empty target
        json!({
            "mode": "deterministic",
            "rules": [{"condition": "true", "target": ""}],
            "fallback": "d"
        }),
        // Llm without llm_config
        json!({"mode": "llm", "fallback": "d"}),
        // Llm with empty routes
        json!({
            "mode": "llm",
            "llm_config": {"prompt_template": "p", "routes": {}},
            "fallback": "d"
        }),
        // Hybrid without llm_fallback
        json!({
            "mode": "hybrid",
            "fast_rules": [{"condition": "true", "target": "a"}],
            "fallback": "d"
        }),
        // Hybrid without fast_rules
        json!({
            "mode": "hybrid",
            "llm_fallback": {"prompt_template": "p", "routes": {"a": "A"}},
            "fallback": "d"
        }),
    ];

    for value in invalid {
        let config = config(value.clone());
        let result = engine.route(&state, &config, &CancellationToken::new()).await;
        assert!(
            matches!(result, Err(WorkerError::Invalid(_))),
            "config should be rejected: {value}"
        );
    }
}

#[tokio::test]
async fn fallback_totality_over_assorted_states() {
    let engine = engine_without_llm();
    let config = config(json!({
        "mode": "deterministic",
        "rules": [{"condition": "state.inputs.priority == 'high'", "target": "urgent"}],
        "fallback": "default"
    }));

    let states = vec![
        state_with_inputs(json!({})),
        state_with_inputs(json!({"priority": "high"})),
        state_with_inputs(json!({"priority": 42})),
        state_with_inputs(json!({"unrelated": [1, 2, 3]})),
        GraphState::default(),
    ];

    for state in states {
        let decision = engine
            .route(&state, &config, &CancellationToken::new())
            .await
            .unwrap();
        assert!(!decision.target_node.is_empty());
    }
}

#[tokio::test]
async fn inferred_hybrid_mode_routes_like_explicit() {
    let engine = engine_with_llm(MockLlmProvider::single_response("yes"));
    let state = state_with_inputs(json!({"amount": 100}));
    // No mode field: fast_rules + llm_fallback imply hybrid
    let config = config(json!({
        "fast_rules": [{"condition": "state.inputs.amount > 1000", "target": "big"}],
        "llm_fallback": {
            "prompt_template": "Big? {{state.inputs.amount}}",
            "routes": {"yes": "Y"}
        },
        "fallback": "std"
    }));

    let decision = engine
        .route(&state, &config, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(decision.mode, RoutingMode::Hybrid);
    assert_eq!(decision.target_node, "Y");
}
