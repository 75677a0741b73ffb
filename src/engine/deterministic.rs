//! Deterministic routing over ordered CEL rules

use crate::engine::{eval_projection, RoutingEngine};
use crate::protocol::{PathTaken, RoutingConfig, RoutingDecision, RoutingMode, Rule};
use crate::state::GraphState;
use serde_json::Value;
use tracing::{debug, info, warn};

impl RoutingEngine {
    /// Evaluate rules in declared order; first true condition wins, otherwise
    /// the configured fallback is taken
    pub(crate) fn route_deterministic(
        &self,
        state: &GraphState,
        config: &RoutingConfig,
    ) -> RoutingDecision {
        let vars = eval_projection(state);

        if let Some((index, rule)) = self.first_matching_rule(&config.rules, &vars, "rule") {
            return RoutingDecision {
                target_node: rule.target.clone(),
                reasoning: format!("matched rule {index}: {}", rule.condition),
                mode: RoutingMode::Deterministic,
                path_taken: PathTaken::Fast,
            };
        }

        info!(fallback = %config.fallback, "no rules matched, using fallback");
        RoutingDecision {
            target_node: config.fallback.clone(),
            reasoning: "no rules matched".to_string(),
            mode: RoutingMode::Deterministic,
            path_taken: PathTaken::Fallback,
        }
    }

    /// Walk rules in order and return the first whose condition is `true`
    ///
    /// An evaluation error or a non-boolean result skips that rule only; an
    /// earlier broken rule never promotes a later match above an earlier one
    /// because the walk stays strictly ordered.
    pub(crate) fn first_matching_rule<'a>(
        &self,
        rules: &'a [Rule],
        vars: &Value,
        kind: &str,
    ) -> Option<(usize, &'a Rule)> {
        for (index, rule) in rules.iter().enumerate() {
            debug!(rule_index = index, condition = %rule.condition, "evaluating {kind}");

            let result = match self.expressions.evaluate(&rule.condition, vars) {
                Ok(result) => result,
                Err(e) => {
                    warn!(
                        rule_index = index,
                        condition = %rule.condition,
                        error = %e,
                        "{kind} evaluation error"
                    );
                    continue;
                }
            };

            let matched = match result.as_bool() {
                Some(matched) => matched,
                None => {
                    warn!(
                        rule_index = index,
                        condition = %rule.condition,
                        result = %result,
                        "{kind} condition did not return boolean"
                    );
                    continue;
                }
            };

            if matched {
                info!(
                    rule_index = index,
                    condition = %rule.condition,
                    target = %rule.target,
                    "{kind} matched"
                );
                return Some((index, rule));
            }
        }

        None
    }
}
