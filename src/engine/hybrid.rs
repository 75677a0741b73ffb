//! Hybrid routing: fast CEL rules with a language-model fallback

use crate::engine::llm::match_response;
use crate::engine::{eval_projection, template_projection, RoutingEngine};
use crate::error::{WorkerError, WorkerResult};
use crate::protocol::{PathTaken, RoutingConfig, RoutingDecision, RoutingMode};
use crate::state::GraphState;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

impl RoutingEngine {
    /// Phase 1 runs the deterministic procedure over `fast_rules`; phase 2
    /// hands unmatched states to the model. An unavailable model, a render
    /// failure or an unmatched response all recover to the fallback target.
    pub(crate) async fn route_hybrid(
        &self,
        state: &GraphState,
        config: &RoutingConfig,
        cancel: &CancellationToken,
    ) -> WorkerResult<RoutingDecision> {
        debug!(num_rules = config.fast_rules.len(), "trying fast rules");

        let vars = eval_projection(state);
        if let Some((index, rule)) =
            self.first_matching_rule(&config.fast_rules, &vars, "fast rule")
        {
            return Ok(RoutingDecision {
                target_node: rule.target.clone(),
                reasoning: format!("matched fast rule {index}: {}", rule.condition),
                mode: RoutingMode::Hybrid,
                path_taken: PathTaken::Fast,
            });
        }

        debug!("fast rules did not match, trying llm fallback");

        let spec = config.llm_fallback.as_ref().ok_or_else(|| {
            WorkerError::invalid("invalid config: hybrid mode requires llm_fallback")
        })?;

        let provider = match self.llm.as_ref() {
            Some(provider) => provider,
            None => {
                warn!("llm client not configured, using fallback route");
                return Ok(self.hybrid_fallback(
                    config,
                    "fast rules did not match and llm client not configured".to_string(),
                ));
            }
        };

        let prompt = match self
            .templates
            .render(&spec.prompt_template, &template_projection(state))
        {
            Ok(prompt) => prompt,
            Err(e) => {
                error!(error = %e, "failed to render llm prompt");
                return Ok(self.hybrid_fallback(config, format!("failed to render prompt: {e}")));
            }
        };

        debug!(prompt = %prompt, "calling llm for routing");

        let response = match self.call_model(provider.as_ref(), &prompt, cancel).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "llm call failed");
                return Ok(self.hybrid_fallback(config, format!("llm call failed: {e}")));
            }
        };

        debug!(response = %response, "llm response received");

        match match_response(&response, &spec.routes) {
            Some(target) => Ok(RoutingDecision {
                target_node: target,
                reasoning: format!("llm classified as: {response} (after fast rules failed)"),
                mode: RoutingMode::Hybrid,
                path_taken: PathTaken::Slow,
            }),
            None => {
                warn!(response = %response, "llm response did not match any route");
                Ok(self.hybrid_fallback(
                    config,
                    format!("llm response '{response}' did not match any route"),
                ))
            }
        }
    }

    fn hybrid_fallback(&self, config: &RoutingConfig, reasoning: String) -> RoutingDecision {
        RoutingDecision {
            target_node: config.fallback.clone(),
            reasoning,
            mode: RoutingMode::Hybrid,
            path_taken: PathTaken::Fallback,
        }
    }
}
