//! Semantic routing through a language-model classification

use crate::engine::{template_projection, RoutingEngine, COMPLETION_BUDGET_TOKENS};
use crate::error::{WorkerError, WorkerResult};
use crate::llm::{LlmError, LlmProvider};
use crate::protocol::{PathTaken, RoutingConfig, RoutingDecision, RoutingMode};
use crate::state::GraphState;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

impl RoutingEngine {
    /// Render the prompt, classify through the model and map the response to
    /// a route; model failures and unmatched responses recover to fallback
    pub(crate) async fn route_llm(
        &self,
        state: &GraphState,
        config: &RoutingConfig,
        cancel: &CancellationToken,
    ) -> WorkerResult<RoutingDecision> {
        let spec = config
            .llm_config
            .as_ref()
            .ok_or_else(|| WorkerError::invalid("invalid config: llm mode requires llm_config"))?;

        let provider = self.llm.as_ref().ok_or_else(|| {
            WorkerError::Model(LlmError::NotConfigured("llm client not configured".to_string()))
        })?;

        // Render failures are hard errors in pure llm mode
        let prompt = self
            .templates
            .render(&spec.prompt_template, &template_projection(state))?;

        debug!(prompt = %prompt, "calling llm for routing");

        let response = match self.call_model(provider.as_ref(), &prompt, cancel).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "llm call failed");
                return Ok(RoutingDecision {
                    target_node: config.fallback.clone(),
                    reasoning: format!("llm call failed: {e}"),
                    mode: RoutingMode::Llm,
                    path_taken: PathTaken::Fallback,
                });
            }
        };

        debug!(response = %response, "llm response received");

        match match_response(&response, &spec.routes) {
            Some(target) => Ok(RoutingDecision {
                target_node: target,
                reasoning: format!("llm classified as: {response}"),
                mode: RoutingMode::Llm,
                path_taken: PathTaken::Slow,
            }),
            None => {
                warn!(response = %response, "llm response did not match any route");
                Ok(RoutingDecision {
                    target_node: config.fallback.clone(),
                    reasoning: format!("llm response '{response}' did not match any route"),
                    mode: RoutingMode::Llm,
                    path_taken: PathTaken::Fallback,
                })
            }
        }
    }

    /// Call the model with the per-call timeout and the caller's cancellation
    pub(crate) async fn call_model(
        &self,
        provider: &dyn LlmProvider,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, LlmError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(LlmError::Cancelled),
            result = tokio::time::timeout(
                self.llm_timeout,
                provider.complete(prompt, COMPLETION_BUDGET_TOKENS),
            ) => match result {
                Ok(response) => response,
                Err(_) => Err(LlmError::Timeout),
            },
        }
    }
}

/// Map a model response onto a route target
///
/// Precedence: exact lookup of the normalised response, case-insensitive
/// equality against original keys, then substring containment with the first
/// key in iteration order winning.
pub(crate) fn match_response(response: &str, routes: &BTreeMap<String, String>) -> Option<String> {
    let normalized = response.trim().to_lowercase();

    if let Some(target) = routes.get(&normalized) {
        return Some(target.clone());
    }

    for (key, target) in routes {
        if key.eq_ignore_ascii_case(&normalized) {
            return Some(target.clone());
        }
    }

    for (key, target) in routes {
        if normalized.contains(&key.to_lowercase()) {
            debug!(response = %response, matched_key = %key, "matched route by partial match");
            return Some(target.clone());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routes(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_exact_match_after_normalisation() {
        let routes = routes(&[("technical", "T"), ("billing", "B")]);
        assert_eq!(match_response("technical", &routes).as_deref(), Some("T"));
        assert_eq!(
            match_response("  Technical \n", &routes).as_deref(),
            Some("T")
        );
    }

    #[test]
    fn test_case_insensitive_equality_with_original_keys() {
        let routes = routes(&[("Technical", "T")]);
        assert_eq!(match_response("TECHNICAL", &routes).as_deref(), Some("T"));
    }

    #[test]
    fn test_containment_fallback() {
        let routes = routes(&[("billing", "B")]);
        assert_eq!(
            match_response("This looks like a billing question.", &routes).as_deref(),
            Some("B")
        );
    }

    #[test]
    fn test_containment_first_key_in_order_wins() {
        let routes = routes(&[("alpha", "A"), ("beta", "B")]);
        // Both keys are contained; BTreeMap order makes "alpha" first
        assert_eq!(
            match_response("beta and alpha both appear", &routes).as_deref(),
            Some("A")
        );
    }

    #[test]
    fn test_no_match() {
        let routes = routes(&[("yes", "Y"), ("no", "N")]);
        assert_eq!(match_response("maybe", &routes), None);
    }
}
