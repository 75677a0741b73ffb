//! LLM provider trait definition
//!
//! The routing engine needs exactly one capability from a model: turn a
//! rendered prompt into a short classification text. Providers implement
//! that single method plus a health probe, which keeps them trivially
//! mockable.

use async_trait::async_trait;
use thiserror::Error;

/// LLM provider trait for dependency injection and testing
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g. "anthropic", "openai")
    fn name(&self) -> &str;

    /// Complete a prompt within the given token budget and return the text
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError>;

    /// Check that the provider is configured and reachable
    async fn health_check(&self) -> Result<(), LlmError>;
}

/// LLM provider errors
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("provider not configured: {0}")]
    NotConfigured(String),
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("network error: {0}")]
    NetworkError(String),
    #[error("api error: {0}")]
    ApiError(String),
    #[error("request timed out")]
    Timeout,
    #[error("request cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_is_non_empty() {
        let errors = vec![
            LlmError::NotConfigured("test".to_string()),
            LlmError::AuthenticationFailed("test".to_string()),
            LlmError::RequestFailed("test".to_string()),
            LlmError::InvalidResponse("test".to_string()),
            LlmError::NetworkError("test".to_string()),
            LlmError::ApiError("test".to_string()),
            LlmError::Timeout,
            LlmError::Cancelled,
        ];

        for error in errors {
            assert!(!error.to_string().is_empty());
        }
    }
}
