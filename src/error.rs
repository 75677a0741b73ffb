//! Worker error taxonomy
//!
//! Per-module errors (`StreamError`, `StoreError`, `EvalError`,
//! `TemplateError`, `LlmError`, `ConfigError`) converge here. Hard per-item
//! failures map onto the wire `ErrorRecord`; everything else is either
//! recovered locally (skipped rules, model fallbacks) or retried by the
//! consumer loop (broker errors).

use crate::eval::{EvalError, TemplateError};
use crate::llm::LlmError;
use crate::protocol::ErrorRecord;
use crate::store::StoreError;
use crate::stream::StreamError;
use chrono::Utc;
use thiserror::Error;

/// Main error type for routing worker operations
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Validation failure on a config, work item or state payload
    #[error("invalid input: {0}")]
    Invalid(String),

    /// State missing or unreadable for the referenced execution id
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Expression evaluation failure; recovered per-rule inside the engine
    #[error("expression evaluation failed: {0}")]
    Eval(#[from] EvalError),

    /// Template rendering failure; hard in llm mode, recovered in hybrid
    #[error(transparent)]
    Render(#[from] TemplateError),

    /// Model client failure; normally recovered by a fallback decision
    #[error("model client error: {0}")]
    Model(#[from] LlmError),

    /// Transient broker failure; the consumer loop retries with backoff
    #[error(transparent)]
    Broker(#[from] StreamError),
}

impl WorkerError {
    /// Create a validation error
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid(message.into())
    }

    /// Build the wire error record published for a failed work item
    pub fn to_error_record(&self, execution_id: &str, node_id: &str) -> ErrorRecord {
        ErrorRecord {
            execution_id: execution_id.to_string(),
            node_id: node_id.to_string(),
            error: self.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Result type for worker operations
pub type WorkerResult<T> = Result<T, WorkerError>;
