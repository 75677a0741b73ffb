//! LLM provider abstraction layer
//!
//! Provider-agnostic interface for the model calls made by the semantic
//! routing strategies, with Anthropic and OpenAI backends.

pub mod provider;
pub mod providers;

pub use provider::*;
pub use providers::*;
