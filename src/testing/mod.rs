//! Testing utilities and mock implementations
//!
//! Mock stream bus, state store and LLM provider for exercising the worker
//! without external dependencies.

pub mod mocks;

pub use mocks::*;
