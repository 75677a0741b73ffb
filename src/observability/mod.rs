//! Structured logging setup
//!
//! The worker logs JSON by default; metrics and tracing exporters are out of
//! scope, structured logging is the only built-in observability surface.

pub mod logging;

pub use logging::{init_default_logging, init_logging, LogFormat};
