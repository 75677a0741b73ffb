//! Expression and template evaluation over graph state
//!
//! Both evaluators keep process-lifetime caches of compiled artifacts keyed
//! by source text. Lookups take a reader guard; on miss a writer guard is
//! taken and the lookup repeated before compiling, so concurrent callers
//! never compile the same source twice.

pub mod expr;
pub mod template;

pub use expr::{EvalError, ExpressionEvaluator};
pub use template::{TemplateEngine, TemplateError};
