//! CEL expression evaluator with a compiled-program cache
//!
//! Rule conditions are CEL: comparisons, boolean connectives, arithmetic,
//! string predicates (`contains`, `startsWith`, `endsWith`, `matches`), list
//! membership and `size()`, map access via dot and subscript, null checks
//! and type predicates. CEL has no loops and no user-defined functions, so
//! evaluation time is bounded by expression size.

use cel_interpreter::objects::Key;
use cel_interpreter::{Context, Program, Value};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Expression evaluation errors
#[derive(Debug, Clone, Error)]
pub enum EvalError {
    #[error("failed to compile expression: {0}")]
    Compile(String),
    #[error("evaluation failed: {0}")]
    Eval(String),
}

/// Evaluates CEL expressions against a state projection
///
/// Compiled programs are cached keyed by the exact expression text and live
/// for the lifetime of the process.
pub struct ExpressionEvaluator {
    cache: RwLock<HashMap<String, Arc<Program>>>,
}

impl ExpressionEvaluator {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Evaluate an expression with the given variables
    ///
    /// `variables` must be a JSON object; each top-level entry becomes a CEL
    /// binding. The routing engine supplies a single `state` binding.
    pub fn evaluate(
        &self,
        expression: &str,
        variables: &JsonValue,
    ) -> Result<JsonValue, EvalError> {
        let program = self.program(expression)?;

        let mut context = Context::default();
        if let JsonValue::Object(fields) = variables {
            for (name, value) in fields {
                context.add_variable_from_value(name.clone(), json_to_cel(value));
            }
        }

        let result = program
            .execute(&context)
            .map_err(|e| EvalError::Eval(e.to_string()))?;

        Ok(cel_to_json(&result))
    }

    /// Check that an expression compiles, without executing it
    pub fn validate(&self, expression: &str) -> Result<(), EvalError> {
        Program::compile(expression)
            .map(|_| ())
            .map_err(|e| EvalError::Compile(e.to_string()))
    }

    /// Drop all cached programs
    pub fn clear_cache(&self) {
        self.cache
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Number of cached programs
    pub fn cache_size(&self) -> usize {
        self.cache.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Get a compiled program from the cache, compiling on miss
    fn program(&self, expression: &str) -> Result<Arc<Program>, EvalError> {
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(program) = cache.get(expression) {
                return Ok(program.clone());
            }
        }

        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        // Another caller may have compiled it while we waited for the guard
        if let Some(program) = cache.get(expression) {
            return Ok(program.clone());
        }

        let program =
            Program::compile(expression).map_err(|e| EvalError::Compile(e.to_string()))?;
        let program = Arc::new(program);
        cache.insert(expression.to_string(), program.clone());
        Ok(program)
    }
}

impl Default for ExpressionEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a JSON value into a CEL value
fn json_to_cel(value: &JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if let Some(u) = n.as_u64() {
                Value::UInt(u)
            } else {
                Value::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        JsonValue::String(s) => Value::String(Arc::new(s.clone())),
        JsonValue::Array(items) => Value::List(Arc::new(items.iter().map(json_to_cel).collect())),
        JsonValue::Object(fields) => {
            let map: HashMap<String, Value> = fields
                .iter()
                .map(|(k, v)| (k.clone(), json_to_cel(v)))
                .collect();
            Value::Map(map.into())
        }
    }
}

/// Convert a CEL result back into JSON
fn cel_to_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Int(i) => JsonValue::from(*i),
        Value::UInt(u) => JsonValue::from(*u),
        Value::Float(f) => {
            serde_json::Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number)
        }
        Value::String(s) => JsonValue::String(s.as_ref().clone()),
        Value::Bytes(b) => JsonValue::String(String::from_utf8_lossy(b).into_owned()),
        Value::List(items) => JsonValue::Array(items.iter().map(cel_to_json).collect()),
        Value::Map(m) => JsonValue::Object(
            m.map
                .iter()
                .map(|(k, v)| (key_to_string(k), cel_to_json(v)))
                .collect(),
        ),
        Value::Timestamp(t) => JsonValue::String(t.to_rfc3339()),
        Value::Duration(d) => JsonValue::String(format!("{}ms", d.num_milliseconds())),
        // Functions and anything a rule has no business returning
        _ => JsonValue::Null,
    }
}

fn key_to_string(key: &Key) -> String {
    match key {
        Key::String(s) => s.as_ref().clone(),
        Key::Int(i) => i.to_string(),
        Key::Uint(u) => u.to_string(),
        Key::Bool(b) => b.to_string(),
    }
}
