//! Prompt template engine backed by minijinja
//!
//! Templates use `{{ path }}` substitution with dotted access into the state
//! projection, `{% if %}` conditionals, `{% for %}` iteration and a fixed
//! helper set registered as filters. Undefined behavior is strict: a missing
//! key with no `default` filter is a render error, which the routing engine
//! treats as a routing failure.

use minijinja::value::Value as TemplateValue;
use minijinja::{Environment, Error, ErrorKind, UndefinedBehavior};
use serde_json::Value as JsonValue;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::RwLock;
use thiserror::Error as ThisError;

/// Template compilation and rendering errors
#[derive(Debug, Clone, ThisError)]
pub enum TemplateError {
    #[error("failed to compile template: {0}")]
    Compile(String),
    #[error("template rendering failed: {0}")]
    Render(String),
}

struct Inner {
    env: Environment<'static>,
    /// Source text to registered template name
    names: HashMap<String, String>,
}

/// Renders prompt templates with a compiled-template cache
pub struct TemplateEngine {
    inner: RwLock<Inner>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        register_helpers(&mut env);

        Self {
            inner: RwLock::new(Inner {
                env,
                names: HashMap::new(),
            }),
        }
    }

    /// Render a template with the given data
    pub fn render(&self, template: &str, data: &JsonValue) -> Result<String, TemplateError> {
        let context = TemplateValue::from_serialize(data);

        {
            let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
            if let Some(name) = inner.names.get(template) {
                return render_named(&inner.env, name, &context);
            }
        }

        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        // Another caller may have compiled it while we waited for the guard
        if let Some(name) = inner.names.get(template).cloned() {
            return render_named(&inner.env, &name, &context);
        }

        let name = template_name(template);
        inner
            .env
            .add_template_owned(name.clone(), template.to_string())
            .map_err(|e| TemplateError::Compile(e.to_string()))?;
        inner.names.insert(template.to_string(), name.clone());
        render_named(&inner.env, &name, &context)
    }

    /// Check that a template compiles, without rendering it
    pub fn validate(&self, template: &str) -> Result<(), TemplateError> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .env
            .template_from_str(template)
            .map(|_| ())
            .map_err(|e| TemplateError::Compile(e.to_string()))
    }

    /// Drop all cached templates
    pub fn clear_cache(&self) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.env.clear_templates();
        inner.names.clear();
    }

    /// Number of cached templates
    pub fn cache_size(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .names
            .len()
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn render_named(
    env: &Environment<'static>,
    name: &str,
    context: &TemplateValue,
) -> Result<String, TemplateError> {
    let template = env
        .get_template(name)
        .map_err(|e| TemplateError::Compile(e.to_string()))?;
    template
        .render(context)
        .map_err(|e| TemplateError::Render(e.to_string()))
}

fn template_name(source: &str) -> String {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    format!("tpl_{:016x}_{}", hasher.finish(), source.len())
}

fn register_helpers(env: &mut Environment<'static>) {
    env.add_filter("uppercase", |s: String| s.to_uppercase());
    env.add_filter("lowercase", |s: String| s.to_lowercase());
    env.add_filter("trim", |s: String| s.trim().to_string());
    env.add_filter("default", filter_default);
    env.add_filter("eq", |a: TemplateValue, b: TemplateValue| a == b);
    env.add_filter("ne", |a: TemplateValue, b: TemplateValue| a != b);
    env.add_filter("gt", |a: f64, b: f64| a > b);
    env.add_filter("lt", |a: f64, b: f64| a < b);
    env.add_filter("contains", filter_contains);
    env.add_filter("join", filter_join);
    env.add_filter("length", filter_length);
}

/// Fall back when the value is undefined, none or the empty string
fn filter_default(value: TemplateValue, fallback: Option<TemplateValue>) -> TemplateValue {
    let empty = value.is_undefined() || value.is_none() || value.as_str() == Some("");
    if empty {
        fallback.unwrap_or_else(|| TemplateValue::from(""))
    } else {
        value
    }
}

fn filter_contains(value: TemplateValue, needle: TemplateValue) -> Result<bool, Error> {
    if let Some(s) = value.as_str() {
        let needle = needle.as_str().ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidOperation,
                "contains on a string expects a string argument",
            )
        })?;
        return Ok(s.contains(needle));
    }

    if let Ok(mut iter) = value.try_iter() {
        return Ok(iter.any(|item| item == needle));
    }

    Err(Error::new(
        ErrorKind::InvalidOperation,
        "contains expects a string or a sequence",
    ))
}

fn filter_join(value: TemplateValue, separator: Option<String>) -> Result<String, Error> {
    let separator = separator.unwrap_or_default();
    let iter = value.try_iter().map_err(|_| {
        Error::new(ErrorKind::InvalidOperation, "join expects a sequence")
    })?;

    Ok(iter
        .map(|item| match item.as_str() {
            Some(s) => s.to_string(),
            None => item.to_string(),
        })
        .collect::<Vec<_>>()
        .join(&separator))
}

fn filter_length(value: TemplateValue) -> Result<usize, Error> {
    if let Some(s) = value.as_str() {
        return Ok(s.chars().count());
    }
    value.len().ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidOperation,
            "length expects a string, sequence or map",
        )
    })
}
