//! Template resolution for node configuration strings.
//!
//! Configuration fields may embed `{{ path.to.value }}` expressions that are
//! resolved against the execution context, and `{{ json path }}` to embed a
//! value as pretty-printed JSON. Rendering uses minijinja with chainable
//! undefined values, so a path that does not resolve renders as an empty
//! string instead of failing.

use crate::context::ExecutionContext;
use minijinja::value::ValueKind;
use minijinja::{AutoEscape, Environment, Output, State, UndefinedBehavior, Value};
use std::fmt;
use std::fmt::Write as _;

/// Error returned when a template cannot be parsed or rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateError {
    /// Description from the template engine.
    pub message: String,
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "template error: {}", self.message)
    }
}

impl std::error::Error for TemplateError {}

/// A path referenced by a template expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateReference {
    /// The full expression between the braces, trimmed.
    pub expression: String,
    /// The dotted path the expression reads.
    pub path: String,
}

impl TemplateReference {
    /// Returns the first segment of the path, which names a context key.
    #[must_use]
    pub fn root(&self) -> &str {
        self.path.split('.').next().unwrap_or_default()
    }
}

/// Renders configuration templates against an execution context.
#[derive(Debug)]
pub struct TemplateResolver {
    env: Environment<'static>,
}

impl TemplateResolver {
    /// Creates a resolver with the `json` filter registered.
    #[must_use]
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_formatter(format_value);
        env.add_filter("json", json_filter);
        Self { env }
    }

    /// Renders `source` against `context`.
    ///
    /// Strings without template markers are returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the template is syntactically invalid.
    pub fn render(&self, source: &str, context: &ExecutionContext) -> Result<String, TemplateError> {
        if !source.contains("{{") && !source.contains("{%") {
            return Ok(source.to_string());
        }

        let rewritten = rewrite_json_helper(source);
        let ctx = Value::from_serialize(context.as_map());
        self.env
            .render_str(&rewritten, ctx)
            .map_err(|e| TemplateError {
                message: e.to_string(),
            })
    }
}

impl Default for TemplateResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes booleans as `true`/`false` and none or undefined as nothing.
fn format_value(
    out: &mut Output<'_>,
    state: &State<'_, '_>,
    value: &Value,
) -> Result<(), minijinja::Error> {
    match value.kind() {
        ValueKind::Undefined | ValueKind::None => Ok(()),
        ValueKind::Bool => {
            let text = if value.is_true() { "true" } else { "false" };
            out.write_str(text).map_err(|e| {
                minijinja::Error::new(minijinja::ErrorKind::WriteFailure, e.to_string())
            })
        }
        _ => minijinja::escape_formatter(out, state, value),
    }
}

fn json_filter(value: Value) -> Result<String, minijinja::Error> {
    if value.is_undefined() {
        return Ok(String::new());
    }
    serde_json::to_string_pretty(&value).map_err(|e| {
        minijinja::Error::new(minijinja::ErrorKind::InvalidOperation, e.to_string())
    })
}

/// A piece of template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    /// Literal text, passed through.
    Text(&'a str),
    /// The inside of `{{ .. }}` or `{{{ .. }}}`.
    Expression(&'a str),
}

/// Splits `source` into text and expressions.
///
/// An expression opened with `{{{` closes at the next `}}}`; one opened with
/// `{{` closes at the next `}}`. Braces after the closing marker stay text,
/// so `{"a": {{ x }}}` keeps its final `}`. An unterminated expression is
/// returned as text and left to the engine to reject.
fn segments(source: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut rest = source;

    while let Some(start) = rest.find("{{") {
        if start > 0 {
            out.push(Segment::Text(&rest[..start]));
        }
        let (open, close) = if rest[start..].starts_with("{{{") {
            (3, "}}}")
        } else {
            (2, "}}")
        };
        let inner = &rest[start + open..];
        let Some(end) = inner.find(close) else {
            out.push(Segment::Text(&rest[start..]));
            return out;
        };
        out.push(Segment::Expression(&inner[..end]));
        rest = &inner[end + close.len()..];
    }

    if !rest.is_empty() {
        out.push(Segment::Text(rest));
    }
    out
}

/// Rewrites `{{ json path }}` into `{{ path | json }}` and collapses
/// triple-stash `{{{ x }}}` into `{{ x }}`.
fn rewrite_json_helper(source: &str) -> String {
    let mut out = String::with_capacity(source.len());

    for segment in segments(source) {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Expression(expression) => match json_helper_path(expression) {
                Some(path) => {
                    out.push_str("{{ ");
                    out.push_str(path);
                    out.push_str(" | json }}");
                }
                None => {
                    out.push_str("{{ ");
                    out.push_str(expression.trim());
                    out.push_str(" }}");
                }
            },
        }
    }

    out
}

fn json_helper_path(expression: &str) -> Option<&str> {
    let tail = expression.trim().strip_prefix("json")?;
    if !tail.starts_with(char::is_whitespace) {
        return None;
    }
    Some(tail.trim()).filter(|path| !path.is_empty())
}

/// Lists the context paths referenced by the expressions in `source`.
///
/// Expressions that do not start with a plain dotted path (literals,
/// function calls) are skipped.
#[must_use]
pub fn references(source: &str) -> Vec<TemplateReference> {
    segments(source)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Expression(expression) => reference(expression.trim()),
            Segment::Text(_) => None,
        })
        .collect()
}

fn reference(expression: &str) -> Option<TemplateReference> {
    let candidate = json_helper_path(expression).unwrap_or(expression);
    let path: String = candidate
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '.')
        .collect();
    let path = path.trim_end_matches('.');
    path.chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        .then(|| TemplateReference {
            expression: expression.to_string(),
            path: path.to_string(),
        })
}
