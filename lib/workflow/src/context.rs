//! The execution context threaded through a run.
//!
//! The context is a JSON object seeded from the trigger's initial data.
//! Executors receive it by reference and return a new context; the only way
//! to add data is [`ExecutionContext::with_output`], which produces a copy.
//! Keys are never removed during a run. Writing a key that already exists is
//! allowed (last write wins) and logged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Accumulated data of a workflow run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionContext(Map<String, JsonValue>);

impl ExecutionContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored under a top-level key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    /// Resolves a dotted path such as `resp.httpResponse.body.items.0`.
    ///
    /// Numeric segments index into arrays.
    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<&JsonValue> {
        let mut segments = path.split('.').map(str::trim);
        let first = segments.next()?;
        let mut current = self.0.get(first)?;
        for segment in segments {
            current = match current {
                JsonValue::Object(map) => map.get(segment)?,
                JsonValue::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Returns true if the top-level key is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Returns the top-level keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Returns the number of top-level keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the context holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a new context with `key` set to `value`.
    ///
    /// `self` is left untouched.
    #[must_use]
    pub fn with_output(&self, key: &str, value: JsonValue) -> Self {
        if self.0.contains_key(key) {
            tracing::warn!(key, "node output overwrites an existing context key");
        }
        let mut next = self.0.clone();
        next.insert(key.to_string(), value);
        Self(next)
    }

    /// Returns the underlying JSON object.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, JsonValue> {
        &self.0
    }

    /// Converts the context into a JSON value.
    #[must_use]
    pub fn into_json(self) -> JsonValue {
        JsonValue::Object(self.0)
    }
}

impl From<Map<String, JsonValue>> for ExecutionContext {
    fn from(map: Map<String, JsonValue>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context(value: JsonValue) -> ExecutionContext {
        match value {
            JsonValue::Object(map) => map.into(),
            _ => panic!("context must be an object"),
        }
    }

    #[test]
    fn with_output_leaves_original_untouched() {
        let original = context(json!({ "a": 1 }));
        let next = original.with_output("b", json!(2));

        assert_eq!(original, context(json!({ "a": 1 })));
        assert_eq!(next, context(json!({ "a": 1, "b": 2 })));
    }

    #[test]
    fn linear_chain_accumulates_keys() {
        let ctx = ExecutionContext::new()
            .with_output("a", json!("A"))
            .with_output("b", json!("B"))
            .with_output("c", json!("C"));

        assert_eq!(ctx.len(), 3);
        assert_eq!(ctx.get("a"), Some(&json!("A")));
        assert_eq!(ctx.get("b"), Some(&json!("B")));
    }

    #[test]
    fn later_write_wins() {
        let ctx = ExecutionContext::new()
            .with_output("resp", json!(1))
            .with_output("resp", json!(2));
        assert_eq!(ctx.get("resp"), Some(&json!(2)));
    }

    #[test]
    fn lookup_walks_objects_and_arrays() {
        let ctx = context(json!({
            "resp": { "httpResponse": { "body": { "items": [ { "name": "first" } ] } } }
        }));

        assert_eq!(
            ctx.lookup("resp.httpResponse.body.items.0.name"),
            Some(&json!("first"))
        );
        assert_eq!(ctx.lookup("resp.httpResponse.missing"), None);
        assert_eq!(ctx.lookup("resp.httpResponse.body.items.7"), None);
        assert_eq!(ctx.lookup("nothing"), None);
    }

    #[test]
    fn serializes_as_plain_object() {
        let ctx = ExecutionContext::new().with_output("k", json!(true));
        assert_eq!(serde_json::to_value(&ctx).expect("serialize"), json!({ "k": true }));
        assert_eq!(ctx.into_json(), json!({ "k": true }));
    }
}
