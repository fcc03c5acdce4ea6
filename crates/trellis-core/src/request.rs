//! Render requests and the variable bag handed to hooks and templates.

use crate::BlockContext;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Key under which preprocessing hooks add alternate template names.
pub const TEMPLATE_SUGGESTIONS: &str = "template_suggestions";

/// Variable bag for one render.
///
/// Holds an owned copy of the caller's data plus the block accessor bound to
/// the request's [`BlockContext`]. Serializes as the plain data object.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    values: Map<String, Value>,
    block: BlockContext,
}

impl Variables {
    /// Create an empty bag with a fresh block context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy `input` into a new bag bound to `block`.
    ///
    /// Anything that is not a JSON object becomes an empty bag. A nested
    /// `variables` object is folded into the top level; top-level keys win.
    pub fn from_value(input: &Value, block: BlockContext) -> Self {
        let mut values = match input {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };

        if let Some(Value::Object(nested)) = values.get("variables").cloned() {
            for (key, value) in nested {
                values.entry(key).or_insert(value);
            }
        }

        Self { values, block }
    }

    /// Build from an already-owned map.
    pub fn from_map(values: Map<String, Value>, block: BlockContext) -> Self {
        Self { values, block }
    }

    /// The bound block accessor.
    pub fn block(&self) -> &BlockContext {
        &self.block
    }

    /// Rebind to another block context.
    pub fn bind(&mut self, block: BlockContext) {
        self.block = block;
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// The underlying data.
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.values
    }

    /// Fill in keys from `defaults` that the bag does not define yet.
    pub fn fill_defaults(&mut self, defaults: &Map<String, Value>) {
        for (key, value) in defaults {
            if !self.values.contains_key(key) {
                self.values.insert(key.clone(), value.clone());
            }
        }
    }

    /// Template suggestions added by hooks, in insertion order.
    pub fn suggestions(&self) -> Vec<String> {
        match self.values.get(TEMPLATE_SUGGESTIONS) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(Value::String(single)) => vec![single.clone()],
            _ => Vec::new(),
        }
    }

    /// Append a template suggestion.
    pub fn push_suggestion(&mut self, name: impl Into<String>) {
        let name = Value::String(name.into());
        match self.values.get_mut(TEMPLATE_SUGGESTIONS) {
            Some(Value::Array(items)) => items.push(name),
            _ => {
                self.values
                    .insert(TEMPLATE_SUGGESTIONS.to_string(), Value::Array(vec![name]));
            }
        }
    }

    /// Consume into a JSON object.
    pub fn into_value(self) -> Value {
        Value::Object(self.values)
    }
}

impl Serialize for Variables {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.values.serialize(serializer)
    }
}

/// The envelope threaded through preprocessing, resolution and rendering.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// Primary template name.
    pub template: String,

    /// Data for the template.
    pub variables: Variables,

    /// Block scope of this render.
    pub context: BlockContext,
}

impl RenderRequest {
    /// Create a request; the variables are bound to `context`.
    pub fn new(template: impl Into<String>, input: &Value, context: BlockContext) -> Self {
        Self {
            template: template.into(),
            variables: Variables::from_value(input, context.clone()),
            context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_input_is_copied() {
        let input = json!({ "name": "Kalle" });
        let mut vars = Variables::from_value(&input, BlockContext::new());
        vars.insert("name", "Musse");
        assert_eq!(input["name"], "Kalle");
        assert_eq!(vars.get_str("name"), Some("Musse"));
    }

    #[test]
    fn test_non_object_becomes_empty() {
        let vars = Variables::from_value(&json!("nope"), BlockContext::new());
        assert!(vars.values().is_empty());
    }

    #[test]
    fn test_nested_variables_are_folded() {
        let input = json!({ "a": 1, "variables": { "a": 2, "b": 3 } });
        let vars = Variables::from_value(&input, BlockContext::new());
        assert_eq!(vars.get("a"), Some(&json!(1)));
        assert_eq!(vars.get("b"), Some(&json!(3)));
    }

    #[test]
    fn test_suggestions() {
        let mut vars = Variables::new();
        assert!(vars.suggestions().is_empty());
        vars.push_suggestion("bar_foo");
        vars.push_suggestion("bar_foo_2");
        assert_eq!(vars.suggestions(), vec!["bar_foo", "bar_foo_2"]);
        assert_eq!(serde_json::to_value(&vars).unwrap()[TEMPLATE_SUGGESTIONS][1], "bar_foo_2");
    }

    #[test]
    fn test_request_binds_context() {
        let ctx = BlockContext::new();
        let request = RenderRequest::new("page", &json!({}), ctx.clone());
        request.variables.block().append("css", "a.css");
        assert_eq!(ctx.get("css"), Some(json!("a.css")));
    }
}
