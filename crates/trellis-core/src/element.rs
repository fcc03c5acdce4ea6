//! Render-tree elements and element types.
//!
//! An [`Element`] is either a leaf with a `template` or a branch with
//! `children`. The recognised keys are typed fields; anything else a caller
//! puts on an element lands in [`Element::fields`] and reaches the template
//! as ordinary data.

use crate::hooks::{PostRender, PreRender};
use crate::{BlockContext, Result};
use serde_json::{Map, Value};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

pub const KEY_TYPE: &str = "type";
pub const KEY_TEMPLATE: &str = "template";
pub const KEY_CHILDREN: &str = "children";
pub const KEY_TEMPLATE_WRAPPERS: &str = "template_wrappers";
pub const KEY_PREFIX: &str = "prefix";
pub const KEY_SUFFIX: &str = "suffix";
pub const KEY_RENDER_CONTEXT: &str = "render_context";

const RESERVED: &[&str] = &[
    KEY_TYPE,
    KEY_TEMPLATE,
    KEY_CHILDREN,
    KEY_TEMPLATE_WRAPPERS,
    KEY_PREFIX,
    KEY_SUFFIX,
    KEY_RENDER_CONTEXT,
];

/// One node of a render tree.
///
/// Cloning an element shares its `render_context`; use
/// [`Element::detached`] for a copy with scopes of its own.
#[derive(Clone, Default)]
pub struct Element {
    pub element_type: Option<String>,
    pub template: Option<String>,
    pub children: Vec<Element>,
    pub template_wrappers: Vec<String>,
    pub pre_renders: Vec<Arc<dyn PreRender>>,
    pub post_renders: Vec<Arc<dyn PostRender>>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    /// Block scope owned by this node.
    pub render_context: BlockContext,
    /// Type-specific data.
    pub fields: Map<String, Value>,
}

impl Element {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an element tree from JSON.
    ///
    /// `children` and `template_wrappers` accept a single value or an array.
    /// A non-object value yields an empty element.
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut map) = value else {
            return Self::default();
        };

        let render_context = BlockContext::new();
        if let Some(Value::Object(blocks)) = map.remove(KEY_RENDER_CONTEXT) {
            for (name, value) in blocks {
                render_context.append(&name, value);
            }
        }

        Self {
            element_type: map.remove(KEY_TYPE).and_then(text),
            template: map.remove(KEY_TEMPLATE).and_then(text),
            children: map.remove(KEY_CHILDREN).map(element_list).unwrap_or_default(),
            template_wrappers: map
                .remove(KEY_TEMPLATE_WRAPPERS)
                .map(string_list)
                .unwrap_or_default(),
            pre_renders: Vec::new(),
            post_renders: Vec::new(),
            prefix: map.remove(KEY_PREFIX).and_then(text),
            suffix: map.remove(KEY_SUFFIX).and_then(text),
            render_context,
            fields: map,
        }
    }

    /// Deep copy in which this node and every descendant get their own
    /// `render_context`, seeded with the blocks the original holds.
    pub fn detached(&self) -> Self {
        Self {
            children: self.children.iter().map(Element::detached).collect(),
            render_context: self.render_context.detached(),
            ..self.clone()
        }
    }

    /// JSON view of the element, as handed to templates and post-renders.
    pub fn to_value(&self) -> Value {
        let mut map = self.fields.clone();
        if let Some(element_type) = &self.element_type {
            map.insert(KEY_TYPE.into(), Value::String(element_type.clone()));
        }
        if let Some(template) = &self.template {
            map.insert(KEY_TEMPLATE.into(), Value::String(template.clone()));
        }
        if let Some(prefix) = &self.prefix {
            map.insert(KEY_PREFIX.into(), Value::String(prefix.clone()));
        }
        if let Some(suffix) = &self.suffix {
            map.insert(KEY_SUFFIX.into(), Value::String(suffix.clone()));
        }
        if !self.template_wrappers.is_empty() {
            map.insert(
                KEY_TEMPLATE_WRAPPERS.into(),
                self.template_wrappers.iter().cloned().map(Value::String).collect(),
            );
        }
        if !self.children.is_empty() {
            map.insert(
                KEY_CHILDREN.into(),
                self.children.iter().map(Element::to_value).collect(),
            );
        }
        Value::Object(map)
    }

    pub fn with_type(mut self, element_type: impl Into<String>) -> Self {
        self.element_type = Some(element_type.into());
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn with_wrapper(mut self, wrapper: impl Into<String>) -> Self {
        self.template_wrappers.push(wrapper.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_pre_render<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Element) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Element>> + Send + 'static,
    {
        self.pre_renders.push(Arc::new(f));
        self
    }

    pub fn with_post_render<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        self.post_renders.push(Arc::new(f));
        self
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("element_type", &self.element_type)
            .field("template", &self.template)
            .field("children", &self.children)
            .field("template_wrappers", &self.template_wrappers)
            .field("pre_renders", &self.pre_renders.len())
            .field("post_renders", &self.post_renders.len())
            .field("prefix", &self.prefix)
            .field("suffix", &self.suffix)
            .field("fields", &self.fields)
            .finish()
    }
}

/// Overrides merged onto every element of a given type.
///
/// Only the parts that are set override the element; `fields` are merged key
/// by key with the type's values winning.
#[derive(Clone, Default)]
pub struct ElementType {
    pub template: Option<String>,
    pub children: Option<Vec<Element>>,
    pub template_wrappers: Option<Vec<String>>,
    pub pre_renders: Option<Vec<Arc<dyn PreRender>>>,
    pub post_renders: Option<Vec<Arc<dyn PostRender>>>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    pub fields: Map<String, Value>,
}

impl ElementType {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a type declaration from JSON.
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut map) = value else {
            return Self::default();
        };
        map.remove(KEY_TYPE);
        map.remove(KEY_RENDER_CONTEXT);

        Self {
            template: map.remove(KEY_TEMPLATE).and_then(text),
            children: map.remove(KEY_CHILDREN).map(element_list),
            template_wrappers: map.remove(KEY_TEMPLATE_WRAPPERS).map(string_list),
            pre_renders: None,
            post_renders: None,
            prefix: map.remove(KEY_PREFIX).and_then(text),
            suffix: map.remove(KEY_SUFFIX).and_then(text),
            fields: map,
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn with_wrapper(mut self, wrapper: impl Into<String>) -> Self {
        self.template_wrappers
            .get_or_insert_with(Vec::new)
            .push(wrapper.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_pre_render<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Element) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Element>> + Send + 'static,
    {
        self.pre_renders.get_or_insert_with(Vec::new).push(Arc::new(f));
        self
    }

    pub fn with_post_render<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        self.post_renders.get_or_insert_with(Vec::new).push(Arc::new(f));
        self
    }

    /// Merge this type onto `element`.
    ///
    /// The type's children are copied with fresh block scopes, so renders never
    /// write into the registered declaration.
    pub fn apply_to(&self, element: &mut Element) {
        if let Some(template) = &self.template {
            element.template = Some(template.clone());
        }
        if let Some(children) = &self.children {
            element.children = children.iter().map(Element::detached).collect();
        }
        if let Some(wrappers) = &self.template_wrappers {
            element.template_wrappers = wrappers.clone();
        }
        if let Some(pre_renders) = &self.pre_renders {
            element.pre_renders = pre_renders.clone();
        }
        if let Some(post_renders) = &self.post_renders {
            element.post_renders = post_renders.clone();
        }
        if let Some(prefix) = &self.prefix {
            element.prefix = Some(prefix.clone());
        }
        if let Some(suffix) = &self.suffix {
            element.suffix = Some(suffix.clone());
        }
        for (key, value) in &self.fields {
            if !RESERVED.contains(&key.as_str()) {
                element.fields.insert(key.clone(), value.clone());
            }
        }
    }
}

impl fmt::Debug for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementType")
            .field("template", &self.template)
            .field("template_wrappers", &self.template_wrappers)
            .field("prefix", &self.prefix)
            .field("suffix", &self.suffix)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

fn text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Null => None,
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn string_list(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.into_iter().filter_map(text).collect(),
        other => text(other).into_iter().collect(),
    }
}

fn element_list(value: Value) -> Vec<Element> {
    match value {
        Value::Array(items) => items.into_iter().map(Element::from_value).collect(),
        Value::Null => Vec::new(),
        single => vec![Element::from_value(single)],
    }
}
