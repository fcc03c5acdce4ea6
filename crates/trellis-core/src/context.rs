//! Block context shared between nested renders.
//!
//! A block is a named accumulator. Nested templates push fragments into it
//! (asset references, titles, flags) and an ancestor wrapper reads them back
//! as one assembled string or structure.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// What a block currently holds.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockValue {
    /// Appended scalar fragments.
    List(Vec<Value>),
    /// A last-write-wins object or array.
    Single(Value),
}

impl BlockValue {
    /// The value a template sees when it reads the block.
    pub fn resolve(&self) -> Value {
        match self {
            BlockValue::List(items) if items.iter().all(is_scalar) => {
                Value::String(items.iter().map(scalar_text).collect())
            }
            BlockValue::List(items) => Value::Array(items.clone()),
            BlockValue::Single(value) => value.clone(),
        }
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Object(_) | Value::Array(_))
}

fn is_structured(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_) | Value::Bool(_))
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Handle to one render scope's blocks.
///
/// Cloning the handle shares the same storage.
#[derive(Debug, Clone, Default)]
pub struct BlockContext {
    blocks: Arc<Mutex<HashMap<String, BlockValue>>>,
}

impl BlockContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, BlockValue>> {
        // A poisoned map still holds consistent data: every write is a single insert.
        self.blocks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The three-way block accessor.
    ///
    /// * `value == None` reads the block.
    /// * `value == Some(_)` writes: objects, arrays and booleans replace, as
    ///   does the first write; further scalars are appended. Only objects and
    ///   arrays are stored as they are, everything else starts a new list.
    /// * `force` replaces whatever is stored.
    ///
    /// Writes return `None`.
    pub fn block(&self, name: &str, value: Option<Value>, force: bool) -> Option<Value> {
        let Some(value) = value else {
            return self.get(name);
        };

        let mut blocks = self.lock();
        let replace = force
            || is_structured(&value)
            || !matches!(blocks.get(name), Some(BlockValue::List(_)));

        if replace {
            let stored = if is_scalar(&value) {
                BlockValue::List(vec![value])
            } else {
                BlockValue::Single(value)
            };
            blocks.insert(name.to_string(), stored);
        } else if let Some(BlockValue::List(items)) = blocks.get_mut(name) {
            items.push(value);
        }
        None
    }

    /// Read a block.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.lock().get(name).map(BlockValue::resolve)
    }

    /// Append a fragment (or replace, following the accessor rules).
    pub fn append(&self, name: &str, value: impl Into<Value>) {
        self.block(name, Some(value.into()), false);
    }

    /// Force-replace a block.
    pub fn replace(&self, name: &str, value: impl Into<Value>) {
        self.block(name, Some(value.into()), true);
    }

    /// Whether a block has been set.
    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    /// Raw stored contents.
    pub fn snapshot(&self) -> HashMap<String, BlockValue> {
        self.lock().clone()
    }

    /// A new scope holding a copy of this one's blocks.
    pub fn detached(&self) -> BlockContext {
        BlockContext {
            blocks: Arc::new(Mutex::new(self.snapshot())),
        }
    }

    /// Whether both handles point at the same storage.
    pub fn same_scope(&self, other: &BlockContext) -> bool {
        Arc::ptr_eq(&self.blocks, &other.blocks)
    }

    /// Merge another scope into this one.
    ///
    /// Colliding lists are concatenated; anything else is overwritten by
    /// `other`.
    pub fn merge_from(&self, other: &BlockContext) {
        if self.same_scope(other) {
            return;
        }
        let incoming = other.snapshot();
        let mut blocks = self.lock();

        for (name, value) in incoming {
            match (blocks.get_mut(&name), value) {
                (Some(BlockValue::List(existing)), BlockValue::List(items)) => {
                    existing.extend(items);
                }
                (_, value) => {
                    blocks.insert(name, value);
                }
            }
        }
    }
}
