//! State codec: lossy-but-contracted serialize/reconstruct of a tree to and
//! from a transfer-safe JSON mapping, plus the registries that stand in for
//! values that cannot travel (handler functions, node constructors).
//!
//! The round-trip contract: `dump(load(dump(x)))` is field-for-field equal to
//! `dump(x)` for every field whose value was transferable on the first pass.
//! Sentinel-marked fields are not recoverable from a dump alone; the
//! constructing template must re-supply them. That trade is deliberate:
//! statelessness over full fidelity.

use crate::node::{Node, value_to_string};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct CodecError {
    pub message: String,
}

impl CodecError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CodecError {}

/// Rebuilds a node from the non-children fields of a dump.
pub type NodeConstructor = fn(Map<String, Value>) -> Node;

/// An event handler: invoked with the target's address, the remaining event
/// payload, and the working tree's root. Returning `Some` replaces the root
/// (e.g. after a structural edit); `None` keeps it.
pub type EventHandler = fn(&str, &Map<String, Value>, &mut Node) -> Option<Node>;

/// Append-only registry mapping stable string keys to event handlers.
///
/// Populated at startup, consulted by dispatch. This is the explicit
/// replacement for resolving handler references through dynamic lookup:
/// a node carries only the key, never the function.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, EventHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a handler, returning the previous one if any.
    pub fn register(&mut self, key: impl Into<String>, handler: EventHandler) -> Option<EventHandler> {
        self.handlers.insert(key.into(), handler)
    }

    pub fn get(&self, key: &str) -> Option<EventHandler> {
        self.handlers.get(key).copied()
    }
}

/// Node-kind registry: resolves the class-identity marker recorded in a dump
/// (`classRef`) back to a concrete constructor.
pub struct Codec {
    kinds: HashMap<String, NodeConstructor>,
}

impl Codec {
    /// A codec with the plain node constructor pre-registered.
    pub fn new() -> Self {
        let mut kinds: HashMap<String, NodeConstructor> = HashMap::new();
        kinds.insert(crate::node::DEFAULT_KIND.to_string(), Node::from_fields);
        Self { kinds }
    }

    pub fn register_kind(
        &mut self,
        key: impl Into<String>,
        constructor: NodeConstructor,
    ) -> Option<NodeConstructor> {
        self.kinds.insert(key.into(), constructor)
    }

    /// Reconstruct a tree from a dump: pop the children, resolve `classRef`
    /// to a constructor, build the node from the remaining fields, then
    /// recursively reconstruct and attach the children.
    pub fn load(&self, dump: &Value) -> Result<Node, CodecError> {
        let Some(fields) = dump.as_object() else {
            return Err(CodecError::new("state dump must be an object"));
        };
        let mut fields = fields.clone();
        let children = fields.remove("children");

        let kind = fields
            .get("classRef")
            .and_then(Value::as_str)
            .ok_or_else(|| CodecError::new("state dump is missing classRef"))?;
        let constructor = *self
            .kinds
            .get(kind)
            .ok_or_else(|| CodecError::new(format!("unknown node kind {kind:?}")))?;

        let mut node = constructor(fields);
        if let Some(Value::Array(items)) = children {
            let mut rebuilt = Vec::with_capacity(items.len());
            for item in &items {
                rebuilt.push(self.load(item)?);
            }
            node.children = rebuilt;
        }
        Ok(node)
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new()
    }
}

impl Node {
    /// Serialize this tree into a transfer-safe mapping.
    ///
    /// Scalar fields copy as-is. Free-form fields are cleaned: booleans are
    /// unconditionally dropped (an inherited limitation, kept rather than
    /// silently replaced by an encoding), nested mappings drop entries that
    /// fail to reduce, sequences containing any non-reducible entry collapse
    /// to empty, and anything else becomes the not-transferable sentinel so
    /// the template re-supplies it on reconstruction. Children come last.
    pub fn dump(&self) -> Value {
        let mut out = Map::new();
        out.insert("classRef".to_string(), Value::String(self.kind.clone()));
        out.insert("tag".to_string(), Value::String(self.tag.clone()));
        out.insert(
            "className".to_string(),
            Value::String(self.class_name.clone()),
        );
        out.insert("text".to_string(), Value::String(self.text.clone()));
        out.insert("style".to_string(), Value::String(self.style.clone()));
        if !self.hover.is_empty() {
            out.insert("hover".to_string(), Value::String(self.hover.clone()));
        }
        out.insert("elemId".to_string(), Value::String(self.address.clone()));

        let mut attributes = Map::new();
        for (key, value) in &self.attributes {
            if let Some(clean) = clean_value(value) {
                attributes.insert(key.clone(), clean);
            }
        }
        out.insert("attributes".to_string(), Value::Object(attributes));

        for (field, key) in [
            ("onClick", &self.on_click),
            ("onSubmit", &self.on_submit),
            ("onConnect", &self.on_connect),
        ] {
            if let Some(key) = key {
                out.insert(field.to_string(), Value::String(key.clone()));
            }
        }

        for (key, value) in &self.extra {
            match clean_value(value) {
                Some(clean) => {
                    out.insert(key.clone(), clean);
                }
                None if value.is_boolean() => {}
                None => {
                    out.insert(
                        key.clone(),
                        Value::String(crate::node::NOT_TRANSFERABLE.to_string()),
                    );
                }
            }
        }

        out.insert(
            "children".to_string(),
            Value::Array(self.children.iter().map(Node::dump).collect()),
        );
        Value::Object(out)
    }
}

fn clean_value(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(_) | Value::Null => None,
        Value::String(_) | Value::Number(_) => Some(value.clone()),
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, entry) in map {
                if let Some(clean) = clean_value(entry) {
                    out.insert(key.clone(), clean);
                }
            }
            Some(Value::Object(out))
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match clean_value(item) {
                    Some(clean) => out.push(clean),
                    // one bad entry spoils the whole sequence
                    None => return Some(Value::Array(Vec::new())),
                }
            }
            Some(Value::Array(out))
        }
    }
}
