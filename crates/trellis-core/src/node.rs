//! The tree entity: one UI element, its attributes, its children, and the
//! dirty flag driving incremental rendering.
//!
//! A node exclusively owns its children; the tree is a strict rooted acyclic
//! structure with no back references. Fields are private so that every
//! mutation after construction goes through a setter and raises the dirty
//! flag; construction itself (`new`, `from_fields`, the `with_*` builders)
//! leaves a node clean.

use crate::address;
use crate::codec::{Codec, CodecError};
use serde_json::{Map, Value};
use std::fmt;

/// Sentinel standing in for a field value that cannot travel in a state
/// dump. Construction skips sentinel-valued fields, so the value supplied by
/// the template survives a reconstruction round trip.
pub const NOT_TRANSFERABLE: &str = "__nta__";

/// Kind key under which the plain node constructor is pre-registered.
pub const DEFAULT_KIND: &str = "node";

/// The fixed set of optional event-handler capabilities a node may declare.
///
/// Dispatch checks capability membership through [`Node::handler`]; there is
/// no probing for ad hoc attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Click,
    Submit,
    Connection,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TreeError {
    AddressNotFound(String),
    ElementNotFound(String),
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeError::AddressNotFound(address) => {
                write!(f, "no element at address {address:?}")
            }
            TreeError::ElementNotFound(message) => write!(f, "element not found: {message}"),
        }
    }
}

impl std::error::Error for TreeError {}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) kind: String,
    pub(crate) tag: String,
    pub(crate) attributes: Map<String, Value>,
    pub(crate) text: String,
    pub(crate) style: String,
    pub(crate) hover: String,
    pub(crate) class_name: String,
    pub(crate) address: String,
    pub(crate) on_click: Option<String>,
    pub(crate) on_submit: Option<String>,
    pub(crate) on_connect: Option<String>,
    pub(crate) extra: Map<String, Value>,
    pub(crate) children: Vec<Node>,
    pub(crate) dirty: bool,
}

impl Node {
    /// A clean node with default fields: `div` tag, empty text/style, no
    /// children, no address. A non-empty class name is mirrored into the
    /// `class` attribute.
    pub fn new(class_name: impl Into<String>) -> Self {
        let class_name = class_name.into();
        let mut attributes = Map::new();
        if !class_name.is_empty() {
            attributes.insert("class".to_string(), Value::String(class_name.clone()));
        }
        Self {
            kind: DEFAULT_KIND.to_string(),
            tag: "div".to_string(),
            attributes,
            text: String::new(),
            style: String::new(),
            hover: String::new(),
            class_name,
            address: String::new(),
            on_click: None,
            on_submit: None,
            on_connect: None,
            extra: Map::new(),
            children: Vec::new(),
            dirty: false,
        }
    }

    /// Named-field construction, the reconstruction entry point registered
    /// with the codec under [`DEFAULT_KIND`].
    ///
    /// Sentinel-valued entries are skipped (left at default); unknown keys
    /// land in the free-form field map. The result is clean.
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        let mut node = Self::new("");
        node.apply_fields(fields);
        node.dirty = false;
        node
    }

    pub(crate) fn apply_fields(&mut self, fields: Map<String, Value>) {
        for (key, value) in fields {
            if value.as_str() == Some(NOT_TRANSFERABLE) {
                continue;
            }
            match key.as_str() {
                "classRef" => self.kind = value_to_string(&value),
                "tag" => self.tag = value_to_string(&value),
                "className" => self.class_name = value_to_string(&value),
                "text" => self.text = value_to_string(&value),
                "style" => self.style = value_to_string(&value),
                "hover" => self.hover = value_to_string(&value),
                "elemId" => self.address = value_to_string(&value),
                "attributes" => {
                    if let Value::Object(map) = value {
                        self.attributes = map;
                    }
                }
                "onClick" => self.on_click = value.as_str().map(str::to_string),
                "onSubmit" => self.on_submit = value.as_str().map(str::to_string),
                "onConnect" => self.on_connect = value.as_str().map(str::to_string),
                // children are attached by the codec, after construction
                "children" => {}
                _ => {
                    self.extra.insert(key, value);
                }
            }
        }
        if !self.class_name.is_empty() {
            self.attributes
                .insert("class".to_string(), Value::String(self.class_name.clone()));
        }
    }

    // Builder-style constructors; these count as construction time and keep
    // the node clean.

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }

    pub fn with_hover(mut self, hover: impl Into<String>) -> Self {
        self.hover = hover.into();
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_handler(mut self, capability: Capability, key: impl Into<String>) -> Self {
        self.handler_slot(capability).replace(key.into());
        self
    }

    // Read access.

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn style(&self) -> &str {
        &self.style
    }

    pub fn hover(&self) -> &str {
        &self.hover
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Handler key declared for `capability`, if any.
    pub fn handler(&self, capability: Capability) -> Option<&str> {
        match capability {
            Capability::Click => self.on_click.as_deref(),
            Capability::Submit => self.on_submit.as_deref(),
            Capability::Connection => self.on_connect.as_deref(),
        }
    }

    /// The capabilities this node declares.
    pub fn capabilities(&self) -> Vec<Capability> {
        [Capability::Click, Capability::Submit, Capability::Connection]
            .into_iter()
            .filter(|capability| self.handler(*capability).is_some())
            .collect()
    }

    // Mutation. Every setter raises the dirty flag; only address assignment
    // clears it.

    pub fn set_tag(&mut self, tag: impl Into<String>) {
        self.tag = tag.into();
        self.dirty = true;
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.dirty = true;
    }

    pub fn set_style(&mut self, style: impl Into<String>) {
        self.style = style.into();
        self.dirty = true;
    }

    pub fn set_hover(&mut self, hover: impl Into<String>) {
        self.hover = hover.into();
        self.dirty = true;
    }

    pub fn set_class_name(&mut self, class_name: impl Into<String>) {
        self.class_name = class_name.into();
        self.attributes
            .insert("class".to_string(), Value::String(self.class_name.clone()));
        self.dirty = true;
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
        self.dirty = true;
    }

    pub fn set_field(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.extra.insert(key.into(), value.into());
        self.dirty = true;
    }

    pub fn set_handler(&mut self, capability: Capability, key: impl Into<String>) {
        self.handler_slot(capability).replace(key.into());
        self.dirty = true;
    }

    fn handler_slot(&mut self, capability: Capability) -> &mut Option<String> {
        match capability {
            Capability::Click => &mut self.on_click,
            Capability::Submit => &mut self.on_submit,
            Capability::Connection => &mut self.on_connect,
        }
    }

    /// Assign `id` (or `"0"` when empty) as this node's address, mirror it
    /// into the `elemId` attribute, and recurse into children with
    /// `"{id}-{index}"`.
    ///
    /// Clears the dirty flag on every visited node regardless of pending
    /// unrendered changes. This coarse reset is the documented contract:
    /// callers mutate, render a diff, then reassign.
    pub fn assign_address(&mut self, id: &str) {
        let id = if id.is_empty() { "0" } else { id };
        self.address = id.to_string();
        self.attributes
            .insert("elemId".to_string(), Value::String(self.address.clone()));
        for (index, child) in self.children.iter_mut().enumerate() {
            child.assign_address(&address::child(id, index));
        }
        self.dirty = false;
    }

    /// Root-only lazy assignment used by the full renderer when no address
    /// pass has run yet. Children keep whatever addresses they carry.
    pub(crate) fn promote_to_root(&mut self) {
        self.address = "0".to_string();
        self.attributes
            .insert("elemId".to_string(), Value::String(self.address.clone()));
    }

    /// Descend from this node by the index path encoded in `addr`.
    ///
    /// The path must extend this node's own address; anything else, or any
    /// out-of-range index, is an `AddressNotFound`.
    pub fn find_by_address(&self, addr: &str) -> Result<&Node, TreeError> {
        let path = self.relative_path(addr)?;
        let mut current = self;
        for index in path {
            current = current
                .children
                .get(index)
                .ok_or_else(|| TreeError::AddressNotFound(addr.to_string()))?;
        }
        Ok(current)
    }

    pub fn find_by_address_mut(&mut self, addr: &str) -> Result<&mut Node, TreeError> {
        let path = self.relative_path(addr)?;
        let mut current = self;
        for index in path {
            current = current
                .children
                .get_mut(index)
                .ok_or_else(|| TreeError::AddressNotFound(addr.to_string()))?;
        }
        Ok(current)
    }

    fn relative_path(&self, addr: &str) -> Result<Vec<usize>, TreeError> {
        if self.address.is_empty() {
            return Err(TreeError::AddressNotFound(addr.to_string()));
        }
        let rest = addr
            .strip_prefix(self.address.as_str())
            .ok_or_else(|| TreeError::AddressNotFound(addr.to_string()))?;
        if rest.is_empty() {
            return Ok(Vec::new());
        }
        let rest = rest
            .strip_prefix('-')
            .ok_or_else(|| TreeError::AddressNotFound(addr.to_string()))?;
        address::segments(rest)
    }

    /// Every node whose class name equals `class_name`, in document order.
    /// Class names are not unique; all matches are returned.
    pub fn find_by_class(&self, class_name: &str) -> Vec<&Node> {
        let mut found = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.class_name == class_name {
                found.push(node);
            }
            for child in node.children.iter().rev() {
                stack.push(child);
            }
        }
        found
    }

    /// Append a child directly under this node, marking it dirty.
    pub fn push_child(&mut self, child: Node) {
        self.children.push(child);
        self.dirty = true;
    }

    /// Insert `child` under the node addressed `parent_addr` (append when no
    /// index is given) and mark that parent dirty.
    pub fn add_child(
        &mut self,
        parent_addr: &str,
        child: Node,
        index: Option<usize>,
    ) -> Result<(), TreeError> {
        let parent = self.find_by_address_mut(parent_addr)?;
        match index {
            Some(at) if at <= parent.children.len() => parent.children.insert(at, child),
            Some(at) => {
                return Err(TreeError::ElementNotFound(format!(
                    "insert index {at} out of range for {parent_addr:?}"
                )));
            }
            None => parent.children.push(child),
        }
        parent.dirty = true;
        Ok(())
    }

    /// Remove the node addressed `addr` from its parent, marking the parent
    /// dirty. The root (no parent) cannot be removed.
    pub fn remove_at(&mut self, addr: &str) -> Result<Node, TreeError> {
        let parent_addr = address::parent(addr).ok_or_else(|| {
            TreeError::ElementNotFound(format!("element at {addr:?} has no parent"))
        })?;
        let index = address::segments(addr)?
            .last()
            .copied()
            .unwrap_or_default();
        let parent = self.find_by_address_mut(parent_addr)?;
        if index >= parent.children.len() {
            return Err(TreeError::AddressNotFound(addr.to_string()));
        }
        parent.dirty = true;
        Ok(parent.children.remove(index))
    }

    /// Remove `element` from this tree.
    ///
    /// An element with no address removes *all* nodes sharing its class name
    /// instead: the intentional bulk-removal fallback for nodes that were
    /// built detached and never addressed.
    pub fn remove_element(&mut self, element: &Node) -> Result<(), TreeError> {
        if !element.address.is_empty() {
            return self.remove_at(&element.address).map(|_| ());
        }
        let addresses: Vec<String> = self
            .find_by_class(&element.class_name)
            .into_iter()
            .map(|node| node.address.clone())
            .collect();
        // later matches first, so earlier recorded addresses stay valid
        for addr in addresses.iter().rev() {
            self.remove_at(addr)?;
        }
        Ok(())
    }

    /// Merge an echoed client state onto this node (a fresh template clone).
    ///
    /// Children are replaced wholesale by decoding the state's `children`
    /// entries; the remaining state fields are then applied over this node,
    /// with sentinel entries skipped so template-supplied values survive.
    pub fn update_from_state(
        &mut self,
        mut state: Map<String, Value>,
        codec: &Codec,
    ) -> Result<(), CodecError> {
        let children = state.remove("children");
        let mut rebuilt = Vec::new();
        if let Some(Value::Array(items)) = children {
            for item in &items {
                rebuilt.push(codec.load(item)?);
            }
        }
        self.apply_fields(state);
        self.children = rebuilt;
        self.dirty = false;
        Ok(())
    }
}

pub(crate) fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_tree() -> Node {
        Node::new("root")
            .with_child(
                Node::new("left")
                    .with_child(Node::new("leaf").with_tag("p").with_text("first")),
            )
            .with_child(Node::new("right").with_tag("span"))
    }

    #[test]
    fn construction_leaves_node_clean() {
        let node = Node::new("something")
            .with_text("some_text")
            .with_style("color: red;")
            .with_child(Node::new("child"));
        assert!(!node.is_dirty());
        assert_eq!(node.tag(), "div");
        assert_eq!(node.attr("class"), Some(&json!("something")));
    }

    #[test]
    fn mutation_after_construction_sets_dirty() {
        let mut node = Node::new("something");
        node.set_text("changed");
        assert!(node.is_dirty());
    }

    #[test]
    fn address_assignment_is_deterministic() {
        let mut tree = sample_tree();
        tree.assign_address("");
        assert_eq!(tree.address(), "0");
        assert_eq!(tree.children()[0].address(), "0-0");
        assert_eq!(tree.children()[0].children()[0].address(), "0-0-0");
        assert_eq!(tree.children()[1].address(), "0-1");
        assert_eq!(tree.attr("elemId"), Some(&json!("0")));
    }

    #[test]
    fn address_assignment_clears_dirty_even_with_pending_change() {
        let mut tree = sample_tree();
        tree.assign_address("");
        tree.set_text("pending, unrendered");
        assert!(tree.is_dirty());
        // the reset is unconditional; the pending change is suppressed
        tree.assign_address("");
        assert!(!tree.is_dirty());
    }

    #[test]
    fn find_by_address_descends_index_path() {
        let mut tree = sample_tree();
        tree.assign_address("");
        assert_eq!(tree.find_by_address("0-0-0").unwrap().text(), "first");
        assert_eq!(tree.find_by_address("0").unwrap().class_name(), "root");
        assert_eq!(
            tree.find_by_address("0-9"),
            Err(TreeError::AddressNotFound("0-9".to_string()))
        );
        assert!(tree.find_by_address("1-0").is_err());
    }

    #[test]
    fn find_by_address_requires_assigned_root() {
        let tree = sample_tree();
        assert!(tree.find_by_address("0").is_err());
    }

    #[test]
    fn find_by_class_returns_all_matches_in_document_order() {
        let mut tree = Node::new("root")
            .with_child(Node::new("twin").with_text("a"))
            .with_child(Node::new("other").with_child(Node::new("twin").with_text("b")));
        tree.assign_address("");
        let matches = tree.find_by_class("twin");
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].text(), "a");
        assert_eq!(matches[1].text(), "b");
    }

    #[test]
    fn add_child_marks_parent_dirty() {
        let mut tree = sample_tree();
        tree.assign_address("");
        tree.add_child("0-0", Node::new("inserted"), Some(0)).unwrap();
        assert!(tree.children()[0].is_dirty());
        assert!(!tree.is_dirty());
        assert_eq!(tree.children()[0].children()[0].class_name(), "inserted");
    }

    #[test]
    fn remove_at_marks_parent_dirty() {
        let mut tree = sample_tree();
        tree.assign_address("");
        let removed = tree.remove_at("0-0-0").unwrap();
        assert_eq!(removed.class_name(), "leaf");
        assert!(tree.children()[0].is_dirty());
        assert!(tree.children()[0].children().is_empty());
    }

    #[test]
    fn removing_root_fails_with_element_not_found() {
        let mut tree = sample_tree();
        tree.assign_address("");
        assert!(matches!(
            tree.remove_at("0"),
            Err(TreeError::ElementNotFound(_))
        ));
    }

    #[test]
    fn addressless_element_removal_falls_back_to_class_name() {
        let mut tree = Node::new("root")
            .with_child(Node::new("goner"))
            .with_child(Node::new("keeper"))
            .with_child(Node::new("goner"));
        tree.assign_address("");
        // detached twin, never addressed
        tree.remove_element(&Node::new("goner")).unwrap();
        assert_eq!(tree.children().len(), 1);
        assert_eq!(tree.children()[0].class_name(), "keeper");
    }

    #[test]
    fn from_fields_skips_sentinel_values() {
        let mut fields = Map::new();
        fields.insert("text".to_string(), json!(NOT_TRANSFERABLE));
        fields.insert("tag".to_string(), json!("section"));
        fields.insert("className".to_string(), json!("partial"));
        let node = Node::from_fields(fields);
        assert_eq!(node.text(), "");
        assert_eq!(node.tag(), "section");
        assert!(!node.is_dirty());
    }

    #[test]
    fn unknown_fields_land_in_field_map() {
        let mut fields = Map::new();
        fields.insert("className".to_string(), json!("form"));
        fields.insert("draft".to_string(), json!("hello"));
        let node = Node::from_fields(fields);
        assert_eq!(node.field("draft"), Some(&json!("hello")));
    }
}
