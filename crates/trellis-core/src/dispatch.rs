//! Event dispatch: routes an inbound request to a page template, rebuilds the
//! working tree from the echoed client state, runs the target's handler, and
//! renders the response.
//!
//! The dispatcher owns no per-client state. Each event reconstructs a working
//! tree by cloning the registered template and merging the state echoed in the
//! request payload, so two concurrent clients on the same page never observe
//! each other.

use crate::codec::{Codec, CodecError, HandlerRegistry};
use crate::node::{Capability, Node, TreeError};
use crate::render::{render_diff, render_page};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug)]
pub enum DispatchError {
    PageNotFound(String),
    UnsupportedEvent(String),
    Tree(TreeError),
    Codec(CodecError),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::PageNotFound(path) => write!(f, "no page registered at {path:?}"),
            DispatchError::UnsupportedEvent(kind) => write!(f, "unsupported event type {kind:?}"),
            DispatchError::Tree(err) => err.fmt(f),
            DispatchError::Codec(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<TreeError> for DispatchError {
    fn from(err: TreeError) -> Self {
        DispatchError::Tree(err)
    }
}

impl From<CodecError> for DispatchError {
    fn from(err: CodecError) -> Self {
        DispatchError::Codec(err)
    }
}

/// Collapse a request path to its canonical page key: leading slash, no
/// trailing slashes, `"/"` for the empty path.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Page templates keyed by normalized path.
///
/// Templates are addressed at registration and never mutated afterwards;
/// dispatch works on clones.
#[derive(Default)]
pub struct PageRegistry {
    pages: HashMap<String, Node>,
}

impl PageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `template` at `path`, assigning addresses from the root so
    /// every clone starts fully addressed. Returns the displaced template if
    /// the path was already taken.
    pub fn register(&mut self, path: &str, mut template: Node) -> Option<Node> {
        template.assign_address("");
        self.pages.insert(normalize_path(path), template)
    }

    pub fn get(&self, path: &str) -> Option<&Node> {
        self.pages.get(&normalize_path(path))
    }
}

/// The body and HTTP status a dispatch produced.
#[derive(Debug, Clone, PartialEq)]
pub struct EventResponse {
    pub body: String,
    pub status: u16,
}

/// The assembled application: pages, handlers, and the state codec.
pub struct App {
    pages: PageRegistry,
    handlers: HandlerRegistry,
    codec: Codec,
}

impl App {
    pub fn new(pages: PageRegistry, handlers: HandlerRegistry, codec: Codec) -> Self {
        Self {
            pages,
            handlers,
            codec,
        }
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn page(&self, path: &str) -> Option<&Node> {
        self.pages.get(path)
    }

    /// Full render of the page at `path`, as served on plain navigation.
    pub fn render_full(&self, path: &str) -> Result<String, DispatchError> {
        let mut page = self
            .pages
            .get(path)
            .cloned()
            .ok_or_else(|| DispatchError::PageNotFound(path.to_string()))?;
        Ok(render_page(&mut page))
    }

    /// Rebuild the working tree for `path` from an echoed client state dump.
    pub fn working_tree(&self, path: &str, state: Option<&Value>) -> Result<Node, DispatchError> {
        let mut page = self
            .pages
            .get(path)
            .cloned()
            .ok_or_else(|| DispatchError::PageNotFound(path.to_string()))?;
        if let Some(state) = state.and_then(Value::as_object) {
            page.update_from_state(state.clone(), &self.codec)?;
        }
        page.assign_address("");
        Ok(page)
    }

    /// Dispatch an inbound event, recovering the two client-visible failure
    /// modes into plain HTTP responses: an unknown page is an empty 400, an
    /// unsupported event type a 500. Tree and codec failures propagate to the
    /// caller untouched.
    pub fn dispatch_event(&self, path: &str, payload: &Value) -> Result<EventResponse, DispatchError> {
        match self.dispatch_inner(path, payload) {
            Ok(response) => Ok(response),
            Err(DispatchError::PageNotFound(_)) => Ok(EventResponse {
                body: String::new(),
                status: 400,
            }),
            Err(err @ DispatchError::UnsupportedEvent(_)) => Ok(EventResponse {
                body: err.to_string(),
                status: 500,
            }),
            Err(err) => Err(err),
        }
    }

    fn dispatch_inner(&self, path: &str, payload: &Value) -> Result<EventResponse, DispatchError> {
        let Some(event) = payload.as_object().filter(|event| event.contains_key("eventType"))
        else {
            // no event fields means plain navigation
            return Ok(EventResponse {
                body: self.render_full(path)?,
                status: 200,
            });
        };

        let mut page = self.working_tree(path, event.get("state"))?;

        let event_type = event.get("eventType").and_then(Value::as_str).unwrap_or("");
        let capability = match event_type {
            "click" => Capability::Click,
            "submit" => Capability::Submit,
            _ => return Err(DispatchError::UnsupportedEvent(event_type.to_string())),
        };

        let target = event
            .get("target")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                DispatchError::Tree(TreeError::ElementNotFound(
                    "event carries no target".to_string(),
                ))
            })?
            .to_string();

        let node = page.find_by_address(&target)?;
        let key = node
            .handler(capability)
            .ok_or_else(|| {
                DispatchError::Tree(TreeError::ElementNotFound(format!(
                    "no {event_type} handler at {target:?}"
                )))
            })?
            .to_string();
        let handler = self.handlers.get(&key).ok_or_else(|| {
            DispatchError::Tree(TreeError::ElementNotFound(format!(
                "no handler registered under {key:?}"
            )))
        })?;

        // the handler sees the event fields minus the (already-consumed) state
        let mut fields = event.clone();
        fields.remove("state");
        if let Some(replacement) = handler(&target, &fields, &mut page) {
            page = replacement;
        }

        let diff = render_diff(&page);
        let body = serde_json::to_string(&diff).unwrap_or_else(|_| "{}".to_string());
        Ok(EventResponse { body, status: 200 })
    }
}
