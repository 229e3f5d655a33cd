//! Markup emission: full page renders and coarse incremental diffs.
//!
//! A full render walks the tree pre-order and appends two root-level
//! payloads: the client bootstrap (state dump + support script) and the
//! stylesheet built from per-node style strings. An incremental render walks
//! breadth-first and re-renders every dirty subtree in isolation, keyed by
//! class name, so the client can swap fragments in place.

use crate::node::{Capability, Node, value_to_string};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::VecDeque;

/// Client support runtime, appended once per full render.
pub const SUPPORT_SCRIPT: &str = include_str!("support.js");

/// Result of an incremental render: class-name-keyed markup fragments plus a
/// full state dump for the client to resynchronize its authoritative copy.
#[derive(Debug, Clone, Serialize)]
pub struct DiffRender {
    pub state: Value,
    pub changes: Map<String, Value>,
}

/// Full pre-order render of the page.
///
/// Styles are not inlined here; they travel in the trailing stylesheet. A
/// root with no address gets `"0"` lazily assigned to itself only — children
/// keep whatever addresses they carry, which can be stale if the tree shape
/// changed since the last assignment pass (caller responsibility).
pub fn render_page(root: &mut Node) -> String {
    if root.address().is_empty() {
        root.promote_to_root();
    }
    let mut out = String::new();
    render_node(root, false, &mut out);

    let state = serde_json::to_string(&root.dump()).unwrap_or_else(|_| "{}".to_string());
    out.push_str(&format!("<script>let page_props = {state};</script>"));
    out.push_str(&format!("<script>{SUPPORT_SCRIPT}</script>"));
    out.push_str(&format!("<style>{}</style>", stylesheet(root)));
    out
}

/// Breadth-first incremental render, level by level.
///
/// A dirty node's whole subtree is re-rendered in detached mode (style
/// inlined, no bootstrap or stylesheet) and recorded under its class name;
/// its children are not traversed further. Dirty is subtree-inclusive by
/// design: a dirty ancestor re-renders everything beneath it. When two dirty
/// nodes share a class name, the last one visited wins.
pub fn render_diff(root: &Node) -> DiffRender {
    let mut changes = Map::new();
    let mut queue: VecDeque<&Node> = VecDeque::new();
    queue.push_back(root);

    while !queue.is_empty() {
        for _ in 0..queue.len() {
            let Some(node) = queue.pop_back() else {
                break;
            };
            if node.is_dirty() {
                let mut fragment = String::new();
                render_node(node, true, &mut fragment);
                changes.insert(node.class_name().to_string(), Value::String(fragment));
            } else {
                for child in node.children() {
                    queue.push_front(child);
                }
            }
        }
    }

    DiffRender {
        state: root.dump(),
        changes,
    }
}

fn render_node(node: &Node, detached: bool, out: &mut String) {
    out.push('<');
    out.push_str(node.tag());
    for (key, value) in node.attributes() {
        out.push_str(&format!(
            " {key}=\"{}\"",
            escape_html(&value_to_string(value))
        ));
    }
    if node.handler(Capability::Click).is_some() {
        out.push_str(&format!(
            " onclick=\"onClickListener('{}')\"",
            node.address()
        ));
    }
    if detached && !node.style().is_empty() {
        out.push_str(&format!(" style=\"{}\"", escape_html(node.style())));
    }
    out.push('>');
    out.push_str(&escape_html(node.text()));
    for child in node.children() {
        render_node(child, detached, out);
    }
    out.push_str(&format!("</{}>", node.tag()));
}

/// Concatenate, in document order, each node's `.{class}{style}` rule plus a
/// `:hover` variant when a hover style is present.
pub fn stylesheet(node: &Node) -> String {
    let mut sheet = String::new();
    if !node.class_name().is_empty() {
        if !node.style().is_empty() {
            sheet.push_str(&format!(".{}{{{}}}", node.class_name(), node.style()));
        }
        if !node.hover().is_empty() {
            sheet.push_str(&format!(".{}:hover{{{}}}", node.class_name(), node.hover()));
        }
    }
    for child in node.children() {
        sheet.push_str(&stylesheet(child));
    }
    sheet
}

pub(crate) fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
