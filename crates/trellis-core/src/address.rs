//! Address scheme helpers.
//!
//! An address is a dash-separated sequence of non-negative integers encoding
//! the root-to-node index path; the root is `"0"` and child *i* of a node
//! addressed `A` is `"A-i"`. Assignment is depth-first and index-stable, so
//! the assignment pass (not string comparison) is the source of truth for
//! tree positions. Comparison helpers here are lexical over whole segments,
//! never numeric.

use crate::node::TreeError;

/// Address of child `index` under `address`.
pub fn child(address: &str, index: usize) -> String {
    format!("{address}-{index}")
}

/// Parent address, obtained by stripping the last `-N` segment.
///
/// The root (or an unassigned node) has no parent.
pub fn parent(address: &str) -> Option<&str> {
    address.rfind('-').map(|split| &address[..split])
}

/// Parse an address into its index path.
pub fn segments(address: &str) -> Result<Vec<usize>, TreeError> {
    if address.is_empty() {
        return Err(TreeError::AddressNotFound(address.to_string()));
    }
    address
        .split('-')
        .map(|segment| {
            segment
                .parse::<usize>()
                .map_err(|_| TreeError::AddressNotFound(address.to_string()))
        })
        .collect()
}

/// Whether `ancestor` strictly contains `descendant`.
///
/// Purely lexical over segments: `"0-1"` is an ancestor of `"0-1-2"` but not
/// of `"0-10"`.
pub fn is_ancestor(ancestor: &str, descendant: &str) -> bool {
    if ancestor.is_empty() {
        return false;
    }
    descendant
        .strip_prefix(ancestor)
        .is_some_and(|rest| rest.starts_with('-'))
}
