//! Trellis core crate.
//!
//! The server holds a tree of UI components per page, renders it to HTML, and
//! reconciles that tree across stateless request/response cycles. The crate
//! separates the moving parts into layers:
//!
//! - `node`: the tree entity, its dirty tracking, and structural edits.
//! - `address`: dash-separated index paths identifying tree positions.
//! - `codec`: lossy-but-contracted serialize/reconstruct of a tree to and
//!   from a transfer-safe JSON mapping, plus the handler and node-kind
//!   registries that stand in for non-serializable values.
//! - `render`: full markup emission and coarse incremental-diff emission.
//! - `dispatch`: routes inbound events to the right node handler and
//!   produces the next response.
//!
//! Statelessness is the critical design rule: the server keeps no per-client
//! memory between events. Every response carries a full state dump, the
//! client echoes it back with the next event, and the dispatcher rebuilds a
//! fresh working tree from that echo. Templates registered at startup are the
//! only shared state and are never mutated afterwards.

pub mod address;
pub mod codec;
pub mod dispatch;
pub mod node;
pub mod render;

pub use codec::{Codec, CodecError, EventHandler, HandlerRegistry, NodeConstructor};
pub use dispatch::{App, DispatchError, EventResponse, PageRegistry, normalize_path};
pub use node::{Capability, DEFAULT_KIND, NOT_TRANSFERABLE, Node, TreeError};
pub use render::{DiffRender, SUPPORT_SCRIPT, render_diff, render_page, stylesheet};
