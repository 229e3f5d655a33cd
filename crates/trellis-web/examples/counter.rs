//! Minimal Trellis app: a click-counter page plus a websocket clock.
//!
//! Run with `cargo run --example counter`, then open http://localhost:8000.

use std::sync::Arc;
use std::time::Duration;
use trellis_core::{App, Capability, Codec, HandlerRegistry, Node, PageRegistry};
use trellis_web::{ConnectionRegistry, ServerState, broadcast_changes};

fn home() -> Node {
    Node::new("counter-page")
        .with_tag("body")
        .with_style("font-family: sans-serif; margin: 2rem;")
        .with_child(
            Node::new("clock")
                .with_tag("p")
                .with_text("waiting for server time")
                .with_handler(Capability::Connection, "home.clock"),
        )
        .with_child(
            Node::new("count-label")
                .with_tag("p")
                .with_text("clicks: 0")
                .with_field("count", 0),
        )
        .with_child(
            Node::new("count-button")
                .with_tag("button")
                .with_text("click me")
                .with_style("padding: 0.5rem 1rem;")
                .with_hover("background: #ddd;")
                .with_handler(Capability::Click, "home.count"),
        )
}

fn count_clicks(_target: &str, _payload: &serde_json::Map<String, serde_json::Value>, root: &mut Node) -> Option<Node> {
    if let Ok(label) = root.find_by_address_mut("0-1") {
        let count = label
            .field("count")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0)
            + 1;
        label.set_field("count", count);
        label.set_text(format!("clicks: {count}"));
    }
    None
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let mut pages = PageRegistry::new();
    pages.register("/", home());

    let mut handlers = HandlerRegistry::new();
    handlers.register("home.count", count_clicks);

    let mut connections = ConnectionRegistry::new();
    connections.register("home.clock", |mut socket, mut page, _app: Arc<App>| async move {
        let mut ticks = tokio::time::interval(Duration::from_secs(1));
        loop {
            ticks.tick().await;
            let now = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            if let Ok(clock) = page.find_by_address_mut("0-0") {
                clock.set_text(format!("server time: {now}"));
            }
            if broadcast_changes(&mut socket, &page).await.is_err() {
                break;
            }
            page.assign_address("");
        }
    });

    let state = ServerState::new(App::new(pages, handlers, Codec::new()), connections);
    trellis_web::serve("0.0.0.0:8000", state).await
}
