//! Websocket channel: a client announces its page after connecting, the
//! matching connection handler takes over the socket, and pushes incremental
//! diffs for as long as it wants.

use axum::extract::ws::{Message, WebSocket};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use trellis_core::{App, Capability, Node, render_diff};

pub type ConnectionFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// A long-lived connection handler. Receives the upgraded socket, a fresh
/// working tree for the announced page, and the shared app. Runs until it
/// returns; the socket closes with it.
pub type ConnectionHandler = Arc<dyn Fn(WebSocket, Node, Arc<App>) -> ConnectionFuture + Send + Sync>;

/// Connection handlers keyed by the same string scheme as event handlers.
/// Populated at startup, before the server is shared.
#[derive(Default)]
pub struct ConnectionRegistry {
    handlers: HashMap<String, ConnectionHandler>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, Fut>(&mut self, key: impl Into<String>, handler: F)
    where
        F: Fn(WebSocket, Node, Arc<App>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.handlers.insert(
            key.into(),
            Arc::new(move |socket, page, app| Box::pin(handler(socket, page, app))),
        );
    }

    pub fn get(&self, key: &str) -> Option<ConnectionHandler> {
        self.handlers.get(key).cloned()
    }
}

/// Drive a freshly upgraded socket: wait for the client's `locationUpdate`
/// announcement, resolve the page it names, and hand the socket to that
/// page's connection handler. Sockets for pages with no connection handler
/// are dropped quietly.
pub async fn handle_connection(
    mut socket: WebSocket,
    app: Arc<App>,
    connections: Arc<ConnectionRegistry>,
) {
    // the first text frame must be the location announcement
    let page_id = loop {
        match socket.recv().await {
            Some(Ok(Message::Text(raw))) => {
                let Ok(announce) = serde_json::from_str::<Value>(&raw) else {
                    println!("[ws] dropping connection: malformed announcement");
                    return;
                };
                if announce.get("type").and_then(Value::as_str) != Some("locationUpdate") {
                    println!("[ws] dropping connection: expected locationUpdate");
                    return;
                }
                let Some(page_id) = announce.get("pageId").and_then(Value::as_str) else {
                    println!("[ws] dropping connection: locationUpdate without pageId");
                    return;
                };
                break page_id.to_string();
            }
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
            Some(Ok(_)) => continue,
        }
    };

    let Some(template) = app.page(&page_id) else {
        println!("[ws] dropping connection: no page at {page_id:?}");
        return;
    };
    let Some(key) = connection_key(template) else {
        return;
    };
    let Some(handler) = connections.get(&key) else {
        println!("[ws] dropping connection: no connection handler under {key:?}");
        return;
    };

    let mut page = template.clone();
    page.assign_address("");
    println!("[ws] connected: {page_id}");
    handler(socket, page, Arc::clone(&app)).await;
    println!("[ws] closed: {page_id}");
}

/// Push one incremental diff of `tree` over the socket.
pub async fn broadcast_changes(socket: &mut WebSocket, tree: &Node) -> Result<(), String> {
    let diff = render_diff(tree);
    let body = serde_json::to_string(&diff).unwrap_or_else(|_| "{}".to_string());
    socket
        .send(Message::Text(body.into()))
        .await
        .map_err(|e| format!("websocket send failed: {e}"))
}

/// First connection-capable node in document order.
fn connection_key(node: &Node) -> Option<String> {
    if let Some(key) = node.handler(Capability::Connection) {
        return Some(key.to_string());
    }
    node.children().iter().find_map(connection_key)
}
