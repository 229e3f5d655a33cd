//! Axum transport for a Trellis app.
//!
//! Routes: every registered page is served on GET at its path, its events
//! arrive on POST at `{path}/onEvent`, and `/__ws` upgrades live connections.
//! The transport holds the app behind an `Arc` and never mutates it; all
//! per-request state lives in the working trees the dispatcher builds.

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path as AxumPath, State as AxumState};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use serde_json::Value;
use std::sync::Arc;
use trellis_core::{App, DispatchError, EventResponse};

pub mod ws;

pub use ws::{ConnectionRegistry, broadcast_changes, handle_connection};

/// Shared server state: the immutable app plus the connection handlers.
pub struct ServerState {
    pub app: Arc<App>,
    pub connections: Arc<ConnectionRegistry>,
}

impl ServerState {
    pub fn new(app: App, connections: ConnectionRegistry) -> Arc<Self> {
        Arc::new(Self {
            app: Arc::new(app),
            connections: Arc::new(connections),
        })
    }
}

/// The full route table for `state`.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/__ws", get(ws_upgrade))
        .route("/", get(page_index))
        .route("/onEvent", post(event_index))
        .route("/{*path}", get(page_any).post(event_any))
        .with_state(state)
}

/// Bind `addr` and serve until the listener fails.
pub async fn serve(addr: &str, state: Arc<ServerState>) -> Result<(), String> {
    let app = router(state);

    println!("Trellis serve");
    println!("URL: http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("failed to bind {addr}: {e}"))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| format!("server failed: {e}"))
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    AxumState(state): AxumState<Arc<ServerState>>,
) -> Response {
    ws.on_upgrade(move |socket| {
        handle_connection(socket, Arc::clone(&state.app), Arc::clone(&state.connections))
    })
}

async fn page_index(AxumState(state): AxumState<Arc<ServerState>>) -> Response {
    render_page_response(&state, "/")
}

async fn page_any(
    AxumPath(path): AxumPath<String>,
    AxumState(state): AxumState<Arc<ServerState>>,
) -> Response {
    render_page_response(&state, &path)
}

async fn event_index(
    AxumState(state): AxumState<Arc<ServerState>>,
    axum::Json(payload): axum::Json<Value>,
) -> Response {
    event_response(&state, "/", &payload)
}

async fn event_any(
    AxumPath(path): AxumPath<String>,
    AxumState(state): AxumState<Arc<ServerState>>,
    axum::Json(payload): axum::Json<Value>,
) -> Response {
    event_response(&state, &event_page_path(&path), &payload)
}

fn render_page_response(state: &ServerState, path: &str) -> Response {
    match state.app.render_full(path) {
        Ok(html) => Html(html).into_response(),
        Err(DispatchError::PageNotFound(_)) => {
            (StatusCode::NOT_FOUND, "not found").into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

fn event_response(state: &ServerState, path: &str, payload: &Value) -> Response {
    match state.app.dispatch_event(path, payload) {
        Ok(EventResponse { body, status }) => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::OK),
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Page path for an event route: strip the trailing `onEvent` segment.
fn event_page_path(raw: &str) -> String {
    let trimmed = raw
        .strip_suffix("onEvent")
        .map(|rest| rest.trim_end_matches('/'))
        .unwrap_or(raw);
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", trimmed.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trellis_core::{Capability, Codec, HandlerRegistry, Node, PageRegistry};

    fn demo_state() -> Arc<ServerState> {
        let mut pages = PageRegistry::new();
        pages.register("/", Node::new("home").with_tag("body"));
        pages.register(
            "/counter",
            Node::new("counter").with_tag("body").with_child(
                Node::new("bump")
                    .with_tag("button")
                    .with_text("0")
                    .with_handler(Capability::Click, "counter.bump"),
            ),
        );

        let mut handlers = HandlerRegistry::new();
        handlers.register("counter.bump", |target, _payload, root| {
            if let Ok(button) = root.find_by_address_mut(target) {
                let next = button.text().parse::<u64>().unwrap_or(0) + 1;
                button.set_text(next.to_string());
            }
            None
        });

        ServerState::new(
            App::new(pages, handlers, Codec::new()),
            ConnectionRegistry::new(),
        )
    }

    #[test]
    fn event_page_path_strips_the_event_segment() {
        assert_eq!(event_page_path("onEvent"), "/");
        assert_eq!(event_page_path("counter/onEvent"), "/counter");
        assert_eq!(event_page_path("a/b/onEvent"), "/a/b");
        assert_eq!(event_page_path("counter"), "/counter");
    }

    #[test]
    fn navigation_serves_html() {
        let state = demo_state();
        let response = render_page_response(&state, "/counter");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn unknown_page_is_404_on_navigation() {
        let state = demo_state();
        let response = render_page_response(&state, "/nope");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn event_posts_map_dispatch_statuses() {
        let state = demo_state();

        let dump = state.app.page("/counter").unwrap().dump();
        let payload = json!({"eventType": "click", "target": "0-0", "state": dump});
        let ok = event_response(&state, "/counter", &payload);
        assert_eq!(ok.status(), StatusCode::OK);

        let missing = event_response(&state, "/nope", &json!({}));
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

        let unsupported = event_response(
            &state,
            "/counter",
            &json!({"eventType": "hover", "target": "0-0"}),
        );
        assert_eq!(unsupported.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bad_target = event_response(
            &state,
            "/counter",
            &json!({"eventType": "click", "target": "0-9"}),
        );
        assert_eq!(bad_target.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
