//! End-to-end exercise of the stateless event cycle: full render, client
//! state echo, handler mutation, incremental diff.

use serde_json::{Value, json};
use trellis_core::{App, Capability, Codec, HandlerRegistry, Node, PageRegistry};

fn todo_app() -> App {
    let mut pages = PageRegistry::new();
    pages.register(
        "/todos",
        Node::new("todo-page")
            .with_tag("body")
            .with_style("font-family: sans-serif;")
            .with_handler(Capability::Click, "todos.banner")
            .with_child(
                Node::new("todo-list")
                    .with_tag("ul")
                    .with_child(Node::new("todo-item").with_tag("li").with_text("first")),
            )
            .with_child(
                Node::new("add-button")
                    .with_tag("button")
                    .with_text("add")
                    .with_handler(Capability::Click, "todos.add"),
            )
            .with_child(
                Node::new("entry-form")
                    .with_tag("form")
                    .with_handler(Capability::Submit, "todos.submit")
                    .with_child(
                        Node::new("entry-field")
                            .with_tag("input")
                            .with_attr("key", "title"),
                    ),
            ),
    );

    let mut handlers = HandlerRegistry::new();
    handlers.register("todos.add", |_target, _payload, root| {
        if let Ok(list) = root.find_by_address_mut("0-0") {
            list.push_child(Node::new("todo-item").with_tag("li").with_text("new item"));
        }
        None
    });
    handlers.register("todos.banner", |_target, _payload, root| {
        root.push_child(Node::new("banner").with_tag("p").with_text("saved!"));
        None
    });
    handlers.register("todos.submit", |_target, payload, root| {
        let title = payload
            .get("formData")
            .and_then(|data| data.get("title"))
            .and_then(Value::as_str)
            .unwrap_or("untitled")
            .to_string();
        if let Ok(list) = root.find_by_address_mut("0-0") {
            list.push_child(Node::new("todo-item").with_tag("li").with_text(title));
        }
        None
    });

    App::new(pages, handlers, Codec::new())
}

fn event_payload(app: &App, path: &str, event_type: &str, target: &str) -> Value {
    let state = app.page(path).expect("page registered").dump();
    json!({"eventType": event_type, "target": target, "state": state})
}

#[test]
fn navigation_then_click_then_diff() {
    let app = todo_app();

    let full = app.dispatch_event("/todos", &json!({})).unwrap();
    assert_eq!(full.status, 200);
    assert!(full.body.contains("<li class=\"todo-item\" elemId=\"0-0-0\">first</li>"));
    assert!(full.body.contains(".todo-page{font-family: sans-serif;}"));

    let payload = event_payload(&app, "/todos", "click", "0-1");
    let response = app.dispatch_event("/todos", &payload).unwrap();
    assert_eq!(response.status, 200);

    let diff: Value = serde_json::from_str(&response.body).unwrap();
    let changes = diff["changes"].as_object().unwrap();
    assert_eq!(changes.len(), 1);
    let fragment = changes["todo-list"].as_str().unwrap();
    assert!(fragment.contains("first"));
    assert!(fragment.contains("new item"));
    // the echoed state carries the appended item for the next cycle
    assert_eq!(diff["state"]["children"][0]["children"][1]["text"], json!("new item"));
}

#[test]
fn submit_event_harvests_form_data() {
    let app = todo_app();

    let mut payload = event_payload(&app, "/todos", "submit", "0-2");
    payload["formData"] = json!({"title": "water the plants"});
    let response = app.dispatch_event("/todos", &payload).unwrap();
    assert_eq!(response.status, 200);

    let diff: Value = serde_json::from_str(&response.body).unwrap();
    let fragment = diff["changes"]["todo-list"].as_str().unwrap();
    assert!(fragment.contains("water the plants"));
}

#[test]
fn second_cycle_builds_on_echoed_state() {
    let app = todo_app();

    let payload = event_payload(&app, "/todos", "click", "0-1");
    let first = app.dispatch_event("/todos", &payload).unwrap();
    let first_diff: Value = serde_json::from_str(&first.body).unwrap();

    // echo the returned state back, exactly as the client would
    let second_payload = json!({
        "eventType": "click",
        "target": "0-1",
        "state": first_diff["state"],
    });
    let second = app.dispatch_event("/todos", &second_payload).unwrap();

    let second_diff: Value = serde_json::from_str(&second.body).unwrap();
    let items = second_diff["state"]["children"][0]["children"]
        .as_array()
        .unwrap();
    assert_eq!(items.len(), 3);
}

#[test]
fn unknown_page_and_unsupported_event_map_to_statuses() {
    let app = todo_app();

    let missing = app.dispatch_event("/nowhere", &json!({})).unwrap();
    assert_eq!((missing.body.as_str(), missing.status), ("", 400));

    let payload = event_payload(&app, "/todos", "hover", "0-1");
    let unsupported = app.dispatch_event("/todos", &payload).unwrap();
    assert_eq!(unsupported.status, 500);
}

#[test]
fn appending_under_the_root_re_renders_the_root_fragment() {
    let app = todo_app();

    let payload = event_payload(&app, "/todos", "click", "0");
    let response = app.dispatch_event("/todos", &payload).unwrap();
    let diff: Value = serde_json::from_str(&response.body).unwrap();

    let changes = diff["changes"].as_object().unwrap();
    assert_eq!(changes.len(), 1);
    let fragment = changes["todo-page"].as_str().unwrap();
    assert!(fragment.contains("saved!"));
}

#[test]
fn tree_failures_stay_errors_for_the_adapter_to_surface() {
    let app = todo_app();
    let payload = event_payload(&app, "/todos", "click", "0-9-9");
    assert!(app.dispatch_event("/todos", &payload).is_err());
}
