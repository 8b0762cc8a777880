mod common;
use common::{app_with, build_app, stocked_store, test_config, text, FakeUpstream};

use relay::mcp::protocol::{JsonRpcRequest, JsonRpcResponse};
use relay::mcp::server::McpServer;
use relay::services::config::ToolGroup;
use relay::services::credentials::MemoryCredentialStore;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;

fn request(raw: Value) -> JsonRpcRequest {
    serde_json::from_value(raw).expect("request")
}

#[tokio::test]
async fn registry_lists_every_enabled_tool_in_order() {
    let app = app_with(FakeUpstream::new());
    assert_eq!(
        app.dispatcher.registry().names(),
        vec![
            "manage_task",
            "get_team_overview",
            "get_weather",
            "list_calendars",
            "list_calendar_events",
            "retrieve_timezone",
            "retrieve_calendar_free_busy_slots",
            "execute_readonly_query",
            "execute_mutation_query",
            "get_graphql_schema",
        ]
    );
}

#[tokio::test]
async fn disabled_templates_are_not_registered() {
    let mut config = test_config();
    config.templates = vec![ToolGroup::Weather];
    let app = build_app(config, stocked_store(), FakeUpstream::new());
    assert_eq!(app.dispatcher.registry().names(), vec!["get_weather"]);

    let result = app.dispatcher.dispatch("manage_task", json!({"operation": "list"})).await;
    assert!(result.is_error);
    assert!(text(&result).starts_with("❌ Error: Unknown tool: manage_task"));
}

#[tokio::test]
async fn unknown_tool_never_escapes_the_boundary() {
    let upstream = FakeUpstream::new();
    let app = app_with(upstream.clone());
    for name in ["", "nope", "manage-task"] {
        let result = app.dispatcher.dispatch(name, json!({})).await;
        assert!(result.is_error);
        assert!(text(&result).contains("Unknown tool"), "{}", text(&result));
    }
    let result = app.dispatcher.dispatch("manage_tsk", json!({})).await;
    assert!(text(&result).contains("Did you mean: manage_task?"));
    assert!(upstream.requests().is_empty());
}

#[tokio::test]
async fn structural_violations_are_reported_before_any_call() {
    let upstream = FakeUpstream::new();
    let app = app_with(upstream.clone());
    let result = app
        .dispatcher
        .dispatch("manage_task", json!({"operation": "archive", "priority": 3}))
        .await;
    let body = text(&result);
    assert!(result.is_error);
    assert!(body.starts_with("❌ Error: Invalid arguments for manage_task:"));
    assert!(body.contains("/operation: expected one of create, update, get, list"));
    assert!(body.contains("/priority: expected string"));
    assert!(upstream.requests().is_empty());
}

#[tokio::test]
async fn missing_token_is_an_auth_error() {
    let upstream = FakeUpstream::new();
    let app = build_app(test_config(), Arc::new(MemoryCredentialStore::new()), upstream.clone());
    let result = app
        .dispatcher
        .dispatch("manage_task", json!({"operation": "list"}))
        .await;
    assert!(result.is_error);
    assert!(text(&result).starts_with("❌ Error: API token not found for basic-api-wrapper."));
    assert!(text(&result).contains("relay auth set --template tasks"));
    assert!(upstream.requests().is_empty());
}

#[tokio::test]
async fn transport_failures_reach_the_dispatcher() {
    let upstream = FakeUpstream::new();
    upstream.on(
        Method::GET,
        "/api/tasks",
        Err(relay::errors::UpstreamError::Transport("connection refused".into())),
    );
    let app = app_with(upstream);
    let result = app
        .dispatcher
        .dispatch("manage_task", json!({"operation": "list"}))
        .await;
    assert!(result.is_error);
    assert_eq!(text(&result), "❌ Error: connection refused");
}

#[tokio::test]
async fn upstream_http_errors_render_identically_across_handlers() {
    let upstream = FakeUpstream::new();
    let body = r#"{"error":"not found"}"#;
    upstream
        .http_error(Method::GET, "/api/tasks/t9", 404, body)
        .http_error(Method::GET, "/api/teams/default", 404, body)
        .http_error(Method::GET, "/data/2.5/weather", 404, body)
        .http_error(Method::GET, "/v3/calendars/primary", 404, body)
        .http_error(Method::POST, "/graphql", 404, body);
    upstream
        .ok(Method::GET, "/api/teams/default/members", json!([]))
        .ok(Method::GET, "/api/teams/default/projects", json!([]));
    let app = app_with(upstream);

    let calls = [
        ("manage_task", json!({"operation": "get", "task_id": "t9"})),
        ("get_team_overview", json!({})),
        ("get_weather", json!({"city": "Nowhere"})),
        ("retrieve_timezone", json!({})),
        ("execute_readonly_query", json!({"query": "{ viewer { id } }"})),
    ];
    for (tool, args) in calls {
        let result = app.dispatcher.dispatch(tool, args).await;
        assert!(!result.is_error, "{} should settle inline", tool);
        assert_eq!(
            text(&result),
            "❌ API Error: 404 - {\"error\":\"not found\"}",
            "{}",
            tool
        );
    }
}

#[tokio::test]
async fn json_rpc_surface_answers_lists_and_calls() {
    let upstream = FakeUpstream::new();
    upstream.ok(Method::GET, "/api/tasks", json!([]));
    let server = McpServer::new(app_with(upstream));

    let init = server
        .handle_request(request(json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}})))
        .await
        .expect("reply");
    let init = init.result.expect("result");
    assert_eq!(init["serverInfo"]["name"], "relay");
    assert!(init["capabilities"]["tools"].is_object());

    let list = server
        .handle_request(request(json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"})))
        .await
        .expect("reply")
        .result
        .expect("result");
    let weather = list["tools"]
        .as_array()
        .expect("tools")
        .iter()
        .find(|t| t["name"] == "get_weather")
        .expect("weather tool");
    assert_eq!(
        weather["inputSchema"]["anyOf"],
        json!([{"required": ["city"]}, {"required": ["lat", "lon"]}])
    );

    let call = server
        .handle_request(request(json!({
            "jsonrpc": "2.0", "id": 3, "method": "tools/call",
            "params": {"name": "manage_task", "arguments": {"operation": "list"}}
        })))
        .await
        .expect("reply")
        .result
        .expect("result");
    assert_eq!(
        call,
        json!({"content": [{"type": "text", "text": "No tasks found."}], "isError": false})
    );

    let missing = server
        .handle_request(request(json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call", "params": {}})))
        .await
        .expect("reply");
    assert_eq!(missing.error.expect("error").code, -32602);

    let unknown = server
        .handle_request(request(json!({"jsonrpc": "2.0", "id": 5, "method": "resources/list"})))
        .await
        .expect("reply");
    assert_eq!(unknown.error.expect("error").code, -32601);

    let note = server
        .handle_request(request(json!({"jsonrpc": "2.0", "method": "notifications/initialized"})))
        .await;
    assert!(note.is_none());
}

#[tokio::test]
async fn stdio_loop_answers_every_request_once() {
    let upstream = FakeUpstream::with_delay(Duration::from_millis(20));
    upstream.ok(Method::GET, "/api/tasks", json!([]));
    let server = McpServer::new(app_with(upstream.clone()));

    let input = [
        r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        "not json",
        r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"manage_task","arguments":{"operation":"list"}}}"#,
        r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"manage_task","arguments":{"operation":"list"}}}"#,
        "",
    ]
    .join("\n");
    let (client, server_side) = tokio::io::duplex(64 * 1024);
    server
        .serve(input.as_bytes(), server_side)
        .await
        .expect("serve");

    let mut raw = String::new();
    let mut client = client;
    client.read_to_string(&mut raw).await.expect("read");
    let responses: Vec<JsonRpcResponse> = raw
        .lines()
        .map(|line| serde_json::from_str(line).expect("frame"))
        .collect();
    assert_eq!(responses.len(), 4);

    let parse_error = responses.iter().find(|r| r.id.is_null()).expect("parse error");
    assert_eq!(parse_error.error.as_ref().expect("error").code, -32700);
    let mut ids: Vec<i64> = responses.iter().filter_map(|r| r.id.as_i64()).collect();
    ids.sort();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(upstream.peak_in_flight(), 2);
}
