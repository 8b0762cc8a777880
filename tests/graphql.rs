mod common;
use common::{app_with, text, FakeUpstream, TOKEN};

use reqwest::Method;
use serde_json::json;

const PATH: &str = "/graphql";

#[tokio::test]
async fn readonly_tool_posts_query_and_variables() {
    let upstream = FakeUpstream::new();
    upstream.ok(Method::POST, PATH, json!({"data": {"viewer": {"id": "u1", "name": "Ada"}}}));
    let app = app_with(upstream.clone());

    let result = app
        .dispatcher
        .dispatch(
            "execute_readonly_query",
            json!({"query": "query Me($n: Int) { viewer { id name } }", "variables": {"n": 2}}),
        )
        .await;
    let body = text(&result);
    assert!(body.starts_with("## Query Results ✅\n\n**Response Data:**\n```json\n"));
    assert!(body.contains("\"name\": \"Ada\""));

    let sent = &upstream.requests()[0];
    assert_eq!(sent.bearer.as_deref(), Some(TOKEN));
    assert_eq!(
        sent.body,
        Some(json!({"query": "query Me($n: Int) { viewer { id name } }", "variables": {"n": 2}}))
    );
}

#[tokio::test]
async fn readonly_tool_rejects_mutations_without_a_call() {
    let upstream = FakeUpstream::new();
    let app = app_with(upstream.clone());

    let result = app
        .dispatcher
        .dispatch("execute_readonly_query", json!({"query": "mutation { wipe { ok } }"}))
        .await;
    assert!(result.is_error);
    assert_eq!(
        text(&result),
        "❌ Error: This tool only supports read-only queries\nHint: Use execute_mutation_query for mutations."
    );
    assert!(upstream.requests().is_empty());
}

#[tokio::test]
async fn field_names_mentioning_mutation_are_still_queries() {
    let upstream = FakeUpstream::new();
    upstream.ok(Method::POST, PATH, json!({"data": {}}));
    let app = app_with(upstream.clone());

    let result = app
        .dispatcher
        .dispatch("execute_readonly_query", json!({"query": "{ auditLog(kind: \"mutation\") { mutationId } }"}))
        .await;
    assert_eq!(text(&result), "✅ Query executed successfully - No data returned");
    assert_eq!(upstream.requests().len(), 1);
}

#[tokio::test]
async fn mutation_tool_requires_a_mutation_document() {
    let upstream = FakeUpstream::new();
    upstream.ok(Method::POST, PATH, json!({"data": {"itemCreate": {"success": true}}}));
    let app = app_with(upstream.clone());

    let rejected = app
        .dispatcher
        .dispatch("execute_mutation_query", json!({"query": "{ items { id } }"}))
        .await;
    assert!(rejected.is_error);
    assert!(text(&rejected).contains("does not declare a mutation operation"));
    assert!(upstream.requests().is_empty());

    let accepted = app
        .dispatcher
        .dispatch("execute_mutation_query", json!({"query": "mutation { itemCreate { success } }"}))
        .await;
    assert!(text(&accepted).starts_with("## Mutation Results ✅"));
    assert_eq!(upstream.requests()[0].body.as_ref().expect("body")["variables"], json!({}));
}

#[tokio::test]
async fn empty_documents_are_rejected() {
    let app = app_with(FakeUpstream::new());
    let result = app
        .dispatcher
        .dispatch("execute_mutation_query", json!({"query": "   "}))
        .await;
    assert_eq!(text(&result), "❌ Error: GraphQL mutation is required");
}

#[tokio::test]
async fn graphql_errors_are_listed_with_the_query() {
    let upstream = FakeUpstream::new();
    upstream.ok(
        Method::POST,
        PATH,
        json!({"errors": [{"message": "Field 'nope' doesn't exist", "locations": [{"line": 1, "column": 3}]}]}),
    );
    let app = app_with(upstream);

    let result = app
        .dispatcher
        .dispatch("execute_readonly_query", json!({"query": "{ nope }"}))
        .await;
    assert!(!result.is_error);
    let body = text(&result);
    assert!(body.starts_with("❌ GraphQL Query Errors:\n\n• Field 'nope' doesn't exist\n  At line 1, column 3\n"));
    assert!(body.ends_with("```graphql\n{ nope }\n```"));
}

#[tokio::test]
async fn schema_docs_filter_types() {
    let upstream = FakeUpstream::new();
    upstream.ok(
        Method::POST,
        PATH,
        json!({"data": {"__schema": {
            "queryType": {"name": "Query"},
            "mutationType": null,
            "types": [
                {"name": "User", "kind": "OBJECT", "description": "A person", "fields": [
                    {"name": "id", "type": {"kind": "NON_NULL", "ofType": {"kind": "SCALAR", "name": "ID"}}}
                ]},
                {"name": "Issue", "kind": "OBJECT", "fields": []},
                {"name": "__Type", "kind": "OBJECT", "fields": []},
                {"name": "String", "kind": "SCALAR"}
            ]
        }}}),
    );
    let app = app_with(upstream.clone());

    let result = app
        .dispatcher
        .dispatch("get_graphql_schema", json!({"type_filter": "user"}))
        .await;
    let body = text(&result);
    assert!(body.contains("- Query: `Query`\n- Mutation: `(none)`\n"));
    assert!(body.contains("## Available Types (1 found)\n\n### User (OBJECT)\nA person\n\n**Fields:**\n- `id`: ID!\n"));
    assert!(!body.contains("### Issue"));
    assert!(body.contains("## Example Queries"));

    let sent = upstream.requests()[0].body.clone().expect("body");
    assert!(sent["query"].as_str().expect("query").contains("__schema"));
}
