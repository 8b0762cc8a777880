use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::constants::limits::{
    GRAPHQL_INLINE_CHARS, GRAPHQL_PREVIEW_CHARS, SCHEMA_FIELDS_SHOWN, SCHEMA_TYPES_SHOWN,
};
use crate::errors::ToolError;
use crate::managers::render::{display, field, settle};
use crate::mcp::catalog::ToolDescriptor;
use crate::mcp::content::ToolResult;
use crate::mcp::schema::{FieldKind, FieldSpec, ParameterSchema};
use crate::services::config::Config;
use crate::services::credentials::TokenSource;
use crate::services::dispatcher::ToolHandler;
use crate::services::upstream::{Upstream, UpstreamRequest};
use crate::utils::text::truncate_chars;

const INTROSPECTION_QUERY: &str = r#"
{
  __schema {
    types {
      name
      kind
      description
      fields {
        name
        type { name kind ofType { name kind ofType { name kind ofType { name kind } } } }
        description
        args { name type { name kind } description }
      }
    }
    queryType { name }
    mutationType { name }
  }
}
"#;

const EXAMPLE_QUERIES: &str = "\n## Example Queries\n\n```graphql\n\
# Basic query structure\n\
query GetItems($filter: String) {\n  items(filter: $filter) {\n    id\n    name\n    createdAt\n  }\n}\n\n\
# Basic mutation structure\n\
mutation CreateItem($input: ItemInput!) {\n  itemCreate(input: $input) {\n    success\n    item { id name }\n  }\n}\n```\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    fn label(self) -> &'static str {
        match self {
            OperationKind::Query => "Query",
            OperationKind::Mutation => "Mutation",
            OperationKind::Subscription => "Subscription",
        }
    }
}

/// Operation types of the top-level definitions in a document, in order.
/// Fragments contribute nothing; a bare selection set counts as a query.
pub fn operation_kinds(document: &str) -> Vec<OperationKind> {
    let chars: Vec<char> = document.chars().collect();
    let mut kinds = Vec::new();
    let mut depth = 0usize;
    let mut parens = 0usize;
    let mut at_definition = true;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                continue;
            }
            '"' => {
                i = skip_string(&chars, i);
                continue;
            }
            '(' => parens += 1,
            ')' => parens = parens.saturating_sub(1),
            '{' => {
                if depth == 0 && parens == 0 && at_definition {
                    kinds.push(OperationKind::Query);
                    at_definition = false;
                }
                depth += 1;
            }
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 && parens == 0 {
                    at_definition = true;
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                if depth == 0 && parens == 0 && at_definition {
                    let word: String = chars[start..i].iter().collect();
                    match word.as_str() {
                        "query" => kinds.push(OperationKind::Query),
                        "mutation" => kinds.push(OperationKind::Mutation),
                        "subscription" => kinds.push(OperationKind::Subscription),
                        _ => {}
                    }
                    at_definition = false;
                }
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    kinds
}

/// Index just past the string literal opening at `start`.
fn skip_string(chars: &[char], start: usize) -> usize {
    let block = chars.get(start..start + 3) == Some(&['"', '"', '"'][..]);
    let mut i = start + if block { 3 } else { 1 };
    while i < chars.len() {
        if chars[i] == '\\' {
            i += 2;
            continue;
        }
        if block {
            if chars.get(i..i + 3) == Some(&['"', '"', '"'][..]) {
                return i + 3;
            }
        } else if chars[i] == '"' || chars[i] == '\n' {
            return i + 1;
        }
        i += 1;
    }
    chars.len()
}

pub fn declares_mutation(document: &str) -> bool {
    operation_kinds(document).contains(&OperationKind::Mutation)
}

pub struct GraphqlApi {
    config: Arc<Config>,
    upstream: Arc<dyn Upstream>,
    token: TokenSource,
}

impl GraphqlApi {
    pub fn new(config: Arc<Config>, upstream: Arc<dyn Upstream>, token: TokenSource) -> Arc<Self> {
        Arc::new(Self {
            config,
            upstream,
            token,
        })
    }

    async fn post(&self, body: Value) -> Result<Value, ToolError> {
        let token = self.token.get_token().await?;
        let request = UpstreamRequest::post(self.config.graphql_endpoint.as_str(), body).with_bearer(token);
        Ok(self.upstream.send(request).await?)
    }
}

#[derive(Debug, Deserialize)]
struct DocumentArgs {
    #[serde(default)]
    query: String,
    #[serde(default)]
    variables: Option<Map<String, Value>>,
}

fn document_descriptor(name: &str, description: &str, what: &'static str) -> ToolDescriptor {
    ToolDescriptor::new(
        name,
        description,
        ParameterSchema::new()
            .field(FieldSpec::new("query", FieldKind::String, what).required())
            .field(FieldSpec::new(
                "variables",
                FieldKind::Object(None),
                "Variables referenced by the document",
            )),
    )
}

async fn execute_document(
    api: &GraphqlApi,
    tool: &str,
    args: Value,
    expected: OperationKind,
) -> Result<ToolResult, ToolError> {
    let args: DocumentArgs = serde_json::from_value(args)
        .map_err(|err| ToolError::invalid_params(format!("Invalid {} arguments: {}", tool, err)))?;
    let query = args.query.trim();
    if query.is_empty() {
        return Err(ToolError::invalid_params(format!(
            "GraphQL {} is required",
            expected.label().to_lowercase()
        )));
    }
    match (expected, declares_mutation(query)) {
        (OperationKind::Mutation, false) => {
            return Err(ToolError::invalid_params(
                "This document does not declare a mutation operation",
            )
            .with_hint("Use execute_readonly_query for read operations."))
        }
        (OperationKind::Query, true) => {
            return Err(ToolError::invalid_params(
                "This tool only supports read-only queries",
            )
            .with_hint("Use execute_mutation_query for mutations."))
        }
        _ => {}
    }

    let body = json!({
        "query": query,
        "variables": Value::Object(args.variables.unwrap_or_default()),
    });
    let outcome = match api.post(body).await {
        Ok(result) => format_response(&result, query, expected),
        Err(err) => Err(err),
    };
    settle(outcome)
}

pub fn format_response(result: &Value, query: &str, kind: OperationKind) -> Result<String, ToolError> {
    let label = kind.label();
    if let Some(errors) = result.get("errors").and_then(Value::as_array) {
        let mut out = format!("❌ GraphQL {} Errors:\n\n", label);
        for error in errors {
            out.push_str(&format!("• {}\n", field(error, "message", "Unknown error")));
            if let Some(location) = error.pointer("/locations/0") {
                out.push_str(&format!(
                    "  At line {}, column {}\n",
                    field(location, "line", "?"),
                    field(location, "column", "?"),
                ));
            }
        }
        out.push_str(&format!("\n**Query:**\n```graphql\n{}\n```", query));
        return Ok(out);
    }

    let data = result.get("data").cloned().unwrap_or(Value::Null);
    let empty = match &data {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(list) => list.is_empty(),
        _ => false,
    };
    if empty {
        return Ok(format!("✅ {} executed successfully - No data returned", label));
    }

    let pretty = serde_json::to_string_pretty(&data)?;
    let mut out = format!("## {} Results ✅\n\n", label);
    if pretty.chars().count() > GRAPHQL_INLINE_CHARS {
        let (preview, _) = truncate_chars(&pretty, GRAPHQL_PREVIEW_CHARS);
        out.push_str(&summarize(&data));
        out.push_str("\n\n**Response Data (truncated):**\n");
        out.push_str(&format!("```json\n{}...\n```\n", preview));
        out.push_str("\n*Response truncated - use more specific queries for detailed results*");
    } else {
        out.push_str(&format!("**Response Data:**\n```json\n{}\n```", pretty));
    }
    Ok(out)
}

fn first_keys(map: &Map<String, Value>) -> String {
    map.keys().take(5).cloned().collect::<Vec<_>>().join(", ")
}

fn summarize(data: &Value) -> String {
    let mut out = String::from("**Response Summary:**\n");
    let Some(map) = data.as_object() else {
        return out;
    };
    for (key, value) in map {
        match value {
            Value::Array(list) => {
                out.push_str(&format!("- `{}`: {} items\n", key, list.len()));
                if let Some(first) = list.first().and_then(Value::as_object) {
                    out.push_str(&format!("  Fields: {}\n", first_keys(first)));
                }
            }
            Value::Object(inner) => {
                out.push_str(&format!("- `{}`: Object with {} fields\n", key, inner.len()));
                out.push_str(&format!("  Fields: {}\n", first_keys(inner)));
            }
            Value::String(_) => out.push_str(&format!("- `{}`: string\n", key)),
            Value::Number(_) => out.push_str(&format!("- `{}`: number\n", key)),
            Value::Bool(_) => out.push_str(&format!("- `{}`: boolean\n", key)),
            Value::Null => out.push_str(&format!("- `{}`: null\n", key)),
        }
    }
    out
}

pub struct ReadonlyQuery {
    api: Arc<GraphqlApi>,
}

impl ReadonlyQuery {
    pub fn new(api: Arc<GraphqlApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ToolHandler for ReadonlyQuery {
    fn descriptor(&self) -> ToolDescriptor {
        document_descriptor(
            "execute_readonly_query",
            "Execute read-only GraphQL queries for data retrieval and analysis. Supports \
             variables and fragments. Documents that declare a mutation are rejected.",
            "GraphQL query string",
        )
    }

    async fn handle(&self, args: Value) -> Result<ToolResult, ToolError> {
        execute_document(&self.api, "execute_readonly_query", args, OperationKind::Query).await
    }
}

pub struct MutationQuery {
    api: Arc<GraphqlApi>,
}

impl MutationQuery {
    pub fn new(api: Arc<GraphqlApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ToolHandler for MutationQuery {
    fn descriptor(&self) -> ToolDescriptor {
        document_descriptor(
            "execute_mutation_query",
            "Execute GraphQL mutations for creating, updating and deleting data. \
             Performs write operations; the document must declare a mutation.",
            "GraphQL mutation string",
        )
    }

    async fn handle(&self, args: Value) -> Result<ToolResult, ToolError> {
        execute_document(&self.api, "execute_mutation_query", args, OperationKind::Mutation).await
    }
}

#[derive(Debug, Deserialize)]
struct SchemaArgs {
    type_filter: Option<String>,
    include_descriptions: Option<bool>,
}

pub struct SchemaDocs {
    api: Arc<GraphqlApi>,
}

impl SchemaDocs {
    pub fn new(api: Arc<GraphqlApi>) -> Self {
        Self { api }
    }
}

/// `T!`, `[T]` and nested combinations of both.
pub fn format_type_ref(type_ref: &Value) -> String {
    match type_ref.get("kind").and_then(Value::as_str) {
        Some("NON_NULL") => format!("{}!", format_type_ref(type_ref.get("ofType").unwrap_or(&Value::Null))),
        Some("LIST") => format!("[{}]", format_type_ref(type_ref.get("ofType").unwrap_or(&Value::Null))),
        _ => type_ref
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string(),
    }
}

pub fn render_schema(result: &Value, type_filter: Option<&str>, include_descriptions: bool) -> Result<String, ToolError> {
    let schema = result
        .pointer("/data/__schema")
        .ok_or_else(|| ToolError::internal("Introspection response did not contain data.__schema"))?;
    let root = |key: &str, fallback: &str| -> String {
        match schema.get(key) {
            Some(Value::Null) => "(none)".to_string(),
            other => display(other.and_then(|v| v.get("name")), fallback),
        }
    };
    let needle = type_filter.map(str::to_lowercase).filter(|f| !f.is_empty());
    let types: Vec<&Value> = schema
        .get("types")
        .and_then(Value::as_array)
        .map(|list| list.iter().collect())
        .unwrap_or_default();
    let shown: Vec<&Value> = types
        .into_iter()
        .filter(|t| {
            let name = t.get("name").and_then(Value::as_str).unwrap_or("");
            let kind = t.get("kind").and_then(Value::as_str).unwrap_or("");
            !name.starts_with("__")
                && matches!(kind, "OBJECT" | "INPUT_OBJECT" | "ENUM" | "INTERFACE")
                && needle
                    .as_deref()
                    .map_or(true, |n| name.to_lowercase().contains(n))
        })
        .collect();

    let mut out = String::from("# GraphQL Schema Documentation\n\n");
    out.push_str(&format!(
        "**Root Types:**\n- Query: `{}`\n- Mutation: `{}`\n\n",
        root("queryType", "Query"),
        root("mutationType", "Mutation"),
    ));
    out.push_str(&format!("## Available Types ({} found)\n\n", shown.len()));
    for type_def in shown.iter().take(SCHEMA_TYPES_SHOWN) {
        out.push_str(&format!(
            "### {} ({})\n",
            field(type_def, "name", "Unknown"),
            field(type_def, "kind", "OBJECT"),
        ));
        let description = field(type_def, "description", "");
        if include_descriptions && !description.is_empty() {
            out.push_str(&format!("{}\n\n", description));
        }
        let fields = type_def
            .get("fields")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        if !fields.is_empty() {
            out.push_str("**Fields:**\n");
            for item in fields.iter().take(SCHEMA_FIELDS_SHOWN) {
                out.push_str(&format!(
                    "- `{}`: {}",
                    field(item, "name", ""),
                    format_type_ref(item.get("type").unwrap_or(&Value::Null)),
                ));
                let desc = field(item, "description", "");
                if include_descriptions && !desc.is_empty() {
                    out.push_str(&format!(" - {}", desc));
                }
                out.push('\n');
            }
            if fields.len() > SCHEMA_FIELDS_SHOWN {
                out.push_str(&format!(
                    "  *... and {} more fields*\n",
                    fields.len() - SCHEMA_FIELDS_SHOWN
                ));
            }
        }
        out.push('\n');
    }
    if shown.len() > SCHEMA_TYPES_SHOWN {
        out.push_str(&format!(
            "\n*Showing first {} of {} types. Use type_filter to narrow results.*\n",
            SCHEMA_TYPES_SHOWN,
            shown.len()
        ));
    }
    out.push_str(EXAMPLE_QUERIES);
    Ok(out)
}

#[async_trait]
impl ToolHandler for SchemaDocs {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "get_graphql_schema",
            "Retrieve GraphQL schema documentation: root types, object, input, enum and \
             interface types with their fields. Use type_filter to narrow the output.",
            ParameterSchema::new()
                .field(FieldSpec::new(
                    "type_filter",
                    FieldKind::String,
                    "Only show types whose name contains this text (e.g. 'User', 'Issue')",
                ))
                .field(
                    FieldSpec::new(
                        "include_descriptions",
                        FieldKind::Boolean,
                        "Include type and field descriptions",
                    )
                    .default_value(json!(true)),
                ),
        )
    }

    async fn handle(&self, args: Value) -> Result<ToolResult, ToolError> {
        let args: SchemaArgs = serde_json::from_value(args)
            .map_err(|err| ToolError::invalid_params(format!("Invalid get_graphql_schema arguments: {}", err)))?;
        let outcome = match self.api.post(json!({"query": INTROSPECTION_QUERY})).await {
            Ok(result) => render_schema(
                &result,
                args.type_filter.as_deref(),
                args.include_descriptions.unwrap_or(true),
            ),
            Err(err) => Err(err),
        };
        settle(outcome)
    }
}
